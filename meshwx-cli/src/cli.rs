use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{CustomType, Password, PasswordDisplayMode, Select, Text};
use std::path::{Path, PathBuf};
use tracing::info;

use meshwx_core::{
    FileConfig, Pacing, Report, Settings, SourceId, connect, deliver, prepare, source_from_settings,
    split_message, TRANSPORT_LIMIT,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "meshwx", version, about = "Relay weather reports over a Meshtastic mesh")]
pub struct Cli {
    /// Settings file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively write the settings file.
    Configure,

    /// Fetch reports and print them without touching the radio.
    Show {
        /// Report source: tempest-current, tempest-daily, nws-current or nws-forecast.
        source: String,
    },

    /// Fetch reports and send them to the configured channel.
    Send {
        /// Report source: tempest-current, tempest-daily, nws-current or nws-forecast.
        source: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let file = FileConfig::load(self.config.as_deref()).context("Failed to load settings file")?;

        match self.command {
            Command::Configure => configure(file, self.config.as_deref()),
            Command::Show { source } => {
                let reports = fetch(&source, &file).await?.1;
                for report in &reports {
                    print_report(report);
                    for fragment in split_message(&report.render(), TRANSPORT_LIMIT) {
                        println!("{fragment}");
                    }
                }
                Ok(())
            }
            Command::Send { source } => {
                let (settings, reports) = fetch(&source, &file).await?;
                reports.iter().for_each(print_report);

                let outgoing = prepare(&reports);
                if outgoing.is_empty() {
                    info!("Nothing to send.");
                    return Ok(());
                }

                let target = settings.radio.clone();
                let channel = settings.channel_index;
                let sent = tokio::task::spawn_blocking(move || {
                    let mut link = connect(&target)?;
                    deliver(&mut *link, channel, &outgoing, &Pacing::default())
                })
                .await
                .context("Send task failed")?
                .context("Error sending messages")?;

                info!("Sent {sent} message(s) on channel {channel}");
                Ok(())
            }
        }
    }
}

async fn fetch(source: &str, file: &FileConfig) -> anyhow::Result<(Settings, Vec<Report>)> {
    let id = SourceId::try_from(source)?;
    let settings = Settings::load(file).context("Invalid configuration")?;
    let source = source_from_settings(id, &settings)?;

    let reports = source
        .fetch_reports(Utc::now())
        .await
        .with_context(|| format!("Failed to fetch {id} data"))?;

    Ok((settings, reports))
}

fn print_report(report: &Report) {
    let rule = "=".repeat(50);
    println!("\n{rule}\n{}\n{rule}", report.render());
}

fn configure(mut file: FileConfig, path: Option<&Path>) -> anyhow::Result<()> {
    let token = Password::new("Tempest API token (leave empty to keep current):")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;
    if !token.trim().is_empty() {
        file.tempest_api_token = Some(token.trim().to_string());
    }

    let station = Text::new("Tempest station id:")
        .with_default(file.tempest_station_id.as_deref().unwrap_or(""))
        .prompt()?;
    file.tempest_station_id = Some(station.trim().to_string()).filter(|s| !s.is_empty());

    let location = Text::new("Location name used in report headings:")
        .with_default(file.location_name.as_deref().unwrap_or("NE Scottsdale"))
        .prompt()?;
    file.location_name = Some(location);

    let channel = CustomType::<u32>::new("Channel index:")
        .with_default(file.channel_index.unwrap_or(4))
        .prompt()?;
    file.channel_index = Some(channel);

    let interface = Select::new("Radio interface:", vec!["tcp", "serial"]).prompt()?;
    file.meshtastic_interface = Some(interface.to_string());
    if interface == "serial" {
        let port = Text::new("Serial device:")
            .with_default(file.meshtastic_port.as_deref().unwrap_or("/dev/ttyUSB0"))
            .prompt()?;
        file.meshtastic_port = Some(port);
    } else {
        let host = Text::new("Radio host:")
            .with_default(file.meshtastic_host.as_deref().unwrap_or("localhost"))
            .prompt()?;
        file.meshtastic_host = Some(host);
    }

    let saved = file.save(path)?;
    println!("Settings written to {}", saved.display());
    Ok(())
}
