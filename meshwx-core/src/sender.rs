//! Paced, ordered delivery of chunked reports over a [`RadioLink`].

use std::{thread, time::Duration};

use tracing::{error, info, warn};

use crate::{
    chunk::{Fragment, TRANSPORT_LIMIT, split_message},
    error::TransportError,
    model::{Report, ReportKind},
    radio::RadioLink,
};

/// Fixed pauses the radio needs between transmissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    pub between_fragments: Duration,
    pub between_reports: Duration,
    pub before_close: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            between_fragments: Duration::from_secs(3),
            between_reports: Duration::from_secs(5),
            before_close: Duration::from_secs(2),
        }
    }
}

impl Pacing {
    pub const fn none() -> Self {
        Self {
            between_fragments: Duration::ZERO,
            between_reports: Duration::ZERO,
            before_close: Duration::ZERO,
        }
    }
}

/// A report cut into transport-sized fragments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outgoing {
    pub kind: ReportKind,
    pub fragments: Vec<Fragment>,
}

/// Renders and chunks every report, preserving order.
pub fn prepare(reports: &[Report]) -> Vec<Outgoing> {
    reports
        .iter()
        .map(|report| {
            let text = report.render();
            let fragments = split_message(&text, TRANSPORT_LIMIT);
            if fragments.len() > 1 {
                warn!(
                    "{} split into {} parts (original: {} chars)",
                    report.kind,
                    fragments.len(),
                    text.chars().count()
                );
            }
            Outgoing { kind: report.kind, fragments }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<'a> {
    Send { kind: ReportKind, fragment: &'a Fragment },
    Pause(Duration),
    Close,
}

/// The exact sequence of sends and pauses for one run.
///
/// Empty input yields an empty plan: nothing to send means the radio is never
/// opened, so there is nothing to close either.
pub fn plan<'a>(outgoing: &'a [Outgoing], pacing: &Pacing) -> Vec<Step<'a>> {
    let mut steps = Vec::new();
    if outgoing.is_empty() {
        return steps;
    }

    for (i, report) in outgoing.iter().enumerate() {
        if i > 0 {
            steps.push(Step::Pause(pacing.between_reports));
        }
        for (j, fragment) in report.fragments.iter().enumerate() {
            if j > 0 {
                steps.push(Step::Pause(pacing.between_fragments));
            }
            steps.push(Step::Send { kind: report.kind, fragment });
        }
    }

    steps.push(Step::Pause(pacing.before_close));
    steps.push(Step::Close);
    steps
}

/// Sends every fragment in order on `channel`, then closes the link.
///
/// The first failed send aborts the run: fragments already sent stay sent, the
/// link is still closed, and the send error is returned. Returns the number of
/// fragments delivered.
pub fn deliver<L>(
    link: &mut L,
    channel: u32,
    outgoing: &[Outgoing],
    pacing: &Pacing,
) -> Result<usize, TransportError>
where
    L: RadioLink + ?Sized,
{
    let mut sent = 0;

    for step in plan(outgoing, pacing) {
        match step {
            Step::Send { kind, fragment } => {
                info!(
                    "Sending {kind} part {}/{} ({} chars)...",
                    fragment.index,
                    fragment.total,
                    fragment.char_len()
                );
                if let Err(e) = link.send_text(channel, &fragment.text) {
                    error!("Error sending {kind} part {}: {e}", fragment.index);
                    if let Err(close_err) = link.close() {
                        warn!("Failed to close radio link: {close_err}");
                    }
                    return Err(e);
                }
                sent += 1;
                info!("{kind} part {} sent successfully", fragment.index);
            }
            Step::Pause(pause) => {
                if !pause.is_zero() {
                    info!("Waiting {} seconds...", pause.as_secs_f32());
                    thread::sleep(pause);
                }
            }
            Step::Close => {
                link.close()?;
                info!("Connection closed.");
            }
        }
    }

    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct RecordingLink {
        sent: Vec<(u32, String)>,
        closed: usize,
        fail_at: Option<usize>,
    }

    impl RadioLink for RecordingLink {
        fn send_text(&mut self, channel: u32, text: &str) -> Result<(), TransportError> {
            if self.fail_at == Some(self.sent.len()) {
                return Err(TransportError::Closed);
            }
            self.sent.push((channel, text.to_string()));
            Ok(())
        }

        fn close(&mut self) -> Result<(), TransportError> {
            self.closed += 1;
            Ok(())
        }
    }

    fn report(kind: ReportKind, text: &str) -> Report {
        let mut r = Report::lines(kind, "\n");
        r.push(text);
        r
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn single_short_report_plan() {
        let outgoing = prepare(&[report(ReportKind::Conditions, "hello")]);
        let steps = plan(&outgoing, &Pacing::default());

        assert_eq!(steps.len(), 3);
        assert!(matches!(steps[0], Step::Send { kind: ReportKind::Conditions, fragment } if fragment.text == "hello"));
        assert_eq!(steps[1], Step::Pause(secs(2)));
        assert_eq!(steps[2], Step::Close);
    }

    #[test]
    fn pauses_between_fragments_and_reports() {
        let long = "f".repeat(300);
        let outgoing = prepare(&[
            report(ReportKind::Forecast, &long),
            report(ReportKind::Alerts, "alert"),
        ]);
        let steps = plan(&outgoing, &Pacing::default());

        let shape: Vec<String> = steps
            .iter()
            .map(|s| match s {
                Step::Send { kind, fragment } => format!("send {kind} {}/{}", fragment.index, fragment.total),
                Step::Pause(d) => format!("pause {}", d.as_secs()),
                Step::Close => "close".to_string(),
            })
            .collect();

        assert_eq!(
            shape,
            vec![
                "send forecast 1/2",
                "pause 3",
                "send forecast 2/2",
                "pause 5",
                "send alerts 1/1",
                "pause 2",
                "close",
            ]
        );
    }

    #[test]
    fn nothing_to_send_means_empty_plan() {
        assert!(plan(&[], &Pacing::default()).is_empty());
    }

    #[test]
    fn deliver_sends_in_order_and_closes() {
        let outgoing = prepare(&[
            report(ReportKind::Forecast, &"a".repeat(250)),
            report(ReportKind::Alerts, "b"),
        ]);
        let mut link = RecordingLink::default();

        let sent = deliver(&mut link, 4, &outgoing, &Pacing::none()).unwrap();

        assert_eq!(sent, 3);
        assert_eq!(link.closed, 1);
        let texts: Vec<&str> = link.sent.iter().map(|(_, t)| t.as_str()).collect();
        let expected = vec![format!("{}...", "a".repeat(207)), "a".repeat(43), "b".to_string()];
        assert_eq!(texts, expected);
        assert!(link.sent.iter().all(|(ch, _)| *ch == 4));
    }

    #[test]
    fn failed_send_aborts_but_still_closes() {
        let outgoing = prepare(&[
            report(ReportKind::Forecast, "one"),
            report(ReportKind::Alerts, "two"),
        ]);
        let mut link = RecordingLink { fail_at: Some(1), ..Default::default() };

        let err = deliver(&mut link, 0, &outgoing, &Pacing::none()).unwrap_err();

        assert!(matches!(err, TransportError::Closed));
        assert_eq!(link.sent, vec![(0, "one".to_string())]);
        assert_eq!(link.closed, 1);
    }
}
