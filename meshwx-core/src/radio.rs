//! Meshtastic radio link over the device stream API (TCP or serial).

use std::{
    io::{Read, Write},
    net::TcpStream,
    thread,
    time::{Duration, Instant},
};

use prost::Message;
use tracing::{debug, info};

use crate::{chunk::TRANSPORT_LIMIT, config::RadioTarget, error::TransportError};

pub mod proto;
pub mod stream;

use proto::{Data, FromRadio, MeshPacket, PortNum, ToRadio, mesh_packet, to_radio};
use stream::{FrameStream, START2};

pub const BROADCAST_ADDR: u32 = 0xFFFF_FFFF;
const DEFAULT_HOP_LIMIT: u32 = 3;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_millis(500);
const WAKE_BYTES: usize = 32;

/// A "send text to channel" sink with an explicit close.
pub trait RadioLink {
    fn send_text(&mut self, channel: u32, text: &str) -> Result<(), TransportError>;
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Opens the configured radio and completes the config handshake.
pub fn connect(target: &RadioTarget) -> Result<Box<dyn RadioLink + Send>, TransportError> {
    match target {
        RadioTarget::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port)).map_err(|source| {
                TransportError::Connect { target: format!("{host}:{port}"), source }
            })?;
            stream.set_read_timeout(Some(READ_TIMEOUT))?;
            stream.set_nodelay(true)?;

            let link = MeshLink::open(stream)?;
            info!("Connected via TCP: {host}:{port}");
            Ok(Box::new(link))
        }
        RadioTarget::Serial { path, baud } => {
            let mut port = serialport::new(path.as_str(), *baud)
                .timeout(READ_TIMEOUT)
                .data_bits(serialport::DataBits::Eight)
                .stop_bits(serialport::StopBits::One)
                .parity(serialport::Parity::None)
                .open()
                .map_err(|source| TransportError::Serial { port: path.clone(), source })?;
            // ESP32 boards may need DTR asserted before they answer
            let _ = port.write_data_terminal_ready(true);

            let link = MeshLink::open(port)?;
            info!("Connected via Serial: {path}");
            Ok(Box::new(link))
        }
    }
}

/// Stream API session with one node.
#[derive(Debug)]
pub struct MeshLink<S> {
    stream: FrameStream<S>,
    closed: bool,
}

impl<S: Read + Write> MeshLink<S> {
    pub fn open(inner: S) -> Result<Self, TransportError> {
        Self::open_with(inner, random_id(), HANDSHAKE_TIMEOUT)
    }

    pub(crate) fn open_with(inner: S, config_id: u32, timeout: Duration) -> Result<Self, TransportError> {
        let mut stream = FrameStream::new(inner);

        stream.write_raw(&[START2; WAKE_BYTES])?;
        thread::sleep(Duration::from_millis(100));

        debug!("requesting config (want_config_id=0x{config_id:08x})");
        stream.write_message(&ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::WantConfigId(config_id)),
        })?;

        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline {
                return Err(TransportError::HandshakeTimeout);
            }

            let Some(frame) = stream.read_frame()? else {
                continue;
            };
            match FromRadio::decode(frame.as_slice()) {
                Ok(msg) if msg.config_complete_id == Some(config_id) => break,
                Ok(_) => {}
                Err(e) => debug!("skipping undecodable frame: {e}"),
            }
        }

        debug!("config handshake complete");
        Ok(Self { stream, closed: false })
    }

    #[cfg(test)]
    pub(crate) fn stream(&self) -> &FrameStream<S> {
        &self.stream
    }
}

impl<S: Read + Write> RadioLink for MeshLink<S> {
    fn send_text(&mut self, channel: u32, text: &str) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }

        let len = text.chars().count();
        if len > TRANSPORT_LIMIT {
            return Err(TransportError::TextTooLong { len, limit: TRANSPORT_LIMIT });
        }

        let packet = MeshPacket {
            to: BROADCAST_ADDR,
            channel,
            payload_variant: Some(mesh_packet::PayloadVariant::Decoded(Data {
                portnum: PortNum::TextMessageApp as i32,
                payload: text.as_bytes().to_vec(),
            })),
            id: random_id(),
            hop_limit: DEFAULT_HOP_LIMIT,
            ..Default::default()
        };

        self.stream.write_message(&ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Packet(packet)),
        })
    }

    fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        self.stream.write_message(&ToRadio {
            payload_variant: Some(to_radio::PayloadVariant::Disconnect(true)),
        })
    }
}

fn random_id() -> u32 {
    rand::random::<u32>().max(1)
}
