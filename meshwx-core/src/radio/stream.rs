//! Length-prefixed framing used by the Meshtastic serial and TCP stream API.
//!
//! Each frame is `0x94 0xC3 len_hi len_lo` followed by `len` bytes of protobuf.
//! Devices interleave plain-text debug output between frames on serial links, so
//! the reader resynchronises on the magic header.

use std::io::{self, Read, Write};

use prost::Message;
use tracing::trace;

use crate::error::TransportError;

pub const START1: u8 = 0x94;
pub const START2: u8 = 0xC3;
pub const MAX_PAYLOAD: usize = 512;
const HEADER_LEN: usize = 4;

#[derive(Debug)]
pub struct FrameStream<S> {
    inner: S,
    rx: Vec<u8>,
}

impl<S: Read + Write> FrameStream<S> {
    pub fn new(inner: S) -> Self {
        Self { inner, rx: Vec::new() }
    }

    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.inner.write_all(bytes)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn write_message<M: Message>(&mut self, msg: &M) -> Result<(), TransportError> {
        let payload = msg.encode_to_vec();
        if payload.len() > MAX_PAYLOAD {
            return Err(TransportError::FrameTooLarge(payload.len()));
        }

        let len = (payload.len() as u16).to_be_bytes();
        let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
        frame.extend_from_slice(&[START1, START2, len[0], len[1]]);
        frame.extend_from_slice(&payload);

        trace!("writing frame ({} bytes payload)", payload.len());
        self.write_raw(&frame)
    }

    /// Reads until one complete frame is buffered.
    ///
    /// Returns `Ok(None)` when the underlying read times out, so callers can check
    /// their own deadline and try again.
    pub fn read_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut buf = [0u8; 256];
        loop {
            if let Some(frame) = self.take_frame() {
                return Ok(Some(frame));
            }

            match self.inner.read(&mut buf) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.rx.extend_from_slice(&buf[..n]),
                Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn take_frame(&mut self) -> Option<Vec<u8>> {
        loop {
            match self.rx.iter().position(|&b| b == START1) {
                Some(pos) => {
                    self.rx.drain(..pos);
                }
                None => {
                    self.rx.clear();
                    return None;
                }
            }

            if self.rx.len() < 2 {
                return None;
            }
            if self.rx[1] != START2 {
                self.rx.drain(..1);
                continue;
            }
            if self.rx.len() < HEADER_LEN {
                return None;
            }

            let len = u16::from_be_bytes([self.rx[2], self.rx[3]]) as usize;
            if len > MAX_PAYLOAD {
                self.rx.drain(..1);
                continue;
            }
            if self.rx.len() < HEADER_LEN + len {
                return None;
            }

            let frame = self.rx[HEADER_LEN..HEADER_LEN + len].to_vec();
            self.rx.drain(..HEADER_LEN + len);
            return Some(frame);
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}
