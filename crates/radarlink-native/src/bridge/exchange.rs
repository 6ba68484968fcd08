//! Packet reassembly and request/reply exchange.

use std::time::{Duration, Instant};

use radarlink_core::protocol::{Command, FrameHeader, Reply, Request, FRAME_START, REPLY_START};

use super::Transport;
use crate::error::{LinkError, TransportError};

/// Bytes requested per transport read
const READ_CHUNK: usize = 4096;

/// Longest wait a single call honours. Longer timeouts are clamped to it.
const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// The instant `timeout` from now, with `timeout` clamped to [`MAX_WAIT`].
pub(crate) fn deadline_after(timeout: Duration) -> Instant {
    Instant::now() + timeout.min(MAX_WAIT)
}

/// A complete, not yet CRC-checked packet taken off the stream.
#[derive(Debug)]
pub(crate) enum Packet {
    Reply(Vec<u8>),
    Frame(FrameHeader, Vec<u8>),
}

/// Reassembles packets from a byte stream.
///
/// Bytes that cannot start a packet are skipped. A start byte followed by an
/// implausible header is treated as noise and skipped too.
#[derive(Debug)]
pub(crate) struct PacketReader {
    buffer: Vec<u8>,
    max_frame_payload: usize,
}

impl PacketReader {
    pub(crate) fn new(max_frame_payload: usize) -> Self {
        Self { buffer: Vec::with_capacity(READ_CHUNK), max_frame_payload }
    }

    pub(crate) fn set_max_frame_payload(&mut self, max_frame_payload: usize) {
        self.max_frame_payload = max_frame_payload;
    }

    /// Take the next complete packet out of the buffer, if there is one.
    pub(crate) fn next_packet(&mut self) -> Option<Packet> {
        loop {
            let start = self.buffer.iter().position(|&b| b == REPLY_START || b == FRAME_START);
            let Some(start) = start else {
                if !self.buffer.is_empty() {
                    tracing::trace!("Discarding {} bytes without a start byte", self.buffer.len());
                    self.buffer.clear();
                }
                return None;
            };
            if start > 0 {
                tracing::trace!("Discarding {} bytes before start byte", start);
                self.buffer.drain(..start);
            }

            if self.buffer[0] == REPLY_START {
                match Reply::packet_len(&self.buffer) {
                    Ok(None) => return None,
                    Ok(Some(total)) if self.buffer.len() < total => return None,
                    Ok(Some(total)) => return Some(Packet::Reply(self.buffer.drain(..total).collect())),
                    Err(_) => {
                        self.buffer.drain(..1);
                    }
                }
            } else {
                if self.buffer.len() < FrameHeader::SIZE {
                    return None;
                }
                match FrameHeader::parse(&self.buffer, self.max_frame_payload) {
                    Ok(header) if self.buffer.len() < header.packet_len() => return None,
                    Ok(header) => {
                        let packet = self.buffer.drain(..header.packet_len()).collect();
                        return Some(Packet::Frame(header, packet));
                    }
                    Err(_) => {
                        self.buffer.drain(..1);
                    }
                }
            }
        }
    }

    /// Append whatever the transport delivers within `timeout`.
    pub(crate) fn fill<T: Transport>(&mut self, transport: &mut T, timeout: Duration) -> Result<usize, TransportError> {
        let bytes = transport.read(READ_CHUNK, timeout)?;
        self.buffer.extend_from_slice(&bytes);
        Ok(bytes.len())
    }

    /// Send `command` and wait for its reply.
    ///
    /// Frame packets that arrive while waiting are discarded. Returns the
    /// reply payload.
    pub(crate) fn transact<T: Transport>(
        &mut self,
        transport: &mut T,
        command: Command,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Vec<u8>, LinkError> {
        transport.write(&Request::new(command, payload).encode()?)?;

        let started = Instant::now();
        let deadline = deadline_after(timeout);
        loop {
            match self.next_packet() {
                Some(Packet::Reply(packet)) => {
                    let reply = Reply::parse(&packet, command)?;
                    return Ok(reply.payload.to_vec());
                }
                Some(Packet::Frame(header, _)) => {
                    tracing::debug!("Discarding frame {} while waiting for {:?} reply", header.sequence, command);
                }
                None => {
                    let now = Instant::now();
                    if now >= deadline {
                        let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                        return Err(TransportError::Timeout { waited_ms }.into());
                    }
                    self.fill(transport, deadline - now)?;
                }
            }
        }
    }

    #[cfg(test)]
    fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }
}
