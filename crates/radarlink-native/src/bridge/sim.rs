//! Simulated radar board
//!
//! An in-process stand-in for a board behind a serial port. It answers the
//! probe, start and stop requests like firmware would and streams synthetic
//! frame packets while acquisition is running.
//!
//! Opened at a baud rate it does not accept, the transport returns the reply
//! with every byte bit-reversed, which is roughly what a UART receiving at the
//! wrong rate produces: noise that fails the start-byte or CRC check.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use radarlink_core::bits::reverse_bits;
use radarlink_core::error::ProtocolError;
use radarlink_core::protocol::{BoardInfo, Command, FrameHeader, Reply, Request, REQUEST_START};

use super::{Connector, Transport};
use crate::config::{FALLBACK_BAUD_RATE, PRIMARY_BAUD_RATE};
use crate::error::TransportError;

/// Behaviour of a simulated board.
#[derive(Clone, Debug)]
pub struct SimulatedBoard {
    /// Baud rates at which the link works
    pub accepted_baud_rates: Vec<u32>,
    /// Identity reported in the probe reply
    pub info: BoardInfo,
    /// Flip a CRC bit in every reply so the integrity check fails
    pub corrupt_replies: bool,
    /// Number of frames streamed per acquisition (`None` = endless)
    pub frame_count: Option<u32>,
    /// Payload size of each frame
    pub frame_payload_len: usize,
    /// Delay between frames
    pub frame_interval: Duration,
}

impl Default for SimulatedBoard {
    fn default() -> Self {
        Self {
            accepted_baud_rates: vec![PRIMARY_BAUD_RATE, FALLBACK_BAUD_RATE],
            info: BoardInfo { vid: 0x058B, pid: 0x0251, protocol_version: 3, firmware: (2, 5, 1042) },
            corrupt_replies: false,
            frame_count: Some(0),
            frame_payload_len: 0,
            frame_interval: Duration::ZERO,
        }
    }
}

impl SimulatedBoard {
    /// Only accept the given baud rates.
    #[must_use]
    pub fn with_baud_rates(mut self, rates: &[u32]) -> Self {
        self.accepted_baud_rates = rates.to_vec();
        self
    }

    /// Report a different identity.
    #[must_use]
    pub fn with_info(mut self, info: BoardInfo) -> Self {
        self.info = info;
        self
    }

    /// Corrupt every reply.
    #[must_use]
    pub fn with_corrupt_replies(mut self) -> Self {
        self.corrupt_replies = true;
        self
    }

    /// Stream `count` frames of `payload_len` bytes per acquisition.
    #[must_use]
    pub fn with_frames(mut self, count: u32, payload_len: usize) -> Self {
        self.frame_count = Some(count);
        self.frame_payload_len = payload_len;
        self
    }

    /// Stream frames of `payload_len` bytes until stopped, one per `interval`.
    #[must_use]
    pub fn streaming(mut self, payload_len: usize, interval: Duration) -> Self {
        self.frame_count = None;
        self.frame_payload_len = payload_len;
        self.frame_interval = interval;
        self
    }

    /// Synthetic payload: a sawtooth of 12-bit little-endian samples.
    fn frame_payload(&self, sequence: u32) -> Vec<u8> {
        (0..self.frame_payload_len)
            .map(|i| {
                let sample = (sequence as usize + i / 2) & 0x0FFF;
                if i % 2 == 0 {
                    (sample & 0xFF) as u8
                } else {
                    (sample >> 8) as u8
                }
            })
            .collect()
    }
}

/// Connector for one or more simulated ports sharing a board behaviour.
///
/// Every `open` call is recorded so tests can count attempts, and open
/// transports are tracked so leaks show up in [`open_transports`](Self::open_transports).
#[derive(Clone, Debug)]
pub struct SimulatedConnector {
    ports: Vec<(String, SimulatedBoard)>,
    opened: Arc<Mutex<Vec<(String, u32)>>>,
    live: Arc<AtomicUsize>,
}

impl SimulatedConnector {
    /// Create a connector with a single port.
    #[must_use]
    pub fn new(identifier: impl Into<String>, board: SimulatedBoard) -> Self {
        Self { ports: vec![(identifier.into(), board)], opened: Arc::default(), live: Arc::default() }
    }

    /// Add another port.
    #[must_use]
    pub fn with_port(mut self, identifier: impl Into<String>, board: SimulatedBoard) -> Self {
        self.ports.push((identifier.into(), board));
        self
    }

    /// Identifiers of all simulated ports.
    #[must_use]
    pub fn list_ports(&self) -> Vec<String> {
        self.ports.iter().map(|(id, _)| id.clone()).collect()
    }

    /// Every `(identifier, baud_rate)` passed to `open`, in call order.
    #[must_use]
    pub fn open_calls(&self) -> Vec<(String, u32)> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Transports opened and not yet closed.
    #[must_use]
    pub fn open_transports(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

impl Connector for SimulatedConnector {
    type Transport = SimulatedTransport;

    fn open(&self, identifier: &str, baud_rate: u32) -> Result<SimulatedTransport, TransportError> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((identifier.to_string(), baud_rate));

        let Some((_, board)) = self.ports.iter().find(|(id, _)| id == identifier) else {
            return Err(TransportError::Open {
                identifier: identifier.to_string(),
                baud_rate,
                reason: "no such port".to_string(),
            });
        };

        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(SimulatedTransport {
            identifier: identifier.to_string(),
            board: board.clone(),
            link_ok: board.accepted_baud_rates.contains(&baud_rate),
            input: Vec::new(),
            output: VecDeque::new(),
            streaming: false,
            sequence: 0,
            frames_left: None,
            next_frame_at: Instant::now(),
            live: Some(Arc::clone(&self.live)),
        })
    }
}

/// Open transport to a [`SimulatedBoard`].
#[derive(Debug)]
pub struct SimulatedTransport {
    identifier: String,
    board: SimulatedBoard,
    link_ok: bool,
    input: Vec<u8>,
    output: VecDeque<u8>,
    streaming: bool,
    sequence: u32,
    frames_left: Option<u32>,
    next_frame_at: Instant,
    live: Option<Arc<AtomicUsize>>,
}

impl SimulatedTransport {
    fn is_closed(&self) -> bool {
        self.live.is_none()
    }

    /// Queue bytes for the host, garbled if the baud rate is wrong.
    fn send(&mut self, bytes: &[u8]) {
        if self.link_ok {
            self.output.extend(bytes);
        } else {
            self.output.extend(bytes.iter().map(|&b| reverse_bits(b)));
        }
    }

    fn reply(&mut self, command: u8, payload: &[u8]) {
        let mut packet = match Reply::new(command, 0, payload).encode() {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("Simulated board cannot reply: {}", e);
                return;
            }
        };
        if self.board.corrupt_replies {
            if let Some(crc) = packet.last_mut() {
                *crc ^= 0x01;
            }
        }
        self.send(&packet);
    }

    /// Handle every complete request in the input buffer.
    fn process_requests(&mut self) {
        loop {
            match self.input.iter().position(|&b| b == REQUEST_START) {
                Some(start) => {
                    self.input.drain(..start);
                }
                None => {
                    self.input.clear();
                    return;
                }
            }

            let (command, used) = match Request::parse(&self.input) {
                Ok((request, used)) => (request.command, used),
                Err(ProtocolError::IncompletePacket { .. } | ProtocolError::Cursor(_)) => return,
                Err(_) => {
                    self.input.drain(..1);
                    continue;
                }
            };
            self.input.drain(..used);

            match command {
                Command::GetBoardInfo => {
                    let info = self.board.info.to_bytes();
                    self.reply(command as u8, &info);
                }
                Command::StartAcquisition => {
                    self.reply(command as u8, &[]);
                    self.streaming = true;
                    self.frames_left = self.board.frame_count;
                    self.next_frame_at = Instant::now();
                }
                Command::StopAcquisition => {
                    self.streaming = false;
                    self.reply(command as u8, &[]);
                }
            }
        }
    }

    /// Emit the next frame packet if one is due.
    fn emit_frame(&mut self) -> bool {
        if !self.streaming || self.frames_left == Some(0) || Instant::now() < self.next_frame_at {
            return false;
        }

        let payload = self.board.frame_payload(self.sequence);
        let packet = match FrameHeader::encode(0, self.sequence, &payload) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!("Simulated board stops streaming: {}", e);
                self.streaming = false;
                return false;
            }
        };
        self.send(&packet);

        self.sequence = self.sequence.wrapping_add(1);
        if let Some(left) = self.frames_left.as_mut() {
            *left -= 1;
        }
        self.next_frame_at += self.board.frame_interval;
        true
    }

    /// Time until the next frame is due, if any frame is still coming.
    fn next_frame_in(&self) -> Option<Duration> {
        (self.streaming && self.frames_left != Some(0))
            .then(|| self.next_frame_at.saturating_duration_since(Instant::now()))
    }
}

impl Transport for SimulatedTransport {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        // The board always understands the host; only the way back is garbled
        self.input.extend_from_slice(bytes);
        self.process_requests();
        Ok(())
    }

    fn read(&mut self, max_bytes: usize, timeout: Duration) -> Result<Vec<u8>, TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }

        if self.output.is_empty() && !self.emit_frame() {
            match self.next_frame_in() {
                Some(wait) if wait <= timeout => {
                    thread::sleep(wait);
                    self.emit_frame();
                }
                _ => thread::sleep(timeout),
            }
        }

        let count = max_bytes.min(self.output.len());
        Ok(self.output.drain(..count).collect())
    }

    fn close(&mut self) {
        if let Some(live) = self.live.take() {
            live.fetch_sub(1, Ordering::SeqCst);
            self.output.clear();
            self.streaming = false;
        }
    }
}

impl Drop for SimulatedTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_reply() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default());
        let mut transport = connector.open("sim0", PRIMARY_BAUD_RATE).unwrap();

        transport.write(&Request::new(Command::GetBoardInfo, &[]).encode().unwrap()).unwrap();
        let bytes = transport.read(256, Duration::from_millis(10)).unwrap();
        let reply = Reply::parse(&bytes, Command::GetBoardInfo).unwrap();

        assert_eq!(BoardInfo::from_bytes(reply.payload).unwrap(), SimulatedBoard::default().info);
    }

    #[test]
    fn test_wrong_baud_rate_garbles_reply() {
        let board = SimulatedBoard::default().with_baud_rates(&[FALLBACK_BAUD_RATE]);
        let connector = SimulatedConnector::new("sim0", board);
        let mut transport = connector.open("sim0", PRIMARY_BAUD_RATE).unwrap();

        transport.write(&Request::new(Command::GetBoardInfo, &[]).encode().unwrap()).unwrap();
        let bytes = transport.read(256, Duration::from_millis(10)).unwrap();
        assert!(!bytes.is_empty());
        assert!(Reply::parse(&bytes, Command::GetBoardInfo).is_err());
    }

    #[test]
    fn test_open_unknown_port_fails() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default());
        assert!(matches!(connector.open("sim1", PRIMARY_BAUD_RATE), Err(TransportError::Open { .. })));
        assert_eq!(connector.open_calls().len(), 1);
        assert_eq!(connector.open_transports(), 0);
    }

    #[test]
    fn test_close_is_tracked_and_idempotent() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default());
        let mut transport = connector.open("sim0", PRIMARY_BAUD_RATE).unwrap();
        assert_eq!(connector.open_transports(), 1);

        transport.close();
        transport.close();
        assert_eq!(connector.open_transports(), 0);
        assert!(matches!(transport.read(1, Duration::ZERO), Err(TransportError::Closed)));

        drop(transport);
        assert_eq!(connector.open_transports(), 0);
    }

    #[test]
    fn test_streams_requested_frames() {
        let connector = SimulatedConnector::new("sim0", SimulatedBoard::default().with_frames(2, 8));
        let mut transport = connector.open("sim0", PRIMARY_BAUD_RATE).unwrap();
        transport.write(&Request::new(Command::StartAcquisition, &[]).encode().unwrap()).unwrap();

        let mut bytes = Vec::new();
        for _ in 0..4 {
            bytes.extend(transport.read(4096, Duration::from_millis(5)).unwrap());
        }

        let reply_len = Reply::HEADER_SIZE + 2;
        let frame_len = FrameHeader::SIZE + 8 + 2;
        assert_eq!(bytes.len(), reply_len + 2 * frame_len);

        let header = FrameHeader::parse(&bytes[reply_len..], 64).unwrap();
        assert_eq!(header.sequence, 0);
        assert_eq!(header.payload(&bytes[reply_len..reply_len + frame_len]).unwrap().len(), 8);
    }
}
