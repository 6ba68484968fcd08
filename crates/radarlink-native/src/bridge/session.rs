//! Established board sessions.

use std::time::{Duration, Instant};

use radarlink_core::protocol::{BoardInfo, Command, MAX_FRAME_PAYLOAD};

use super::exchange::{deadline_after, Packet, PacketReader};
use super::Transport;
use crate::config::BoardDescriptor;
use crate::error::{LinkError, TransportError};
use crate::frame::Frame;

/// An open transport whose baud rate and board identity have been validated.
///
/// The session owns the transport. It is closed by [`close`](Self::close) or
/// when the session is dropped, whichever comes first.
#[derive(Debug)]
pub struct BoardSession<T: Transport> {
    transport: Option<T>,
    identifier: String,
    baud_rate: u32,
    info: BoardInfo,
    descriptor: BoardDescriptor,
    reader: PacketReader,
    command_timeout: Duration,
    last_sequence: Option<u32>,
}

impl<T: Transport> BoardSession<T> {
    pub(crate) fn new(
        transport: T,
        baud_rate: u32,
        info: BoardInfo,
        descriptor: BoardDescriptor,
        reader: PacketReader,
        command_timeout: Duration,
    ) -> Self {
        Self {
            identifier: transport.identifier().to_string(),
            transport: Some(transport),
            baud_rate,
            info,
            descriptor,
            reader,
            command_timeout,
            last_sequence: None,
        }
    }

    /// Transport identifier the board was found on.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Baud rate the handshake succeeded at.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Identity reported by the board.
    pub fn board_info(&self) -> &BoardInfo {
        &self.info
    }

    /// Known-board entry the identity matched.
    pub fn descriptor(&self) -> &BoardDescriptor {
        &self.descriptor
    }

    /// True until the session is closed.
    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    /// Limit the payload size accepted by [`read_frame`](Self::read_frame).
    pub fn set_max_frame_payload(&mut self, max_frame_payload: usize) {
        self.reader.set_max_frame_payload(max_frame_payload.min(MAX_FRAME_PAYLOAD));
    }

    fn send_command(&mut self, command: Command) -> Result<Vec<u8>, LinkError> {
        let transport = self.transport.as_mut().ok_or(TransportError::Closed)?;
        self.reader.transact(transport, command, &[], self.command_timeout)
    }

    /// Ask the board to start streaming frames.
    ///
    /// # Errors
    ///
    /// Returns error if the session is closed or the board does not confirm.
    pub fn start_acquisition(&mut self) -> Result<(), LinkError> {
        self.send_command(Command::StartAcquisition)?;
        self.last_sequence = None;
        tracing::info!("Acquisition started on {}", self.identifier);
        Ok(())
    }

    /// Ask the board to stop streaming frames.
    ///
    /// # Errors
    ///
    /// Returns error if the session is closed or the board does not confirm.
    pub fn stop_acquisition(&mut self) -> Result<(), LinkError> {
        self.send_command(Command::StopAcquisition)?;
        tracing::info!("Acquisition stopped on {}", self.identifier);
        Ok(())
    }

    /// Read the next frame packet.
    ///
    /// Returns `Ok(None)` if no complete frame arrived within `timeout`.
    ///
    /// # Errors
    ///
    /// - [`LinkError::Protocol`] if a frame failed its CRC check; the stream
    ///   stays usable
    /// - [`LinkError::Transport`] if the transport failed or is closed
    pub fn read_frame(&mut self, timeout: Duration) -> Result<Option<Frame>, LinkError> {
        let transport = self.transport.as_mut().ok_or(TransportError::Closed)?;
        let deadline = deadline_after(timeout);

        loop {
            match self.reader.next_packet() {
                Some(Packet::Frame(header, packet)) => {
                    let payload = header.payload(&packet)?;

                    if let Some(last) = self.last_sequence {
                        let expected = last.wrapping_add(1);
                        if header.sequence != expected {
                            tracing::warn!("Sequence gap: expected {}, got {}", expected, header.sequence);
                        }
                    }
                    self.last_sequence = Some(header.sequence);

                    return Ok(Some(Frame::new(header.sequence, header.flags, payload.to_vec())));
                }
                Some(Packet::Reply(packet)) => {
                    tracing::debug!("Ignoring unsolicited reply ({} bytes)", packet.len());
                }
                None => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    self.reader.fill(transport, deadline - now)?;
                }
            }
        }
    }

    /// Close the transport. Calling it again has no effect.
    pub fn close(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
            tracing::info!("Closed session on {}", self.identifier);
        }
    }
}

impl<T: Transport> Drop for BoardSession<T> {
    fn drop(&mut self) {
        self.close();
    }
}

/// Close a session that may never have been established.
pub fn close_session<T: Transport>(session: Option<BoardSession<T>>) {
    if let Some(mut session) = session {
        session.close();
    }
}
