//! Wire protocol for radar board communication
//!
//! This module defines the packets exchanged between the host and the board
//! firmware. The protocol is designed to be:
//! - Self-synchronizing with a distinct start byte per packet kind
//! - Integrity-checked with a CRC-16 over every byte of the packet
//! - Identifying: the probe reply tells the host which board is attached, so
//!   a CRC-valid reply proves the link parameters are right
//!
//! All multi-byte fields are little-endian. The CRC is CRC-16/IBM-3740
//! (poly 0x1021, init 0xFFFF), appended little-endian after the payload.

use alloc::vec::Vec;

use bytemuck::{Pod, Zeroable};
use crc::{Crc, CRC_16_IBM_3740};
use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::error::ProtocolError;

/// Start byte of a host → board request
pub const REQUEST_START: u8 = 0x01;
/// Start byte of a board → host reply
pub const REPLY_START: u8 = 0x02;
/// Start byte of a board → host frame packet
pub const FRAME_START: u8 = 0x03;

/// Size of the trailing CRC field
pub const CRC_SIZE: usize = 2;
/// Maximum payload of a request or reply
pub const MAX_REPLY_PAYLOAD: usize = 1024;
/// Maximum payload of a frame packet (1 MiB)
pub const MAX_FRAME_PAYLOAD: usize = 1 << 20;

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Compute the packet CRC over `bytes`.
#[must_use]
pub fn checksum(bytes: &[u8]) -> u16 {
    CRC16.checksum(bytes)
}

/// Scan a buffer for the first occurrence of `start`.
#[must_use]
pub fn find_start(buffer: &[u8], start: u8) -> Option<usize> {
    buffer.iter().position(|&b| b == start)
}

/// Split `packet` into body and CRC and verify it.
fn verify_crc(packet: &[u8]) -> Result<&[u8], ProtocolError> {
    if packet.len() < CRC_SIZE {
        return Err(ProtocolError::IncompletePacket { received: packet.len(), expected: CRC_SIZE });
    }
    let (body, crc) = packet.split_at(packet.len() - CRC_SIZE);
    let received = u16::from_le_bytes([crc[0], crc[1]]);
    let computed = checksum(body);
    if received != computed {
        return Err(ProtocolError::ChecksumMismatch { received, computed });
    }
    Ok(body)
}

/// Length field for `payload`, rejecting payloads longer than `maximum`.
fn length_field<T: TryFrom<usize>>(payload: &[u8], maximum: usize) -> Result<T, ProtocolError> {
    let length = payload.len();
    let too_large = ProtocolError::PayloadTooLarge { length, maximum };
    if length > maximum {
        return Err(too_large);
    }
    T::try_from(length).map_err(|_| too_large)
}

fn append_crc(packet: &mut Vec<u8>) {
    let crc = checksum(packet);
    packet.extend_from_slice(&crc.to_le_bytes());
}

fn expect_start(got: u8, expected: u8) -> Result<(), ProtocolError> {
    if got == expected {
        Ok(())
    } else {
        Err(ProtocolError::InvalidStart { expected, got })
    }
}

// ============================================================================
// Commands
// ============================================================================

/// Command identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    /// Report board identity (the discovery probe)
    GetBoardInfo = 0x00,
    /// Start streaming frame packets
    StartAcquisition = 0x10,
    /// Stop streaming frame packets
    StopAcquisition = 0x11,
}

impl Command {
    /// Try to convert a byte to a command.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::GetBoardInfo),
            0x10 => Some(Self::StartAcquisition),
            0x11 => Some(Self::StopAcquisition),
            _ => None,
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Command {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::GetBoardInfo => defmt::write!(f, "Info"),
            Self::StartAcquisition => defmt::write!(f, "Start"),
            Self::StopAcquisition => defmt::write!(f, "Stop"),
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawRequestHeader {
    start: u8,
    command: u8,
    payload_len: u16,
}

/// Host → board request.
///
/// Layout: `start:u8, command:u8, payload_len:u16, payload, crc:u16`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request<'a> {
    /// Requested command
    pub command: Command,
    /// Command arguments
    pub payload: &'a [u8],
}

impl<'a> Request<'a> {
    /// Header size in bytes
    pub const HEADER_SIZE: usize = 4;

    /// Create a request.
    #[must_use]
    pub const fn new(command: Command, payload: &'a [u8]) -> Self {
        Self { command, payload }
    }

    /// Serialize the request including CRC.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_REPLY_PAYLOAD`].
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let payload_len: u16 = length_field(self.payload, MAX_REPLY_PAYLOAD)?;
        let mut packet = Vec::with_capacity(Self::HEADER_SIZE + self.payload.len() + CRC_SIZE);
        packet.push(REQUEST_START);
        packet.push(self.command as u8);
        packet.extend_from_slice(&payload_len.to_le_bytes());
        packet.extend_from_slice(self.payload);
        append_crc(&mut packet);
        Ok(packet)
    }

    /// Parse a request from the start of `bytes`.
    ///
    /// Returns the request and the number of bytes it occupied.
    ///
    /// # Errors
    ///
    /// Returns error if the start byte, command or CRC is wrong, or the packet
    /// is incomplete.
    pub fn parse(bytes: &'a [u8]) -> Result<(Self, usize), ProtocolError> {
        let mut cursor = Cursor::new(bytes);
        let header: RawRequestHeader = cursor.consume()?;
        expect_start(header.start, REQUEST_START)?;

        let payload_len = usize::from(u16::from_le(header.payload_len));
        if payload_len > MAX_REPLY_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge { length: payload_len, maximum: MAX_REPLY_PAYLOAD });
        }

        let total = Self::HEADER_SIZE + payload_len + CRC_SIZE;
        if bytes.len() < total {
            return Err(ProtocolError::IncompletePacket { received: bytes.len(), expected: total });
        }
        verify_crc(&bytes[..total])?;

        let command = Command::from_byte(header.command)
            .ok_or(ProtocolError::InvalidCommand { command: header.command })?;
        let payload = cursor.consume_bytes(payload_len)?;

        Ok((Self { command, payload }, total))
    }
}

// ============================================================================
// Replies
// ============================================================================

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawReplyHeader {
    start: u8,
    command: u8,
    status: u16,
    payload_len: u16,
}

/// Board → host reply.
///
/// Layout: `start:u8, command:u8, status:u16, payload_len:u16, payload, crc:u16`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reply<'a> {
    /// Command byte echoed by the board
    pub command: u8,
    /// Zero on success
    pub status: u16,
    /// Reply data
    pub payload: &'a [u8],
}

impl<'a> Reply<'a> {
    /// Header size in bytes
    pub const HEADER_SIZE: usize = 6;

    /// Create a reply.
    #[must_use]
    pub const fn new(command: u8, status: u16, payload: &'a [u8]) -> Self {
        Self { command, status, payload }
    }

    /// Serialize the reply including CRC.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_REPLY_PAYLOAD`].
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let payload_len: u16 = length_field(self.payload, MAX_REPLY_PAYLOAD)?;
        let mut packet = Vec::with_capacity(Self::HEADER_SIZE + self.payload.len() + CRC_SIZE);
        packet.push(REPLY_START);
        packet.push(self.command);
        packet.extend_from_slice(&self.status.to_le_bytes());
        packet.extend_from_slice(&payload_len.to_le_bytes());
        packet.extend_from_slice(self.payload);
        append_crc(&mut packet);
        Ok(packet)
    }

    /// Total packet length announced by a buffered reply header.
    ///
    /// Returns `Ok(None)` while the header is still incomplete. `bytes` must
    /// begin at a reply start byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] for an implausible length,
    /// which usually means the start byte was noise.
    pub fn packet_len(bytes: &[u8]) -> Result<Option<usize>, ProtocolError> {
        if bytes.len() < Self::HEADER_SIZE {
            return Ok(None);
        }
        let payload_len = usize::from(u16::from_le_bytes([bytes[4], bytes[5]]));
        if payload_len > MAX_REPLY_PAYLOAD {
            return Err(ProtocolError::PayloadTooLarge { length: payload_len, maximum: MAX_REPLY_PAYLOAD });
        }
        Ok(Some(Self::HEADER_SIZE + payload_len + CRC_SIZE))
    }

    /// Parse and validate a complete reply to `expected`.
    ///
    /// The CRC is checked first: a reply that fails it says nothing about the
    /// board, only that the link is not working.
    ///
    /// # Errors
    ///
    /// Returns error on a bad start byte, incomplete packet, CRC mismatch,
    /// wrong echoed command or non-zero status.
    pub fn parse(bytes: &'a [u8], expected: Command) -> Result<Self, ProtocolError> {
        let total = Self::packet_len(bytes)?.ok_or(ProtocolError::IncompletePacket {
            received: bytes.len(),
            expected: Self::HEADER_SIZE + CRC_SIZE,
        })?;
        if bytes.len() < total {
            return Err(ProtocolError::IncompletePacket { received: bytes.len(), expected: total });
        }

        let mut cursor = Cursor::new(&bytes[..total]);
        let header: RawReplyHeader = cursor.consume()?;
        expect_start(header.start, REPLY_START)?;
        verify_crc(&bytes[..total])?;

        if header.command != expected as u8 {
            return Err(ProtocolError::UnexpectedCommand { expected: expected as u8, got: header.command });
        }
        let status = u16::from_le(header.status);
        if status != 0 {
            return Err(ProtocolError::BoardStatus { status });
        }

        let payload = cursor.consume_bytes(usize::from(u16::from_le(header.payload_len)))?;
        cursor.consume_bytes(CRC_SIZE)?;
        cursor.finish()?;

        Ok(Self { command: header.command, status, payload })
    }
}

// ============================================================================
// Board Identity
// ============================================================================

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawBoardInfo {
    vid: u16,
    pid: u16,
    protocol_version: u16,
    fw_major: u8,
    fw_minor: u8,
    fw_patch: u16,
}

/// Identity reported by the board in its probe reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoardInfo {
    /// USB vendor id
    pub vid: u16,
    /// USB product id
    pub pid: u16,
    /// Protocol version implemented by the firmware
    pub protocol_version: u16,
    /// Firmware version (major, minor, patch)
    pub firmware: (u8, u8, u16),
}

impl BoardInfo {
    /// Encoded payload size in bytes
    pub const SIZE: usize = 10;

    /// Serialize as a reply payload.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let raw = RawBoardInfo {
            vid: self.vid.to_le(),
            pid: self.pid.to_le(),
            protocol_version: self.protocol_version.to_le(),
            fw_major: self.firmware.0,
            fw_minor: self.firmware.1,
            fw_patch: self.firmware.2.to_le(),
        };
        bytemuck::cast(raw)
    }

    /// Parse a GetBoardInfo reply payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Cursor`] if the payload is not exactly
    /// [`BoardInfo::SIZE`] bytes.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut cursor = Cursor::new(payload);
        let raw: RawBoardInfo = cursor.consume()?;
        cursor.finish()?;

        Ok(Self {
            vid: u16::from_le(raw.vid),
            pid: u16::from_le(raw.pid),
            protocol_version: u16::from_le(raw.protocol_version),
            firmware: (raw.fw_major, raw.fw_minor, u16::from_le(raw.fw_patch)),
        })
    }
}

// ============================================================================
// Frame Packets
// ============================================================================

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RawFrameHeader {
    start: u8,
    flags: u8,
    sequence: u32,
    payload_len: u32,
}

/// Frame packet header.
///
/// Layout: `start:u8, flags:u8, sequence:u32, payload_len:u32`, followed by
/// the payload and a CRC over header and payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Firmware-defined frame flags
    pub flags: u8,
    /// Frame counter (wraps at `u32::MAX`)
    pub sequence: u32,
    /// Payload length in bytes
    pub payload_len: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 10;

    /// Create a new header.
    #[must_use]
    pub const fn new(flags: u8, sequence: u32, payload_len: u32) -> Self {
        Self { flags, sequence, payload_len }
    }

    /// Total packet size including header, payload and CRC.
    #[must_use]
    pub const fn packet_len(&self) -> usize {
        Self::SIZE + self.payload_len as usize + CRC_SIZE
    }

    /// Parse a frame header from the start of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns error if the buffer is too short, the start byte is wrong or
    /// the payload length exceeds `max_payload`.
    pub fn parse(bytes: &[u8], max_payload: usize) -> Result<Self, ProtocolError> {
        let mut cursor = Cursor::new(bytes);
        let raw: RawFrameHeader = cursor.consume()?;
        expect_start(raw.start, FRAME_START)?;

        let payload_len = u32::from_le(raw.payload_len);
        let maximum = max_payload.min(MAX_FRAME_PAYLOAD);
        if payload_len as usize > maximum {
            return Err(ProtocolError::PayloadTooLarge { length: payload_len as usize, maximum });
        }

        Ok(Self { flags: raw.flags, sequence: u32::from_le(raw.sequence), payload_len })
    }

    /// Serialize a complete frame packet including CRC.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`MAX_FRAME_PAYLOAD`].
    pub fn encode(flags: u8, sequence: u32, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        let payload_len: u32 = length_field(payload, MAX_FRAME_PAYLOAD)?;
        let mut packet = Vec::with_capacity(Self::SIZE + payload.len() + CRC_SIZE);
        packet.push(FRAME_START);
        packet.push(flags);
        packet.extend_from_slice(&sequence.to_le_bytes());
        packet.extend_from_slice(&payload_len.to_le_bytes());
        packet.extend_from_slice(payload);
        append_crc(&mut packet);
        Ok(packet)
    }

    /// Verify a complete frame packet and return its payload.
    ///
    /// `packet` must be exactly [`packet_len`](Self::packet_len) bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::ChecksumMismatch`] on CRC failure.
    pub fn payload<'p>(&self, packet: &'p [u8]) -> Result<&'p [u8], ProtocolError> {
        if packet.len() != self.packet_len() {
            return Err(ProtocolError::IncompletePacket { received: packet.len(), expected: self.packet_len() });
        }
        let body = verify_crc(packet)?;
        Ok(&body[Self::SIZE..])
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn board_info() -> BoardInfo {
        BoardInfo { vid: 0x058B, pid: 0x0251, protocol_version: 3, firmware: (2, 5, 1042) }
    }

    #[test]
    fn test_checksum_reference_value() {
        // CRC-16/IBM-3740 check value
        assert_eq!(checksum(b"123456789"), 0x29B1);
    }

    #[test]
    fn test_request_encode_parse() {
        let packet = Request::new(Command::StartAcquisition, &[0xAB]).encode().unwrap();
        assert_eq!(&packet[..4], &[REQUEST_START, 0x10, 0x01, 0x00]);

        let (request, used) = Request::parse(&packet).unwrap();
        assert_eq!(request.command, Command::StartAcquisition);
        assert_eq!(request.payload, &[0xAB]);
        assert_eq!(used, packet.len());
    }

    #[test]
    fn test_request_incomplete() {
        let packet = Request::new(Command::GetBoardInfo, &[]).encode().unwrap();
        let result = Request::parse(&packet[..packet.len() - 1]);
        assert!(matches!(result, Err(ProtocolError::IncompletePacket { .. })));
    }

    #[test]
    fn test_reply_parse_board_info() {
        let info = board_info();
        let payload = info.to_bytes();
        let packet = Reply::new(Command::GetBoardInfo as u8, 0, &payload).encode().unwrap();

        assert_eq!(Reply::packet_len(&packet).unwrap(), Some(packet.len()));
        assert_eq!(Reply::packet_len(&packet[..3]).unwrap(), None);

        let reply = Reply::parse(&packet, Command::GetBoardInfo).unwrap();
        assert_eq!(BoardInfo::from_bytes(reply.payload).unwrap(), info);
    }

    #[test]
    fn test_reply_corrupted_crc() {
        let payload = board_info().to_bytes();
        let mut packet = Reply::new(Command::GetBoardInfo as u8, 0, &payload).encode().unwrap();
        packet[7] ^= 0x40;

        let result = Reply::parse(&packet, Command::GetBoardInfo);
        assert!(matches!(result, Err(ProtocolError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_reply_wrong_command_and_status() {
        let packet = Reply::new(Command::StopAcquisition as u8, 0, &[]).encode().unwrap();
        assert_eq!(
            Reply::parse(&packet, Command::StartAcquisition),
            Err(ProtocolError::UnexpectedCommand { expected: 0x10, got: 0x11 })
        );

        let packet = Reply::new(Command::StartAcquisition as u8, 0x0005, &[]).encode().unwrap();
        assert_eq!(
            Reply::parse(&packet, Command::StartAcquisition),
            Err(ProtocolError::BoardStatus { status: 0x0005 })
        );
    }

    #[test]
    fn test_board_info_rejects_short_and_long_payloads() {
        let bytes = board_info().to_bytes();
        assert!(matches!(BoardInfo::from_bytes(&bytes[..9]), Err(ProtocolError::Cursor(_))));

        let mut long = [0u8; 11];
        long[..10].copy_from_slice(&bytes);
        assert!(matches!(BoardInfo::from_bytes(&long), Err(ProtocolError::Cursor(_))));
    }

    #[test]
    fn test_frame_packet() {
        let payload = [1u8, 2, 3, 4, 5];
        let packet = FrameHeader::encode(0x80, 77, &payload).unwrap();

        let header = FrameHeader::parse(&packet, MAX_FRAME_PAYLOAD).unwrap();
        assert_eq!(header, FrameHeader::new(0x80, 77, 5));
        assert_eq!(header.packet_len(), packet.len());
        assert_eq!(header.payload(&packet).unwrap(), &payload);
    }

    #[test]
    fn test_frame_payload_limit() {
        let packet = FrameHeader::encode(0, 1, &[0u8; 64]).unwrap();
        let result = FrameHeader::parse(&packet, 32);
        assert_eq!(result, Err(ProtocolError::PayloadTooLarge { length: 64, maximum: 32 }));
    }

    #[test]
    fn test_encode_rejects_oversized_payloads() {
        let payload = alloc::vec![0u8; MAX_REPLY_PAYLOAD + 1];
        let too_large = ProtocolError::PayloadTooLarge { length: MAX_REPLY_PAYLOAD + 1, maximum: MAX_REPLY_PAYLOAD };
        assert_eq!(Request::new(Command::GetBoardInfo, &payload).encode(), Err(too_large));
        assert_eq!(Reply::new(0, 0, &payload).encode(), Err(too_large));

        let frame = alloc::vec![0u8; MAX_FRAME_PAYLOAD + 1];
        assert_eq!(
            FrameHeader::encode(0, 0, &frame),
            Err(ProtocolError::PayloadTooLarge { length: MAX_FRAME_PAYLOAD + 1, maximum: MAX_FRAME_PAYLOAD })
        );

        let largest = Reply::new(0, 0, &payload[..MAX_REPLY_PAYLOAD]).encode().unwrap();
        assert_eq!(Reply::packet_len(&largest).unwrap(), Some(largest.len()));
    }

    #[test]
    fn test_find_start() {
        let buffer = [0x00, 0x7F, FRAME_START, 0x00];
        assert_eq!(find_start(&buffer, FRAME_START), Some(2));
        assert_eq!(find_start(&buffer, REPLY_START), None);
    }
}
