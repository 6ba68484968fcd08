//! Discovery and acquisition configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use radarlink_core::protocol::{BoardInfo, MAX_FRAME_PAYLOAD};

/// Default baud rate tried first
pub const PRIMARY_BAUD_RATE: u32 = 921_600;

/// Baud rate tried when the primary one is rejected.
///
/// Some debugger bridges cannot run the primary rate; the CRC on the probe
/// reply tells the two apart.
pub const FALLBACK_BAUD_RATE: u32 = 1_000_000;

/// A board the host knows how to talk to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardDescriptor {
    /// USB vendor id
    pub vid: u16,
    /// USB product id
    pub pid: u16,
    /// Human-readable board name
    pub name: String,
}

impl BoardDescriptor {
    /// Create a descriptor.
    #[must_use]
    pub fn new(vid: u16, pid: u16, name: impl Into<String>) -> Self {
        Self { vid, pid, name: name.into() }
    }

    /// True if `info` identifies this board.
    #[must_use]
    pub fn matches(&self, info: &BoardInfo) -> bool {
        self.vid == info.vid && self.pid == info.pid
    }
}

/// Configuration for board discovery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Baud rate of the first attempt
    pub primary_baud_rate: u32,

    /// Baud rate of the retry
    pub fallback_baud_rate: u32,

    /// How long to wait for a complete probe reply
    pub probe_timeout: Duration,

    /// Boards accepted by the handshake
    pub known_boards: Vec<BoardDescriptor>,
}

impl DiscoveryConfig {
    /// Baud rates in the order they are tried.
    #[must_use]
    pub fn baud_rates(&self) -> [u32; 2] {
        [self.primary_baud_rate, self.fallback_baud_rate]
    }

    /// Look up the descriptor matching a probe reply.
    #[must_use]
    pub fn find_board(&self, info: &BoardInfo) -> Option<&BoardDescriptor> {
        self.known_boards.iter().find(|board| board.matches(info))
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            primary_baud_rate: PRIMARY_BAUD_RATE,
            fallback_baud_rate: FALLBACK_BAUD_RATE,
            probe_timeout: Duration::from_millis(200),
            known_boards: vec![
                BoardDescriptor::new(0x058B, 0x0251, "Radar Baseboard MCU7"),
                BoardDescriptor::new(0x058B, 0x0253, "Radar Baseboard V9"),
                BoardDescriptor::new(0x058B, 0x0257, "Radar Baseboard X"),
            ],
        }
    }
}

/// Configuration for the acquisition pipeline.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Frame queue capacity (0 = unbounded)
    pub queue_capacity: usize,

    /// Timeout of a single frame read; bounds how long `stop` waits
    pub read_timeout: Duration,

    /// Largest accepted frame payload in bytes
    pub max_frame_payload: usize,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 16,
            read_timeout: Duration::from_millis(50),
            max_frame_payload: MAX_FRAME_PAYLOAD,
        }
    }
}
