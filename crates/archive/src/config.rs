use log::warn;

use crate::archive::DEFAULT_RETENTION_COUNT;

pub const DEFAULT_MAX_PACKET_SIZE: usize = 1400;
pub const MAX_DATAGRAM_SIZE: usize = 8192;
pub const DEFAULT_TICK_RATE: u32 = 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("max packet size must be greater than zero")]
    ZeroPacketSize,
    #[error("retention count must be greater than zero")]
    ZeroRetention,
    #[error("tick rate must be greater than zero")]
    ZeroTickRate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub max_packet_size: usize,
    pub retention_count: usize,
    pub tick_rate: u32,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            retention_count: DEFAULT_RETENTION_COUNT,
            tick_rate: DEFAULT_TICK_RATE,
        }
    }
}

impl ArchiveConfig {
    /// Builds a config with `max_packet_size` clamped to [`MAX_DATAGRAM_SIZE`].
    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        let max_packet_size = if max_packet_size > MAX_DATAGRAM_SIZE {
            warn!(
                "max packet size {} exceeds {} bytes, clamping",
                max_packet_size, MAX_DATAGRAM_SIZE
            );
            MAX_DATAGRAM_SIZE
        } else {
            max_packet_size
        };

        Self {
            max_packet_size,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_packet_size == 0 {
            return Err(ConfigError::ZeroPacketSize);
        }
        if self.retention_count == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        Ok(())
    }

    /// Bytes the archive allocates; retention is rounded up to a power of two.
    pub fn region_size(&self) -> usize {
        self.max_packet_size
            .saturating_mul(self.retention_count.max(1).next_power_of_two())
    }

    /// Minimum number of ticks between two serviced missing-packet requests.
    pub fn resend_throttle_ticks(&self) -> u32 {
        self.tick_rate / 4
    }
}
