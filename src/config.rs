use std::time::Duration;
use anyhow::bail;

#[derive(Debug, Clone)]
pub struct AnnounceConfig {
    /// Capacity of each group's circular announce history. When it is full, the oldest slot is
    ///  overwritten.
    pub max_saved_announces_per_group: usize,

    /// A group entry that did not receive an announce for this long is dropped as a whole
    pub announce_expiry: Duration,

    /// Upper bound for the number of announces put into a single discovery response
    pub max_sent_announces: usize,
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        AnnounceConfig {
            max_saved_announces_per_group: 16,
            announce_expiry: Duration::from_secs(30),
            max_sent_announces: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Number of slots in both the send and the receive window. This is not negotiated, so it
    ///  must be the same on both peers.
    pub window_size: u32,

    /// An unacknowledged packet is retransmitted once this much time passed since its last
    ///  transmission
    pub resend_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            window_size: 8192,
            resend_interval: Duration::from_secs(1),
        }
    }
}

impl ChannelConfig {
    pub fn resend_interval_millis(&self) -> u64 {
        self.resend_interval.as_millis()
            .try_into()
            .unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub announce: AnnounceConfig,
    pub channel: ChannelConfig,
}

impl CoreConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.announce.max_saved_announces_per_group == 0 {
            bail!("announce history per group must have room for at least one announce");
        }
        if self.announce.announce_expiry.is_zero() {
            bail!("announce expiry must be positive");
        }
        if self.announce.max_sent_announces == 0 || self.announce.max_sent_announces > u8::MAX as usize {
            bail!("number of announces per response must be between 1 and {}", u8::MAX);
        }
        if self.channel.window_size == 0 {
            bail!("window size must be positive");
        }
        // the window size is part of the wire protocol, and peers expect it to fit into a u16
        if self.channel.window_size > u16::MAX as u32 {
            bail!("window size {} exceeds the maximum of {}", self.channel.window_size, u16::MAX);
        }
        if self.channel.resend_interval.is_zero() {
            bail!("resend interval must be positive");
        }

        Ok(())
    }
}
