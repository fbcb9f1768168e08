//! Config-update mailbox.
//!
//! Tuning commands arrive on the host's I/O task; the control loop is the
//! only writer of its own state. New configs go through this bounded
//! channel and are applied between ticks, never mid-tick.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Channel;
use keel_config::BalanceConfig;

pub const CONFIG_QUEUE_DEPTH: usize = 2;

pub struct ConfigMailbox<M: RawMutex> {
    channel: Channel<M, BalanceConfig, CONFIG_QUEUE_DEPTH>,
}

impl<M: RawMutex> ConfigMailbox<M> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Producer side (I/O task). Returns false when the loop is behind and
    /// the queue is full; the caller should retry rather than block.
    pub fn submit(&self, cfg: BalanceConfig) -> bool {
        self.channel.try_send(cfg).is_ok()
    }

    /// Consumer side, polled once per tick by the control loop.
    pub fn take(&self) -> Option<BalanceConfig> {
        self.channel.try_receive().ok()
    }
}

impl<M: RawMutex> Default for ConfigMailbox<M> {
    fn default() -> Self {
        Self::new()
    }
}
