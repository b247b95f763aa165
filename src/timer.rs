//! Retransmission timeout and attempt accounting.
//!
//! Stop-and-wait recovers from every loss by resending the in-flight packet
//! if no acceptable ACK arrives within a fixed timeout.  The reference
//! protocol retries forever; [`RetransmitTimer`] can optionally cap the
//! number of transmissions so a caller gets a terminal failure instead of an
//! indefinite block.

use std::time::Duration;

/// Default read deadline for an ACK.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Adjustable retransmission parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    /// How long to wait for a response after each transmission.
    pub timeout: Duration,
    /// Maximum transmissions of one packet; `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_attempts: None,
        }
    }
}

/// Attempt counter for the packet currently in flight.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    pub config: TimerConfig,
    attempts: u32,
}

impl RetransmitTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Deadline for the next response.
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Transmissions since the last [`RetransmitTimer::reset`].
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// `true` if another transmission is allowed.
    pub fn may_transmit(&self) -> bool {
        self.config
            .max_attempts
            .map_or(true, |max| self.attempts < max)
    }

    /// Count one transmission.
    pub fn on_transmit(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// Start counting afresh for a new packet.
    pub fn reset(&mut self) {
        self.attempts = 0;
    }
}

impl Default for RetransmitTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}
