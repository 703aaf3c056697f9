//! Tunable protocol parameters.

use std::time::Duration;

/// Retransmission timeout used when nothing else is configured.
pub const DEFAULT_RETRANSMIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Session parameters shared by [`crate::sender::Sender`] and
/// [`crate::receiver::Receiver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdtConfig {
    /// Fixed time to wait for a matching ack before resending the unit.
    pub retransmit_timeout: Duration,

    /// How long a closing receiver keeps re-acknowledging retransmitted
    /// units before releasing its transport.  Ends early if the peer closes.
    pub linger: Duration,

    /// Upper bound on transmissions of the end-of-stream unit.
    ///
    /// `None` retries until the ack or the peer's close is observed.
    pub close_attempts: Option<u32>,
}

impl Default for RdtConfig {
    fn default() -> Self {
        Self {
            retransmit_timeout: DEFAULT_RETRANSMIT_TIMEOUT,
            linger: DEFAULT_RETRANSMIT_TIMEOUT * 2,
            close_attempts: None,
        }
    }
}

impl RdtConfig {
    pub fn with_retransmit_timeout(mut self, rto: Duration) -> Self {
        self.retransmit_timeout = rto;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }

    pub fn with_close_attempts(mut self, attempts: u32) -> Self {
        self.close_attempts = Some(attempts.max(1));
        self
    }
}
