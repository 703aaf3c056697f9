//! Retransmission timer.
//!
//! The timer is not a task and has no callback: it is a deadline stored in
//! the sender's session state.  The sender waits for an ack with
//! `tokio::time::timeout_at(deadline, ..)`, so expiry and ack arrival are
//! observed by the same flow of control and can never race.  Cancelling is
//! clearing the deadline; a cancelled timer cannot fire.
//!
//! The timeout is fixed: no RTT estimation and no back-off.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    rto: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    pub fn new(rto: Duration) -> Self {
        Self { rto, deadline: None }
    }

    /// (Re)start the countdown from now.
    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.rto);
    }

    /// Disarm.  Idempotent.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    /// When the in-flight unit is due for retransmission; `None` while
    /// disarmed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}
