//! Connection state machine
//!
//! The reconnect policy is a plain value object so the five-state
//! lifecycle (`disconnected → connecting → connected → disconnected →
//! connecting → … → error`) is testable without any transport. The
//! session event loop owns one policy per connection and consults it on
//! every close.

use std::fmt;
use std::time::Duration;

/// Connection status as observed by consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Terminal until the session is explicitly re-entered.
    Error,
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkStatus::Disconnected => "disconnected",
            LinkStatus::Connecting => "connecting",
            LinkStatus::Connected => "connected",
            LinkStatus::Error => "error",
        };
        write!(f, "{}", name)
    }
}

/// Bounded fixed-interval reconnect policy
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
    interval: Duration,
}

impl ReconnectPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            interval,
        }
    }

    /// Consecutive closes seen since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// A successful open handshake resets the attempt counter.
    pub fn on_connected(&mut self) {
        self.attempts = 0;
    }

    /// Record a close event. Returns the delay before the next attempt,
    /// or `None` once the budget is exhausted and the link must go
    /// terminal.
    pub fn on_close(&mut self) -> Option<Duration> {
        self.attempts += 1;
        if self.attempts < self.max_attempts {
            Some(self.interval)
        } else {
            None
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_attempt_budget() {
        let mut policy = ReconnectPolicy::new(10, Duration::from_millis(3000));

        // Nine consecutive closes schedule a retry.
        for i in 1..10 {
            let delay = policy.on_close();
            assert_eq!(delay, Some(Duration::from_millis(3000)), "close #{}", i);
            assert!(!policy.exhausted());
        }

        // The tenth close exhausts the budget: no timer is scheduled.
        assert_eq!(policy.on_close(), None);
        assert!(policy.exhausted());
        assert_eq!(policy.attempts(), 10);
    }

    #[test]
    fn test_connect_resets_counter() {
        let mut policy = ReconnectPolicy::new(10, Duration::from_millis(1));

        for _ in 0..9 {
            assert!(policy.on_close().is_some());
        }
        policy.on_connected();
        assert_eq!(policy.attempts(), 0);

        // Full budget available again after an intervening connect.
        for _ in 0..9 {
            assert!(policy.on_close().is_some());
        }
        assert_eq!(policy.on_close(), None);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(LinkStatus::Connected.to_string(), "connected");
        assert_eq!(LinkStatus::Error.to_string(), "error");
    }
}
