//! Keep-alive accounting
//!
//! Pure bookkeeping: the drain task calls [`KeepAlive::tick`] on every
//! interval and the read task calls [`KeepAlive::acknowledge`] for every
//! reply.

use std::time::{Duration, Instant};

/// Outcome of one keep-alive interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveTick {
    /// Send a challenge with this nonce
    Challenge(i64),

    /// Too many challenges went unanswered
    Expired,
}

/// Missed-challenge counter and round-trip latency for one session
#[derive(Debug)]
pub struct KeepAlive {
    max_missed: u32,
    missed: u32,
    outstanding: Option<(i64, Instant)>,
    latency: Option<Duration>,
}

impl KeepAlive {
    pub fn new(max_missed: u32) -> Self {
        Self { max_missed, missed: 0, outstanding: None, latency: None }
    }

    /// Start a new challenge, or report expiry once `max_missed` are pending
    pub fn tick(&mut self, nonce: i64) -> KeepAliveTick {
        if self.missed >= self.max_missed {
            return KeepAliveTick::Expired;
        }
        self.missed += 1;
        self.outstanding = Some((nonce, Instant::now()));
        KeepAliveTick::Challenge(nonce)
    }

    /// Record a reply; only the most recent challenge counts
    pub fn acknowledge(&mut self, nonce: i64) -> bool {
        match self.outstanding {
            Some((expected, sent_at)) if expected == nonce => {
                self.missed = 0;
                self.latency = Some(sent_at.elapsed());
                self.outstanding = None;
                true
            }
            _ => false,
        }
    }

    pub fn missed(&self) -> u32 {
        self.missed
    }

    /// Round trip of the last acknowledged challenge
    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_after_max_missed() {
        let mut keepalive = KeepAlive::new(3);
        assert_eq!(keepalive.tick(1), KeepAliveTick::Challenge(1));
        assert_eq!(keepalive.tick(2), KeepAliveTick::Challenge(2));
        assert_eq!(keepalive.tick(3), KeepAliveTick::Challenge(3));
        assert_eq!(keepalive.missed(), 3);
        assert_eq!(keepalive.tick(4), KeepAliveTick::Expired);
    }

    #[test]
    fn test_acknowledge_resets() {
        let mut keepalive = KeepAlive::new(2);
        keepalive.tick(10);
        keepalive.tick(20);
        assert!(keepalive.acknowledge(20));
        assert_eq!(keepalive.missed(), 0);
        assert!(keepalive.latency().is_some());
        assert_eq!(keepalive.tick(30), KeepAliveTick::Challenge(30));
    }

    #[test]
    fn test_stale_or_unknown_reply() {
        let mut keepalive = KeepAlive::new(5);
        assert!(!keepalive.acknowledge(1));
        keepalive.tick(10);
        keepalive.tick(20);
        assert!(!keepalive.acknowledge(10));
        assert_eq!(keepalive.missed(), 2);

        assert!(keepalive.acknowledge(20));
        // a reply is only counted once
        assert!(!keepalive.acknowledge(20));
    }
}
