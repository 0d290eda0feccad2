use crate::config::KeepaliveConfig;
use std::time::Instant;
use tokio::time::Duration;

/// Tracks keepalive state for one connected session.
///
/// The connection driver pings on an interval and counts pong timeouts;
/// after `failure_threshold` consecutive timeouts the session is declared
/// dead and the normal reconnection path takes over. Any received frame
/// counts as liveness for ping scheduling purposes.
#[derive(Debug)]
pub struct Keepalive {
    config: KeepaliveConfig,
    last_ping_sent: Option<Instant>,
    consecutive_failures: u32,
    waiting_for_pong: bool,
}

impl Keepalive {
    pub fn new(config: KeepaliveConfig) -> Self {
        Self {
            config,
            last_ping_sent: None,
            consecutive_failures: 0,
            waiting_for_pong: false,
        }
    }

    pub fn record_ping_sent(&mut self) {
        self.last_ping_sent = Some(Instant::now());
        self.waiting_for_pong = true;
    }

    pub fn record_pong_received(&mut self) {
        self.consecutive_failures = 0;
        self.waiting_for_pong = false;
    }

    /// Whether a ping is due. Never true while a pong is outstanding.
    pub fn should_send_ping(&self) -> bool {
        if self.waiting_for_pong {
            return false;
        }
        match self.last_ping_sent {
            None => true,
            Some(last) => last.elapsed() >= self.config.ping_interval,
        }
    }

    /// Check for an overdue pong, recording a failure if one is detected.
    /// Side-effecting; call once per check cycle.
    pub fn check_and_record_pong_timeout(&mut self) -> bool {
        if !self.waiting_for_pong {
            return false;
        }
        match self.last_ping_sent {
            None => false,
            Some(last) => {
                if last.elapsed() >= self.config.pong_timeout {
                    self.consecutive_failures += 1;
                    self.waiting_for_pong = false;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn is_dead(&self) -> bool {
        self.consecutive_failures >= self.config.failure_threshold
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Time until the next keepalive action (ping due or pong deadline),
    /// for the driver's select timer.
    pub fn next_deadline(&self) -> Duration {
        match self.last_ping_sent {
            None => Duration::ZERO,
            Some(last) => {
                let interval = if self.waiting_for_pong {
                    self.config.pong_timeout
                } else {
                    self.config.ping_interval
                };
                interval.saturating_sub(last.elapsed())
            }
        }
    }
}
