use crate::config::{ReconnectConfig, ReconnectPolicy};
use rand::Rng;
use std::time::Duration;

/// Delays below this are raised to this value on transports without
/// low-latency failure detection (legacy/polling transports).
const LEGACY_TRANSPORT_FLOOR: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Quick,
    Steady,
}

/// Computes the delay before each reconnection attempt.
///
/// Reconnection runs in two phases. The Quick phase makes up to
/// `quick_max_retries` attempts with short, jittered delays:
///
/// ```text
/// delay = quick_initial_delay * retries - random(0, quick_initial_delay)
/// ```
///
/// After that the scheduler switches to the Steady phase, where the delay
/// follows the configured policy: a constant window, or truncated
/// exponential backoff:
///
/// ```text
/// delay = min(time_interval * 2^retries - random(0, time_interval * retries),
///             max_delay)
/// ```
///
/// `reset()` returns to the start of the Quick phase and is invoked on every
/// successful connection, so a failure after a recovery starts over with
/// quick retries.
#[derive(Debug)]
pub struct BackoffScheduler {
    config: ReconnectConfig,
    /// Whether the transport detects failures with low latency. Legacy
    /// polling transports detect drops only after tens of seconds, so their
    /// computed delays are floored at 10s.
    low_latency_transport: bool,
    phase: Phase,
    retries: u32,
}

impl BackoffScheduler {
    pub fn new(config: ReconnectConfig, low_latency_transport: bool) -> Self {
        Self {
            config,
            low_latency_transport,
            phase: Phase::Quick,
            retries: 0,
        }
    }

    /// Back to the Quick phase. Called on every successful connection.
    pub fn reset(&mut self) {
        self.phase = Phase::Quick;
        self.retries = 0;
    }

    /// Compute the delay before the next reconnection attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    /// Like [`Self::next_delay`] with an explicit RNG.
    pub fn next_delay_with<R: Rng>(&mut self, rng: &mut R) -> Duration {
        let raw = loop {
            match self.phase {
                Phase::Quick => {
                    self.retries += 1;
                    if self.retries > self.config.quick_max_retries {
                        // Quick phase exhausted (or skipped entirely when
                        // quick_max_retries is 0).
                        self.phase = Phase::Steady;
                        self.retries = 0;
                        continue;
                    }
                    let initial = self.config.quick_initial_delay.as_millis() as u64;
                    let base = initial.saturating_mul(self.retries as u64);
                    break base.saturating_sub(jitter(rng, initial));
                }
                Phase::Steady => {
                    self.retries += 1;
                    let interval = self.config.time_interval.as_millis() as u64;
                    break match self.config.policy {
                        ReconnectPolicy::ConstantWindowBackoff => interval,
                        ReconnectPolicy::TruncatedExponentialBackoff => {
                            let factor = 1u64.checked_shl(self.retries).unwrap_or(u64::MAX);
                            let base = interval.saturating_mul(factor);
                            let spread = interval.saturating_mul(self.retries as u64);
                            let max = self.config.max_delay.as_millis() as u64;
                            base.saturating_sub(jitter(rng, spread)).min(max)
                        }
                    };
                }
            }
        };

        let delay = Duration::from_millis(raw);
        if !self.low_latency_transport && delay < LEGACY_TRANSPORT_FLOOR {
            LEGACY_TRANSPORT_FLOOR
        } else {
            delay
        }
    }
}

fn jitter<R: Rng>(rng: &mut R, bound_millis: u64) -> u64 {
    if bound_millis == 0 {
        0
    } else {
        rng.gen_range(0..bound_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn config() -> ReconnectConfig {
        ReconnectConfig {
            quick_max_retries: 3,
            quick_initial_delay: Duration::from_secs(5),
            policy: ReconnectPolicy::TruncatedExponentialBackoff,
            time_interval: Duration::from_secs(20),
            max_delay: Duration::from_secs(360),
        }
    }

    #[test]
    fn test_quick_phase_delay_ranges() {
        // delay(r) in [5r-5, 5r] seconds for r = 1, 2, 3.
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let mut backoff = BackoffScheduler::new(config(), true);
            for r in 1..=3u64 {
                let delay = backoff.next_delay_with(&mut rng);
                assert!(
                    delay >= Duration::from_secs(5 * r - 5) && delay <= Duration::from_secs(5 * r),
                    "retry {r}: {delay:?} out of range"
                );
            }
        }
    }

    #[test]
    fn test_constant_window_after_quick_phase() {
        let mut backoff = BackoffScheduler::new(
            ReconnectConfig {
                policy: ReconnectPolicy::ConstantWindowBackoff,
                ..config()
            },
            true,
        );
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..3 {
            backoff.next_delay_with(&mut rng); // quick phase
        }
        for _ in 0..10 {
            assert_eq!(backoff.next_delay_with(&mut rng), Duration::from_secs(20));
        }
    }

    #[test]
    fn test_truncated_exponential_never_exceeds_max_delay() {
        let mut backoff = BackoffScheduler::new(config(), true);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..3 {
            backoff.next_delay_with(&mut rng);
        }
        // Steady retries 1..=20; raw bound at retries=5 is 20*2^5 = 640s,
        // clamped to 360s. Far retries must not overflow either.
        for _ in 0..20 {
            let delay = backoff.next_delay_with(&mut rng);
            assert!(delay <= Duration::from_secs(360), "{delay:?}");
        }
    }

    #[test]
    fn test_reset_restarts_quick_phase() {
        let mut backoff = BackoffScheduler::new(config(), true);
        let mut rng = StdRng::seed_from_u64(1);

        let first = backoff.next_delay_with(&mut rng);
        assert!(first <= Duration::from_secs(5));

        // Exhaust quick phase and go deep into steady.
        for _ in 0..8 {
            backoff.next_delay_with(&mut rng);
        }

        // Successful connection resets: the next delay is a retries=1 quick
        // delay again, with no carried-over retry count.
        backoff.reset();
        let after_reset = backoff.next_delay_with(&mut rng);
        assert!(after_reset <= Duration::from_secs(5), "{after_reset:?}");
    }

    #[test]
    fn test_zero_quick_retries_starts_in_steady() {
        let mut backoff = BackoffScheduler::new(
            ReconnectConfig {
                quick_max_retries: 0,
                policy: ReconnectPolicy::ConstantWindowBackoff,
                ..config()
            },
            true,
        );
        assert_eq!(backoff.next_delay(), Duration::from_secs(20));
    }

    #[test]
    fn test_legacy_transport_floor() {
        let mut backoff = BackoffScheduler::new(config(), false);
        let mut rng = StdRng::seed_from_u64(2);
        // Quick delays compute below 10s but are raised to the floor.
        for _ in 0..2 {
            let delay = backoff.next_delay_with(&mut rng);
            assert!(delay >= Duration::from_secs(10), "{delay:?}");
        }
    }

    #[test]
    fn test_no_floor_on_low_latency_transport() {
        let mut backoff = BackoffScheduler::new(config(), true);
        let mut rng = StdRng::seed_from_u64(2);
        let delay = backoff.next_delay_with(&mut rng);
        assert!(delay <= Duration::from_secs(5), "{delay:?}");
    }
}
