use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use crate::config::Config;

/// Exponential backoff with jitter, doubling from `min` and capped at `max`
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    min: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            failures: 0,
        }
    }

    fn base(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures.min(31));
        self.min.saturating_mul(factor).min(self.max)
    }

    /// Delay before next attempt.
    ///
    /// Jitter is at most half of current base, so delays never decrease until the cap.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base();
        let jitter = if base.is_zero() {
            Duration::ZERO
        } else {
            rand::thread_rng().gen_range(Duration::ZERO..=base / 2)
        };

        self.failures = self.failures.saturating_add(1);

        (base + jitter).min(self.max)
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Plan {
    Retry { resume: bool, delay: Duration },
    GiveUp { attempts: u32 },
}

/// Decides how and when to reconnect after a connection ended
#[derive(Debug)]
pub(crate) struct ReconnectController {
    backoff: Backoff,
    /// reconnects since last connection reached connected stage
    attempts: u32,
    failing_since: Option<Instant>,
    max_retries: Option<u32>,
    max_duration: Option<Duration>,
}

impl ReconnectController {
    pub fn new(config: &Config) -> Self {
        Self {
            backoff: Backoff::new(config.backoff_min, config.backoff_max),
            attempts: 0,
            failing_since: None,
            max_retries: config.max_retries,
            max_duration: config.max_retry_duration,
        }
    }

    pub fn plan(
        &mut self,
        resume_intent: bool,
        can_resume: bool,
        min_delay: Option<Duration>,
        now: Instant,
    ) -> Plan {
        let failing_since = *self.failing_since.get_or_insert(now);

        if let Some(max) = self.max_retries {
            if self.attempts >= max {
                return Plan::GiveUp {
                    attempts: self.attempts,
                };
            }
        }

        if let Some(max) = self.max_duration {
            if now.saturating_duration_since(failing_since) >= max {
                return Plan::GiveUp {
                    attempts: self.attempts,
                };
            }
        }

        let resume = resume_intent && can_resume;

        // first resume after losing a healthy connection goes out right away
        let delay = if resume && self.attempts == 0 {
            Duration::ZERO
        } else {
            self.backoff.next_delay()
        };

        self.attempts += 1;

        Plan::Retry {
            resume,
            delay: delay.max(min_delay.unwrap_or_default()),
        }
    }

    /// Called once a connection reached connected stage
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.failing_since = None;
        self.backoff.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> Config {
        Config::default().with_backoff(Duration::from_secs(1), Duration::from_secs(60))
    }

    fn delay_of(plan: Plan) -> Duration {
        match plan {
            Plan::Retry { delay, .. } => delay,
            Plan::GiveUp { .. } => panic!("unexpected give up"),
        }
    }

    #[test]
    fn test_backoff_is_monotonic_and_capped() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(5));
        let mut last = Duration::ZERO;

        for _ in 0..40 {
            let delay = backoff.next_delay();
            assert!(delay >= last, "{:?} < {:?}", delay, last);
            assert!(delay <= Duration::from_secs(5));
            last = delay;
        }
        assert_eq!(last, Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_reset_returns_to_minimum() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));

        for _ in 0..5 {
            backoff.next_delay();
        }
        backoff.reset();

        let delay = backoff.next_delay();
        assert!(delay >= Duration::from_secs(1));
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn test_first_resume_is_immediate() {
        let mut controller = ReconnectController::new(&config());
        let now = Instant::now();

        assert_eq!(
            controller.plan(true, true, None, now),
            Plan::Retry {
                resume: true,
                delay: Duration::ZERO
            }
        );

        // resume failed again, back off
        assert!(delay_of(controller.plan(true, true, None, now)) >= Duration::from_secs(1));
    }

    #[test]
    fn test_resume_without_session_identifies() {
        let mut controller = ReconnectController::new(&config());

        match controller.plan(true, false, None, Instant::now()) {
            Plan::Retry { resume, delay } => {
                assert!(!resume);
                assert!(delay >= Duration::from_secs(1));
            }
            plan => panic!("unexpected plan {:?}", plan),
        }
    }

    #[test]
    fn test_non_resumable_delays_non_decreasing_then_reset() {
        let mut controller = ReconnectController::new(&config());
        let now = Instant::now();
        let mut last = Duration::ZERO;

        for _ in 0..10 {
            let delay = delay_of(controller.plan(false, true, None, now));
            assert!(delay >= last);
            last = delay;
        }

        controller.reset();
        let delay = delay_of(controller.plan(false, true, None, now));
        assert!(delay <= Duration::from_millis(1500));
    }

    #[test]
    fn test_min_delay_is_respected() {
        let mut controller = ReconnectController::new(&config());

        let delay = delay_of(controller.plan(
            true,
            true,
            Some(Duration::from_secs(3)),
            Instant::now(),
        ));
        assert_eq!(delay, Duration::from_secs(3));
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let mut controller = ReconnectController::new(&config().with_max_retries(2));
        let now = Instant::now();

        delay_of(controller.plan(true, true, None, now));
        delay_of(controller.plan(true, true, None, now));
        assert_eq!(
            controller.plan(true, true, None, now),
            Plan::GiveUp { attempts: 2 }
        );
    }

    #[test]
    fn test_gives_up_after_max_duration() {
        let mut controller =
            ReconnectController::new(&config().with_max_retry_duration(Duration::from_secs(30)));
        let start = Instant::now();

        delay_of(controller.plan(false, false, None, start));
        delay_of(controller.plan(false, false, None, start + Duration::from_secs(10)));
        assert!(matches!(
            controller.plan(false, false, None, start + Duration::from_secs(31)),
            Plan::GiveUp { attempts: 2 }
        ));
    }
}
