//! Backoff policies: how long to wait before the next attempt.
//!
//! Retrying immediately after a transient failure tends to hit the service
//! while it is still recovering, and many clients retrying in lockstep make
//! it worse. [`ExponentialBackoffPolicy`] grows the delay geometrically with
//! the attempt number and scales each delay by a random factor.
//!
//! # Example
//! ```
//! use tablemut::policy::{BackoffPolicy, ExponentialBackoffPolicy};
//! use std::time::Duration;
//!
//! let mut backoff = ExponentialBackoffPolicy::builder()
//!     .with_initial_delay(Duration::from_millis(10))
//!     .with_maximum_delay(Duration::from_secs(1))
//!     .build()?;
//! assert!(backoff.on_completion() <= Duration::from_secs(1));
//! # Ok::<(), tablemut::Error>(())
//! ```

use super::Prototype;
use crate::core::{CallContext, Error, Result};
use rand::Rng;
use std::fmt;
use std::time::Duration;

/// Computes the delay before the next attempt.
pub trait BackoffPolicy: Send + Sync + fmt::Debug {
    /// A new instance with the same configuration and the attempt count reset.
    fn clone_box(&self) -> Box<dyn BackoffPolicy>;

    fn setup(&self, _ctx: &mut CallContext) {}

    /// Called after each failed (or not yet finished) attempt. Never fails.
    fn on_completion(&mut self) -> Duration;
}

impl BackoffPolicy for Box<dyn BackoffPolicy> {
    fn clone_box(&self) -> Box<dyn BackoffPolicy> {
        (**self).clone_box()
    }

    fn setup(&self, ctx: &mut CallContext) {
        (**self).setup(ctx)
    }

    fn on_completion(&mut self) -> Duration {
        (**self).on_completion()
    }
}

impl Prototype for Box<dyn BackoffPolicy> {
    fn fresh(&self) -> Self {
        self.clone_box()
    }
}

/// Truncated exponential backoff with multiplicative jitter.
///
/// The n-th delay (n starting at 0) is
/// `min(maximum_delay, initial_delay * growth^n)` scaled by a factor drawn
/// uniformly from `[jitter_min, jitter_max]`, and never exceeds
/// `maximum_delay`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicy {
    initial_delay: Duration,
    maximum_delay: Duration,
    growth: f64,
    jitter_min: f64,
    jitter_max: f64,
    attempt: u32,
}

impl ExponentialBackoffPolicy {
    pub fn builder() -> ExponentialBackoffPolicyBuilder {
        ExponentialBackoffPolicyBuilder::new()
    }

    /// Shorthand for a policy with default growth and jitter.
    pub fn new(initial_delay: Duration, maximum_delay: Duration) -> Result<Self> {
        Self::builder()
            .with_initial_delay(initial_delay)
            .with_maximum_delay(maximum_delay)
            .build()
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn maximum_delay(&self) -> Duration {
        self.maximum_delay
    }

    /// Number of delays handed out so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The delay before retry number `attempt`, before jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let scale = self.growth.powi(exp);
        let limit = self.maximum_delay.as_secs_f64() / self.initial_delay.as_secs_f64();
        if !scale.is_finite() || scale >= limit {
            return self.maximum_delay;
        }
        self.initial_delay.mul_f64(scale)
    }

    /// The jittered delay before retry number `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base = self.base_delay(attempt);
        let factor = rng.gen_range(self.jitter_min..=self.jitter_max);
        Duration::try_from_secs_f64(base.as_secs_f64() * factor)
            .unwrap_or(self.maximum_delay)
            .min(self.maximum_delay)
    }
}

impl Default for ExponentialBackoffPolicy {
    fn default() -> Self {
        let builder = ExponentialBackoffPolicyBuilder::new();
        ExponentialBackoffPolicy {
            initial_delay: builder.initial_delay,
            maximum_delay: builder.maximum_delay,
            growth: builder.growth,
            jitter_min: builder.jitter_min,
            jitter_max: builder.jitter_max,
            attempt: 0,
        }
    }
}

impl Prototype for ExponentialBackoffPolicy {
    fn fresh(&self) -> Self {
        Self {
            attempt: 0,
            ..self.clone()
        }
    }
}

impl BackoffPolicy for ExponentialBackoffPolicy {
    fn clone_box(&self) -> Box<dyn BackoffPolicy> {
        Box::new(self.fresh())
    }

    fn on_completion(&mut self) -> Duration {
        let delay = self.delay_for_attempt(self.attempt, &mut rand::thread_rng());
        self.attempt = self.attempt.saturating_add(1);
        delay
    }
}

/// Validating builder for [`ExponentialBackoffPolicy`].
#[derive(Debug, Clone)]
pub struct ExponentialBackoffPolicyBuilder {
    initial_delay: Duration,
    maximum_delay: Duration,
    growth: f64,
    jitter_min: f64,
    jitter_max: f64,
}

impl ExponentialBackoffPolicyBuilder {
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            maximum_delay: Duration::from_secs(5 * 60),
            growth: 2.0,
            jitter_min: 0.5,
            jitter_max: 1.5,
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_maximum_delay(mut self, delay: Duration) -> Self {
        self.maximum_delay = delay;
        self
    }

    pub fn with_growth(mut self, growth: f64) -> Self {
        self.growth = growth;
        self
    }

    pub fn with_jitter(mut self, min: f64, max: f64) -> Self {
        self.jitter_min = min;
        self.jitter_max = max;
        self
    }

    pub fn build(self) -> Result<ExponentialBackoffPolicy> {
        self.validate()?;
        Ok(ExponentialBackoffPolicy {
            initial_delay: self.initial_delay,
            maximum_delay: self.maximum_delay,
            growth: self.growth,
            jitter_min: self.jitter_min,
            jitter_max: self.jitter_max,
            attempt: 0,
        })
    }

    fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(Error::Config(
                "initial backoff delay must be greater than zero".to_string(),
            ));
        }
        if self.maximum_delay < self.initial_delay {
            return Err(Error::Config(format!(
                "maximum backoff delay ({:?}) must be >= initial delay ({:?})",
                self.maximum_delay, self.initial_delay
            )));
        }
        if !(self.growth >= 1.0 && self.growth.is_finite()) {
            return Err(Error::Config(format!(
                "backoff growth ({}) must be a finite value >= 1.0",
                self.growth
            )));
        }
        if !(self.jitter_min >= 0.0 && self.jitter_min <= self.jitter_max)
            || !self.jitter_max.is_finite()
        {
            return Err(Error::Config(format!(
                "backoff jitter range [{}, {}] is invalid",
                self.jitter_min, self.jitter_max
            )));
        }
        Ok(())
    }
}

impl Default for ExponentialBackoffPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn policy(initial_ms: u64, maximum_ms: u64) -> ExponentialBackoffPolicy {
        ExponentialBackoffPolicy::new(
            Duration::from_millis(initial_ms),
            Duration::from_millis(maximum_ms),
        )
        .unwrap()
    }

    #[test]
    fn test_base_delay_grows_and_truncates() {
        let p = policy(100, 1_000);
        assert_eq!(p.base_delay(0), Duration::from_millis(100));
        assert_eq!(p.base_delay(1), Duration::from_millis(200));
        assert_eq!(p.base_delay(2), Duration::from_millis(400));
        assert_eq!(p.base_delay(3), Duration::from_millis(800));
        assert_eq!(p.base_delay(4), Duration::from_secs(1));
        assert_eq!(p.base_delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let p = policy(100, 10_000);
        let mut rng = StdRng::seed_from_u64(7);
        for attempt in 0..5 {
            let base = p.base_delay(attempt);
            for _ in 0..100 {
                let d = p.delay_for_attempt(attempt, &mut rng);
                assert!(d >= base.mul_f64(0.5), "{d:?} < half of {base:?}");
                assert!(d <= base.mul_f64(1.5), "{d:?} > 1.5x {base:?}");
            }
        }
    }

    #[test]
    fn test_jittered_delay_never_exceeds_maximum() {
        let p = policy(100, 150);
        let mut rng = StdRng::seed_from_u64(11);
        for attempt in 0..10 {
            assert!(p.delay_for_attempt(attempt, &mut rng) <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_on_completion_advances_and_clone_resets() {
        let mut p = ExponentialBackoffPolicy::builder()
            .with_initial_delay(Duration::from_millis(10))
            .with_maximum_delay(Duration::from_secs(10))
            .with_jitter(1.0, 1.0)
            .build()
            .unwrap();
        assert_eq!(p.on_completion(), Duration::from_millis(10));
        assert_eq!(p.on_completion(), Duration::from_millis(20));
        assert_eq!(p.on_completion(), Duration::from_millis(40));
        assert_eq!(p.attempt(), 3);

        let mut fresh = p.clone_box();
        assert_eq!(fresh.on_completion(), Duration::from_millis(10));
    }

    #[test]
    fn test_builder_rejects_invalid_settings() {
        let b = ExponentialBackoffPolicy::builder().with_initial_delay(Duration::ZERO);
        assert!(matches!(b.build(), Err(Error::Config(_))));

        let b = ExponentialBackoffPolicy::builder()
            .with_initial_delay(Duration::from_secs(10))
            .with_maximum_delay(Duration::from_secs(1));
        assert!(matches!(b.build(), Err(Error::Config(_))));

        let b = ExponentialBackoffPolicy::builder().with_growth(0.5);
        assert!(matches!(b.build(), Err(Error::Config(_))));

        let b = ExponentialBackoffPolicy::builder().with_jitter(1.5, 0.5);
        assert!(matches!(b.build(), Err(Error::Config(_))));
    }
}
