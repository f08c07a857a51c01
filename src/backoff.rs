//! Adaptive retry with exponential backoff.
//!
//! Every remote call (listing, track discovery, payload fetch) goes through
//! [`BackoffController::execute`]. Retryable errors are retried after
//! `min(max_delay, base * 2^attempt)` plus jitter; anything else propagates
//! immediately. Sustained rate limiting widens the base delay used by later
//! calls in the same run, and a streak of successes shrinks it back.

use crate::config::{BackoffSettings, DownloadSettings};
use crate::error::{Result, YtragError};
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

const OUTCOME_WINDOW: usize = 20;

/// Static retry configuration.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    /// Configured base delay; the adaptive base never drops below it.
    pub base_delay: Duration,
    /// Hard cap for any single delay, jitter included.
    pub max_delay: Duration,
    /// Total attempts per operation, including the first.
    pub max_attempts: u32,
    /// Jitter range as a fraction of the computed delay.
    pub jitter_fraction: f64,
    /// Successes required after a rate limit before decay starts.
    pub cooldown_successes: u32,
    /// How much the widened base shrinks per success after cooldown.
    pub decay: Duration,
    /// Timeout applied to each individual attempt.
    pub attempt_timeout: Duration,
    /// Minimum pause between videos.
    pub request_interval: Duration,
}

impl BackoffPolicy {
    pub fn from_settings(backoff: &BackoffSettings, download: &DownloadSettings) -> Self {
        Self {
            base_delay: Duration::from_millis(backoff.base_delay_ms),
            max_delay: Duration::from_millis(backoff.max_delay_ms),
            max_attempts: backoff.max_attempts.max(1),
            jitter_fraction: backoff.jitter_fraction.clamp(0.0, 1.0),
            cooldown_successes: backoff.cooldown_successes,
            decay: Duration::from_millis(backoff.decay_ms),
            attempt_timeout: download.attempt_timeout(),
            request_interval: download.request_interval(),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_settings(&BackoffSettings::default(), &DownloadSettings::default())
    }
}

/// Rolling view of recent outcomes and the current effective base delay.
#[derive(Debug, Clone)]
pub struct AdaptiveState {
    effective_base: Duration,
    cooldown_remaining: u32,
    recent: VecDeque<bool>,
}

impl AdaptiveState {
    fn new(base: Duration) -> Self {
        Self {
            effective_base: base,
            cooldown_remaining: 0,
            recent: VecDeque::with_capacity(OUTCOME_WINDOW),
        }
    }

    fn push(&mut self, ok: bool) {
        if self.recent.len() == OUTCOME_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(ok);
    }

    fn on_retryable(&mut self, policy: &BackoffPolicy) {
        self.push(false);
        self.effective_base = self
            .effective_base
            .saturating_mul(2)
            .min(policy.max_delay)
            .max(policy.base_delay);
        self.cooldown_remaining = policy.cooldown_successes;
    }

    fn on_success(&mut self, policy: &BackoffPolicy) {
        self.push(true);
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
        } else {
            self.effective_base = self
                .effective_base
                .saturating_sub(policy.decay)
                .max(policy.base_delay);
        }
    }

    /// Fraction of failed attempts among the recent window.
    pub fn failure_rate(&self) -> f64 {
        if self.recent.is_empty() {
            return 0.0;
        }
        let failures = self.recent.iter().filter(|ok| !**ok).count();
        failures as f64 / self.recent.len() as f64
    }

    pub fn effective_base(&self) -> Duration {
        self.effective_base
    }
}

/// Retry controller with adaptive base delay. One instance per pipeline.
pub struct BackoffController {
    policy: BackoffPolicy,
    state: AdaptiveState,
}

impl BackoffController {
    pub fn new(policy: BackoffPolicy) -> Self {
        let state = AdaptiveState::new(policy.base_delay);
        Self { policy, state }
    }

    pub fn policy(&self) -> &BackoffPolicy {
        &self.policy
    }

    pub fn state(&self) -> &AdaptiveState {
        &self.state
    }

    /// Delay before retry number `attempt` (0-indexed), without jitter.
    pub fn nominal_delay(&self, base: Duration, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        base.checked_mul(multiplier)
            .unwrap_or(self.policy.max_delay)
            .min(self.policy.max_delay)
    }

    /// Delay before retry number `attempt`, with jitter, never above `max_delay`.
    pub fn delay_for_attempt(&self, base: Duration, attempt: u32) -> Duration {
        let nominal = self.nominal_delay(base, attempt);
        if self.policy.jitter_fraction <= 0.0 {
            return nominal;
        }

        let spread = nominal.mul_f64(self.policy.jitter_fraction);
        let jitter = spread.mul_f64(rand::random::<f64>());
        (nominal + jitter).min(self.policy.max_delay)
    }

    /// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
    pub async fn execute<T, F, Fut>(&mut self, label: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        // Later attempts of this call grow from the base seen at its start.
        let base = self.state.effective_base;

        for attempt in 0..self.policy.max_attempts {
            let outcome = match tokio::time::timeout(self.policy.attempt_timeout, operation()).await
            {
                Ok(result) => result,
                Err(_) => Err(YtragError::Timeout(self.policy.attempt_timeout.as_secs())),
            };

            let err = match outcome {
                Ok(value) => {
                    self.state.on_success(&self.policy);
                    return Ok(value);
                }
                Err(err) if err.is_retryable() => err,
                Err(err) => return Err(err),
            };

            self.state.on_retryable(&self.policy);

            if attempt + 1 >= self.policy.max_attempts {
                warn!(
                    operation = label,
                    attempts = self.policy.max_attempts,
                    error = %err,
                    "Retries exhausted"
                );
                return Err(YtragError::ExhaustedRetries {
                    attempts: self.policy.max_attempts,
                    last: Box::new(err),
                });
            }

            let delay = self.delay_for_attempt(base, attempt);
            warn!(
                operation = label,
                attempt = attempt + 1,
                max = self.policy.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Retrying after transient error"
            );
            tokio::time::sleep(delay).await;
        }

        // max_attempts is at least 1, so the loop always returns.
        Err(YtragError::ExhaustedRetries {
            attempts: self.policy.max_attempts,
            last: Box::new(YtragError::Transient(format!("{} never ran", label))),
        })
    }

    /// Pause between videos: the request interval plus any adaptive widening.
    pub async fn pace(&self) {
        let widening = self
            .state
            .effective_base
            .saturating_sub(self.policy.base_delay);
        let pause = self.policy.request_interval + widening;
        if pause.is_zero() {
            return;
        }
        debug!(pause_ms = pause.as_millis() as u64, "Pacing before next video");
        tokio::time::sleep(pause).await;
    }
}
