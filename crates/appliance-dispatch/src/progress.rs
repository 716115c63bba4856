// Copyright © 2025 Lukas Bower
// SPDX-License-Identifier: Apache-2.0
// Purpose: Rate limiting for progress notifications.
// Author: Lukas Bower

use std::time::{Duration, Instant};

/// When progress notifications may be sent during a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPolicy {
    /// Quiet period after the call starts. Short calls send nothing.
    pub initial_delay: Duration,
    /// Minimum spacing between notifications.
    pub period: Duration,
}

impl Default for ProgressPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            period: Duration::from_micros(333_333),
        }
    }
}

impl ProgressPolicy {
    /// Send every notification.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            period: Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ProgressLimiter {
    policy: ProgressPolicy,
    started: Instant,
    last_sent: Option<Instant>,
}

impl ProgressLimiter {
    pub(crate) fn new(policy: ProgressPolicy) -> Self {
        Self {
            policy,
            started: Instant::now(),
            last_sent: None,
        }
    }

    /// Whether a notification at `position` of `total` should go out now.
    /// The final notification is only sent when an earlier one was, so the
    /// peer always sees a completed bar or none at all.
    pub(crate) fn admit(&mut self, position: u64, total: u64, now: Instant) -> bool {
        let admit = if position >= total {
            self.last_sent.is_some()
        } else if now.duration_since(self.started) < self.policy.initial_delay {
            false
        } else {
            match self.last_sent {
                Some(last) => now.duration_since(last) >= self.policy.period,
                None => true,
            }
        };
        if admit {
            self.last_sent = Some(now);
        }
        admit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_period_suppresses_early_updates() {
        let mut limiter = ProgressLimiter::new(ProgressPolicy::default());
        let start = limiter.started;
        assert!(!limiter.admit(1, 10, start + Duration::from_millis(100)));
        // Nothing was sent, so completion stays silent too.
        assert!(!limiter.admit(10, 10, start + Duration::from_millis(200)));
    }

    #[test]
    fn period_spaces_updates_and_completion_follows() {
        let mut limiter = ProgressLimiter::new(ProgressPolicy::default());
        let start = limiter.started;
        assert!(limiter.admit(1, 10, start + Duration::from_secs(3)));
        assert!(!limiter.admit(2, 10, start + Duration::from_millis(3100)));
        assert!(limiter.admit(3, 10, start + Duration::from_millis(3400)));
        assert!(limiter.admit(10, 10, start + Duration::from_millis(3401)));
    }

    #[test]
    fn immediate_policy_admits_everything() {
        let mut limiter = ProgressLimiter::new(ProgressPolicy::immediate());
        let now = limiter.started;
        assert!(limiter.admit(0, 4, now));
        assert!(limiter.admit(1, 4, now));
        assert!(limiter.admit(4, 4, now));
    }
}
