use std::time::Duration;

/// Exponential backoff policy for segment fetches.
///
/// Defaults follow the engine's historical behavior: four attempts total with
/// delays of base, 2×base, 4×base between them (1 s base), capped.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Backoff delay after a failed `attempt` (1-based), or `None` when the
    /// attempt budget is exhausted and the error should surface.
    pub fn backoff(&self, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_attempts {
            return None;
        }
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        Some(self.base_delay.saturating_mul(exp).min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(1), Some(Duration::from_secs(1)));
        assert_eq!(p.backoff(2), Some(Duration::from_secs(2)));
        assert_eq!(p.backoff(3), Some(Duration::from_secs(4)));
    }

    #[test]
    fn budget_exhausted_after_max_attempts() {
        let p = RetryPolicy::default();
        assert_eq!(p.backoff(4), None);
        assert_eq!(p.backoff(5), None);
    }

    #[test]
    fn delay_is_capped() {
        let p = RetryPolicy {
            max_attempts: 20,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        };
        assert_eq!(p.backoff(10), Some(Duration::from_secs(8)));
    }
}
