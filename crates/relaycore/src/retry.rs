use std::time::Duration;

/// Wait schedule applied around a node's dispatch phase
///
/// With `n` waits a permanently failing dispatch is attempted `n + 1` times.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    waits: Vec<Duration>,
}

impl RetryPolicy {
    /// No retries; the first failure propagates.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_waits(waits: impl IntoIterator<Item = Duration>) -> Self {
        Self {
            waits: waits.into_iter().collect(),
        }
    }

    /// Waits given in seconds. Negative or non-finite entries become zero,
    /// entries too large for a `Duration` saturate to `Duration::MAX`.
    pub fn from_secs(waits: &[f64]) -> Self {
        Self::from_waits(waits.iter().map(|&secs| {
            if secs.is_finite() && secs > 0.0 {
                saturating_secs(secs)
            } else {
                Duration::ZERO
            }
        }))
    }

    pub fn fixed(retries: usize, delay: Duration) -> Self {
        Self::from_waits(std::iter::repeat(delay).take(retries))
    }

    pub fn exponential(retries: usize, initial: Duration, multiplier: f64) -> Self {
        let multiplier = if multiplier.is_finite() && multiplier > 0.0 {
            multiplier
        } else {
            1.0
        };
        let mut delay = initial;
        let mut waits = Vec::with_capacity(retries);
        for _ in 0..retries {
            waits.push(delay);
            delay = saturating_secs(delay.as_secs_f64() * multiplier);
        }
        Self { waits }
    }

    pub fn waits(&self) -> &[Duration] {
        &self.waits
    }

    pub fn max_attempts(&self) -> usize {
        self.waits.len() + 1
    }

    /// Wait before the next attempt, given how many attempts failed so far.
    pub fn wait_after(&self, attempts: usize) -> Option<Duration> {
        attempts.checked_sub(1).and_then(|i| self.waits.get(i)).copied()
    }
}

fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}
