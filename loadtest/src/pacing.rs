//! Inter-task pacing policies

use rand::Rng;
use std::time::Duration;

/// How long a session waits between tasks.
///
/// `Constant(Duration::ZERO)` drives maximum throughput for saturation runs;
/// `Between` models realistic think time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PacingPolicy {
    Constant(Duration),
    /// Uniform draw from `[min, max]`
    Between { min: Duration, max: Duration },
}

impl Default for PacingPolicy {
    fn default() -> Self {
        PacingPolicy::between_secs(1.0, 3.0)
    }
}

impl PacingPolicy {
    /// Build from a seconds range, collapsing `min == max` to a constant.
    ///
    /// Callers validate that both bounds are finite, non-negative and ordered.
    pub fn between_secs(min: f64, max: f64) -> Self {
        if min == max {
            PacingPolicy::Constant(Duration::from_secs_f64(min))
        } else {
            PacingPolicy::Between {
                min: Duration::from_secs_f64(min),
                max: Duration::from_secs_f64(max),
            }
        }
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        match *self {
            PacingPolicy::Constant(d) => d,
            PacingPolicy::Between { min, max } if min >= max => min,
            PacingPolicy::Between { min, max } => {
                Duration::from_secs_f64(rng.random_range(min.as_secs_f64()..=max.as_secs_f64()))
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            PacingPolicy::Constant(d) => format!("constant {:?}", d),
            PacingPolicy::Between { min, max } => format!("between {:?} and {:?}", min, max),
        }
    }
}
