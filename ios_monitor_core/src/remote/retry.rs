use std::time::Duration;

/// How many attempts a retry loop may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptLimit {
    Bounded(u32),
    Unbounded,
}

impl AttemptLimit {
    /// Whether attempt number `attempt` (1-based) may run.
    #[must_use]
    pub const fn allows(self, attempt: u32) -> bool {
        match self {
            Self::Bounded(max) => attempt <= max,
            Self::Unbounded => true,
        }
    }
}

/// Delay applied after attempts up to and including `through_attempt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffTier {
    pub through_attempt: u32,
    pub delay: Duration,
}

/// Timeout ladder, backoff ladder and attempt cap for one retry loop.
///
/// The timeout for attempt `n` is the `n`th rung of `timeouts`, with the last
/// rung repeating forever. The wait after a failed attempt `n` is the first
/// backoff tier covering `n`, or `backoff_ceiling` once every tier is passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeouts: Vec<Duration>,
    pub backoff: Vec<BackoffTier>,
    pub backoff_ceiling: Duration,
    pub limit: AttemptLimit,
}

const fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn standard_backoff() -> Vec<BackoffTier> {
    vec![
        BackoffTier {
            through_attempt: 3,
            delay: secs(2),
        },
        BackoffTier {
            through_attempt: 8,
            delay: secs(5),
        },
        BackoffTier {
            through_attempt: 15,
            delay: secs(10),
        },
    ]
}

impl RetryPolicy {
    /// Ladder for liveness checks and short commands: 10/15/20/25/30s.
    #[must_use]
    pub fn simple() -> Self {
        Self {
            timeouts: vec![secs(10), secs(15), secs(20), secs(25), secs(30)],
            backoff: standard_backoff(),
            backoff_ceiling: secs(15),
            limit: AttemptLimit::Unbounded,
        }
    }

    /// Ladder for commands producing a large structured payload:
    /// 20/30/40/50/60s.
    #[must_use]
    pub fn bulk() -> Self {
        Self {
            timeouts: vec![secs(20), secs(30), secs(40), secs(50), secs(60)],
            ..Self::simple()
        }
    }

    /// Per-port policy used while looking for a working control port.
    #[must_use]
    pub fn discovery() -> Self {
        Self {
            limit: AttemptLimit::Bounded(10),
            ..Self::simple()
        }
    }

    /// No waiting between attempts, fixed per-attempt timeout.
    #[must_use]
    pub fn immediate(timeout: Duration, limit: AttemptLimit) -> Self {
        Self {
            timeouts: vec![timeout],
            backoff: Vec::new(),
            backoff_ceiling: Duration::ZERO,
            limit,
        }
    }

    #[must_use]
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        let idx = attempt.saturating_sub(1) as usize;
        self.timeouts
            .get(idx)
            .or_else(|| self.timeouts.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        self.backoff
            .iter()
            .find(|tier| attempt <= tier.through_attempt)
            .map_or(self.backoff_ceiling, |tier| tier.delay)
    }

    #[must_use]
    pub const fn allows(&self, attempt: u32) -> bool {
        self.limit.allows(attempt)
    }

    /// Whether another attempt follows `attempt`.
    #[must_use]
    pub const fn has_next(&self, attempt: u32) -> bool {
        self.limit.allows(attempt.saturating_add(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::simple()
    }
}
