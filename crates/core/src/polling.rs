//! A single budget bounding a status-polling session.
//!
//! Attempts and wall-clock time are checked in one place so a session stops
//! for exactly one reason, whichever bound is reached first.

use std::fmt;
use std::time::Duration;

/// Default delay between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5_000);
/// Default ceiling on status checks per session.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 60;
/// Default wall-clock ceiling per session.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(120_000);

/// Bounds for one polling session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudget {
    pub interval: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// Why a polling session ran out of budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetExhausted {
    MaxAttempts(u32),
    Timeout(Duration),
}

impl fmt::Display for BudgetExhausted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxAttempts(n) => write!(f, "Max polling attempts ({n}) reached"),
            Self::Timeout(t) => write!(f, "Polling timeout ({}ms) reached", t.as_millis()),
        }
    }
}

impl PollBudget {
    /// Decide whether check number `attempt` (1-based) may run after
    /// `elapsed` time in the session.
    pub fn admit(&self, attempt: u32, elapsed: Duration) -> Result<(), BudgetExhausted> {
        if attempt > self.max_attempts {
            return Err(BudgetExhausted::MaxAttempts(self.max_attempts));
        }
        if elapsed >= self.timeout {
            return Err(BudgetExhausted::Timeout(self.timeout));
        }
        Ok(())
    }
}
