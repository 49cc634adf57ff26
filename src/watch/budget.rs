// src/watch/budget.rs

use tracing::warn;

use crate::hierarchy::Hierarchy;

/// The budget was exceeded: `watching` candidates against `limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetExceeded {
    pub watching: usize,
    pub limit: usize,
}

impl BudgetExceeded {
    /// The single degradation warning, worded exactly as operators grep for.
    pub fn message(&self) -> String {
        format!(
            "Watching too many directories in the file system (watching {}, limit {}), dropping some state from the virtual file system",
            self.watching, self.limit
        )
    }
}

/// Outcome of applying the budget to a candidate set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetDecision {
    pub kept: Vec<Hierarchy>,
    pub evicted: Vec<Hierarchy>,
    pub exceeded: Option<BudgetExceeded>,
}

/// Caps the number of simultaneously watched hierarchies.
///
/// Survivors are the first `limit` candidates in discovery order. Which
/// hierarchies are currently watched does not influence the choice, so the
/// same candidate list always yields the same kept set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchBudgetEnforcer {
    limit: Option<usize>,
}

impl WatchBudgetEnforcer {
    /// `None` means unbounded.
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    pub fn unbounded() -> Self {
        Self { limit: None }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn enforce(&self, mut candidates: Vec<Hierarchy>) -> BudgetDecision {
        let limit = match self.limit {
            Some(limit) if candidates.len() > limit => limit,
            _ => {
                return BudgetDecision {
                    kept: candidates,
                    evicted: Vec::new(),
                    exceeded: None,
                };
            }
        };

        let exceeded = BudgetExceeded {
            watching: candidates.len(),
            limit,
        };
        warn!("{}", exceeded.message());

        let evicted = candidates.split_off(limit);
        BudgetDecision {
            kept: candidates,
            evicted,
            exceeded: Some(exceeded),
        }
    }
}
