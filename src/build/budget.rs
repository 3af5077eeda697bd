use crate::build::mutation::TreeMutation;
use serde::Serialize;

/// Pure in-memory state machine tracking spend against the dual budgets.
/// Counters are monotonic: `apply` only ever increases them.
#[derive(Debug, Clone)]
pub struct BudgetLedger {
    free_available: u32,
    free_used: u32,
    respec_available: Option<u32>, // None means unlimited (∞)
    respec_used: u32,
}

impl BudgetLedger {
    pub fn new(free_available: u32, respec_available: Option<u32>) -> Self {
        BudgetLedger {
            free_available,
            free_used: 0,
            respec_available,
            respec_used: 0,
        }
    }

    pub fn free_remaining(&self) -> u32 {
        self.free_available.saturating_sub(self.free_used)
    }

    pub fn respec_remaining(&self) -> Option<u32> {
        self.respec_available.map(|a| a.saturating_sub(self.respec_used))
    }

    pub fn free_exhausted(&self) -> bool {
        self.free_remaining() == 0
    }

    pub fn respec_exhausted(&self) -> bool {
        matches!(self.respec_remaining(), Some(0))
    }

    /// True iff applying `mutation` would keep both counters within their
    /// ceilings.
    pub fn can_apply(&self, mutation: &TreeMutation) -> bool {
        let free_ok = self.free_used + mutation.free_cost() <= self.free_available;
        let respec_ok = match self.respec_available {
            None => true,
            Some(ceiling) => self.respec_used + mutation.respec_cost() <= ceiling,
        };
        free_ok && respec_ok
    }

    /// Debits the counters. Panics if the mutation would violate an
    /// invariant — this is a programmer error (the caller should have
    /// checked `can_apply` first), not a user-facing failure.
    pub fn apply(&mut self, mutation: &TreeMutation) {
        assert!(
            self.can_apply(mutation),
            "attempted to apply a mutation that violates the budget ledger"
        );
        self.free_used += mutation.free_cost();
        self.respec_used += mutation.respec_cost();
    }

    pub fn snapshot(&self) -> BudgetSnapshot {
        BudgetSnapshot {
            free_used: self.free_used,
            free_available: self.free_available,
            respec_used: self.respec_used,
            respec_available: self.respec_available,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BudgetSnapshot {
    pub free_used: u32,
    pub free_available: u32,
    pub respec_used: u32,
    pub respec_available: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn respects_free_ceiling() {
        let mut ledger = BudgetLedger::new(1, Some(0));
        let add = TreeMutation::Add {
            node: crate::tree::NodeId(1),
        };
        assert!(ledger.can_apply(&add));
        ledger.apply(&add);
        assert!(ledger.free_exhausted());
        assert!(!ledger.can_apply(&add));
    }

    #[test]
    fn infinite_respec_budget_never_exhausts() {
        let ledger = BudgetLedger::new(0, None);
        assert_eq!(ledger.respec_remaining(), None);
        assert!(!ledger.respec_exhausted());
    }

    #[test]
    #[should_panic]
    fn applying_an_illegal_mutation_panics() {
        let mut ledger = BudgetLedger::new(0, Some(0));
        let add = TreeMutation::Add {
            node: crate::tree::NodeId(1),
        };
        ledger.apply(&add);
    }

    #[test]
    fn zero_budgets_immediately_exhausted() {
        let ledger = BudgetLedger::new(0, Some(0));
        assert!(ledger.free_exhausted());
        assert!(ledger.respec_exhausted());
    }
}
