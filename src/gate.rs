//! C9 — Request Gate: the single process-wide mutex serializing all calls
//! into the non-reentrant calculation oracle. The gate owns the oracle
//! instance directly — acquiring it for the duration of one optimization
//! run is exactly what makes the oracle safe to drive hundreds of times in
//! a row without another session's requests interleaving. Nothing else in
//! the system needs it — session queries, progress streaming, and export
//! encoding all run lock-free.
//!
//! The guard is an *owned* mutex guard (`Arc<Mutex<_>>` + `lock_owned`)
//! rather than a borrowed one, so the session worker can carry it into a
//! `spawn_blocking` thread — the oracle's `calculate()` is CPU-bound and
//! must not run on a Tokio reactor thread.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::OptimizerError;
use crate::oracle::EngineAdapter;

#[derive(Clone)]
pub struct RequestGate {
    oracle: Arc<Mutex<Box<dyn EngineAdapter>>>,
}

impl RequestGate {
    pub fn new(oracle: Box<dyn EngineAdapter>) -> Self {
        RequestGate { oracle: Arc::new(Mutex::new(oracle)) }
    }

    /// Acquires the gate, bounded by `timeout`. Returns `OptimizerBusy` on
    /// timeout rather than blocking indefinitely — a long-running
    /// optimization must not wedge every other session's submission.
    pub async fn acquire(&self, timeout: Duration) -> Result<OwnedMutexGuard<Box<dyn EngineAdapter>>, OptimizerError> {
        tokio::time::timeout(timeout, self.oracle.clone().lock_owned())
            .await
            .map_err(|_| OptimizerError::OptimizerBusy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockEngine;

    #[tokio::test]
    async fn second_acquire_times_out_while_first_guard_is_held() {
        let gate = RequestGate::new(Box::new(MockEngine::new()));
        let guard = gate.acquire(Duration::from_millis(50)).await.unwrap();

        let result = gate.acquire(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(OptimizerError::OptimizerBusy)));

        drop(guard);
        assert!(gate.acquire(Duration::from_millis(50)).await.is_ok());
    }
}
