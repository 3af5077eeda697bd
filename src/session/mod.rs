//! C7 — Session Coordinator: accepts a submission, allocates a UUID,
//! dispatches optimization to a background worker, and mediates status
//! queries and cancellation. A `RwLock<HashMap<Id, Handle>>` registry
//! whose `submit()` spawns a background task and hands the caller back
//! an id immediately.

mod sweeper;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::build::{Build, BudgetSnapshot};
use crate::climb::{self, ConvergenceReason, Metric, OptimizationConfig, ProgressSnapshot};
use crate::error::{ErrorBody, OptimizerError};
use crate::gate::RequestGate;
use crate::oracle::BuildStats;
use crate::progress::{self, ProgressEvent, ProgressPublisher, ProgressQueue};
use crate::tree::{NodeId, PassiveTreeGraph};

pub use sweeper::spawn_sweeper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Everything the HTTP surface needs to render `/result/<id>`. Kept
/// separate from the mutable `Session` internals so a poll never has to
/// take more than one read lock.
#[derive(Debug, Clone, Serialize)]
pub struct SessionResult {
    pub metric: Metric,
    pub baseline_stats: SerializableStats,
    pub best_stats: SerializableStats,
    pub improvement_pct: f64,
    pub free_used: u32,
    pub free_available: u32,
    pub respec_used: u32,
    pub respec_available: Option<u32>,
    pub iterations_run: usize,
    pub convergence_reason: ConvergenceReason,
}

/// A narrowed view of [`BuildStats`] safe to hand to JSON without dragging
/// the `additional` free-form map along by default.
#[derive(Debug, Clone, Serialize)]
pub struct SerializableStats {
    pub total_dps: f64,
    pub effective_hp: f64,
    pub life: f64,
    pub mana: f64,
    pub energy_shield: f64,
}

impl From<&BuildStats> for SerializableStats {
    fn from(stats: &BuildStats) -> Self {
        SerializableStats {
            total_dps: stats.total_dps,
            effective_hp: stats.effective_hp,
            life: stats.life,
            mana: stats.mana,
            energy_shield: stats.energy_shield,
        }
    }
}

struct SessionInner {
    status: SessionStatus,
    progress: Option<ProgressSnapshot>,
    result: Option<SessionResult>,
    error: Option<ErrorBody>,
    best_build: Build,
    updated_at: SystemTime,
}

/// One optimization run. `raw_xml`/`baseline_build` are immutable for the
/// session's lifetime; everything the worker updates as it runs lives
/// behind `inner`.
pub struct Session {
    pub id: Uuid,
    pub cancel: Arc<AtomicBool>,
    raw_xml: String,
    baseline_build: Build,
    inner: RwLock<SessionInner>,
}

impl Session {
    fn new(id: Uuid, raw_xml: String, baseline_build: Build) -> Self {
        Session {
            id,
            cancel: Arc::new(AtomicBool::new(false)),
            raw_xml,
            baseline_build: baseline_build.clone(),
            inner: RwLock::new(SessionInner {
                status: SessionStatus::Pending,
                progress: None,
                result: None,
                error: None,
                best_build: baseline_build,
                updated_at: SystemTime::now(),
            }),
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.inner.read().await.status
    }

    pub async fn updated_at(&self) -> SystemTime {
        self.inner.read().await.updated_at
    }

    pub async fn poll(&self) -> PollView {
        let inner = self.inner.read().await;
        PollView {
            status: inner.status,
            progress: inner.progress.clone(),
            result: inner.result.clone(),
            error: inner.error.clone(),
        }
    }

    /// Node allocation to re-encode for `/export`: the optimized build if
    /// the run completed with an improvement, otherwise the baseline
    /// (covers Testable Property: S2's unchanged-build round trip).
    pub async fn export_nodes(&self) -> std::collections::BTreeSet<NodeId> {
        self.inner.read().await.best_build.allocated.clone()
    }

    pub fn raw_xml(&self) -> &str {
        &self.raw_xml
    }

    async fn mark_running(&self) {
        let mut inner = self.inner.write().await;
        inner.status = SessionStatus::Running;
        inner.updated_at = SystemTime::now();
    }

    async fn record_progress(&self, snapshot: ProgressSnapshot) {
        let mut inner = self.inner.write().await;
        inner.progress = Some(snapshot);
        inner.updated_at = SystemTime::now();
    }

    async fn record_completion(&self, outcome: &climb::OptimizationOutcome, config: &OptimizationConfig, budget: BudgetSnapshot) {
        let mut inner = self.inner.write().await;
        inner.best_build = outcome.best_build.clone();
        inner.status = if outcome.convergence_reason == ConvergenceReason::Cancelled {
            SessionStatus::Cancelled
        } else {
            SessionStatus::Completed
        };
        inner.result = Some(SessionResult {
            metric: config.metric,
            baseline_stats: SerializableStats::from(&outcome.baseline_stats),
            best_stats: SerializableStats::from(&outcome.best_stats),
            improvement_pct: outcome.improvement_pct,
            free_used: budget.free_used,
            free_available: budget.free_available,
            respec_used: budget.respec_used,
            respec_available: budget.respec_available,
            iterations_run: outcome.iterations_run,
            convergence_reason: outcome.convergence_reason,
        });
        inner.updated_at = SystemTime::now();
    }

    async fn record_failure(&self, error: &OptimizerError) {
        let mut inner = self.inner.write().await;
        inner.status = SessionStatus::Failed;
        inner.error = Some(ErrorBody::from(error));
        inner.updated_at = SystemTime::now();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollView {
    pub status: SessionStatus,
    pub progress: Option<ProgressSnapshot>,
    pub result: Option<SessionResult>,
    pub error: Option<ErrorBody>,
}

/// C7: owns the session map and the shared oracle gate. One instance per
/// process, held in `actix_web::web::Data`.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
    progress_queues: RwLock<HashMap<Uuid, ProgressQueue>>,
    gate: RequestGate,
    tree: Arc<PassiveTreeGraph>,
    gate_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(gate: RequestGate, tree: Arc<PassiveTreeGraph>, gate_timeout: Duration) -> Self {
        SessionRegistry {
            sessions: RwLock::new(HashMap::new()),
            progress_queues: RwLock::new(HashMap::new()),
            gate,
            tree,
            gate_timeout,
        }
    }

    /// Creates a `pending` session and spawns its background worker.
    /// Returns the new id immediately — submission never waits on the
    /// gate (Testable scenario S1: session id within 50ms).
    ///
    /// Validates the §3 reachability invariant before a session is ever
    /// created: a decoded build-code's `<Spec nodes>` list is the game's
    /// export format and commonly omits the implicit, always-allocated
    /// class-start node, so the start node is folded into `allocated`
    /// here rather than trusted to already be present. What remains must
    /// still be connected, or the build is rejected outright rather than
    /// silently handed to a neighbor generator that would see it as
    /// already converged.
    pub async fn submit(&self, raw_xml: String, baseline_build: Build, config: OptimizationConfig) -> Result<Uuid, OptimizerError> {
        let baseline_build = self.normalize_baseline(baseline_build)?;

        let id = Uuid::new_v4();
        let session = Arc::new(Session::new(id, raw_xml, baseline_build.clone()));
        let (publisher, queue) = progress::channel();

        self.sessions.write().await.insert(id, session.clone());
        self.progress_queues.write().await.insert(id, queue);

        let gate = self.gate.clone();
        let tree = self.tree.clone();
        let gate_timeout = self.gate_timeout;
        tokio::spawn(run_worker(session, gate, tree, gate_timeout, baseline_build, config, publisher));

        Ok(id)
    }

    /// Ensures the class-start node is allocated and the resulting build
    /// satisfies the connectivity invariant (§3, §8 Property 2) before it
    /// ever reaches the hill-climbing loop.
    fn normalize_baseline(&self, mut baseline_build: Build) -> Result<Build, OptimizerError> {
        let start = self.tree.class_start(baseline_build.class.as_str()).ok_or_else(|| OptimizerError::UnsupportedBuild {
            reason: format!("no class start node for {}", baseline_build.class.as_str()),
        })?;

        baseline_build.allocated.insert(start);

        let allocated: std::collections::HashSet<NodeId> = baseline_build.allocated.iter().copied().collect();
        if !self.tree.is_connected(start, &allocated) {
            return Err(OptimizerError::UnsupportedBuild {
                reason: "allocated nodes are not fully connected to the class start node".into(),
            });
        }

        Ok(baseline_build)
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Cancellation is cooperative and idempotent: setting the flag on an
    /// already-terminal session is harmless (Testable Property 7).
    pub async fn cancel(&self, id: Uuid) -> Result<(), OptimizerError> {
        let session = self.sessions.read().await.get(&id).cloned().ok_or(OptimizerError::SessionNotFound)?;
        session.cancel.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Takes the per-session progress queue out for the `/progress/<id>`
    /// handler. Returns `None` if the session doesn't exist or another
    /// stream consumer already took it (only one live SSE consumer per
    /// session is meaningful, mirroring §4.6's single-drain design).
    pub async fn take_progress_queue(&self, id: Uuid) -> Option<ProgressQueue> {
        self.progress_queues.write().await.remove(&id)
    }

    /// Removes sessions whose last update is older than `ttl`. Run
    /// roughly hourly by [`spawn_sweeper`]; returns the count removed for
    /// logging.
    pub async fn sweep(&self, ttl: Duration) -> usize {
        let now = SystemTime::now();
        let mut expired = Vec::new();
        for (id, session) in self.sessions.read().await.iter() {
            let age = now.duration_since(session.updated_at().await).unwrap_or_default();
            if age > ttl {
                expired.push(*id);
            }
        }
        let mut sessions = self.sessions.write().await;
        let mut queues = self.progress_queues.write().await;
        for id in &expired {
            sessions.remove(id);
            queues.remove(id);
        }
        expired.len()
    }
}

/// Background worker discipline (§4.5): acquire the gate with a timeout,
/// run the optimization on a blocking thread (the oracle is CPU-bound and
/// must not occupy a reactor thread), emit progress/complete/error events,
/// then release the gate and trigger the oracle's post-run GC.
async fn run_worker(
    session: Arc<Session>,
    gate: RequestGate,
    tree: Arc<PassiveTreeGraph>,
    gate_timeout: Duration,
    baseline_build: Build,
    config: OptimizationConfig,
    publisher: ProgressPublisher,
) {
    session.mark_running().await;

    let start = match tree.class_start(baseline_build.class.as_str()) {
        Some(node) => node,
        None => {
            let error = OptimizerError::UnsupportedBuild {
                reason: format!("no class start node for {}", baseline_build.class.as_str()),
            };
            session.record_failure(&error).await;
            publisher.publish(ProgressEvent::Error { payload: serde_json::to_value(ErrorBody::from(&error)).unwrap() }).await;
            return;
        }
    };

    let mut guard = match gate.acquire(gate_timeout).await {
        Ok(guard) => guard,
        Err(error) => {
            session.record_failure(&error).await;
            publisher.publish(ProgressEvent::Error { payload: serde_json::to_value(ErrorBody::from(&error)).unwrap() }).await;
            return;
        }
    };

    let cancel = session.cancel.clone();
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<ProgressSnapshot>();

    // Drain progress snapshots concurrently with the blocking climb —
    // the channel closes on its own once climb drops its callback closure,
    // which ends this loop without any explicit signaling.
    let drain_session = session.clone();
    let drain_publisher = publisher.clone();
    let drain_handle = tokio::spawn(async move {
        while let Some(snapshot) = progress_rx.recv().await {
            drain_session.record_progress(snapshot.clone()).await;
            drain_publisher
                .publish(ProgressEvent::Progress { payload: serde_json::to_value(&snapshot).unwrap() })
                .await;
        }
    });

    let join_result = tokio::task::spawn_blocking(move || {
        let outcome = climb::climb(&mut **guard, &tree, start, baseline_build, &config, &cancel, move |snapshot| {
            let _ = progress_tx.send(snapshot);
        });
        // GC runs whether the optimization succeeded or failed, as long as
        // the gate was actually acquired.
        guard.collect_garbage();
        (outcome, config)
    })
    .await;

    let _ = drain_handle.await;

    match join_result {
        Ok((Ok(outcome), config)) => {
            let budget = outcome.budget;
            session.record_completion(&outcome, &config, budget).await;
            let result = session.poll().await.result;
            publisher.publish(ProgressEvent::Complete { payload: serde_json::to_value(&result).unwrap() }).await;
        }
        Ok((Err(error), _config)) => {
            session.record_failure(&error).await;
            publisher.publish(ProgressEvent::Error { payload: serde_json::to_value(ErrorBody::from(&error)).unwrap() }).await;
        }
        Err(join_error) => {
            let error = OptimizerError::Internal { reason: format!("optimization worker panicked: {join_error}") };
            session.record_failure(&error).await;
            publisher.publish(ProgressEvent::Error { payload: serde_json::to_value(ErrorBody::from(&error)).unwrap() }).await;
        }
    }
}
