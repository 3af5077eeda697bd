use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::build::{Build, BudgetLedger, BudgetSnapshot, TreeMutation};
use crate::error::OptimizerError;
use crate::neighbors::generate_neighbors;
use crate::oracle::{BuildStats, EngineAdapter};
use crate::tree::{NodeId, PassiveTreeGraph};

/// Cadence for progress publication: don't flood faster than every 100
/// iterations, and don't go silent longer than 5 wall-clock seconds —
/// whichever threshold is hit first triggers a publish (§4.6).
const PROGRESS_ITERATION_STRIDE: usize = 100;
const PROGRESS_TIME_STRIDE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Dps,
    Ehp,
    Balanced,
}

impl Metric {
    pub fn value(&self, stats: &BuildStats, baseline: &BuildStats) -> f64 {
        match self {
            Metric::Dps => stats.total_dps,
            Metric::Ehp => stats.effective_hp,
            Metric::Balanced => {
                let dps_baseline = if baseline.total_dps == 0.0 { 1.0 } else { baseline.total_dps };
                let ehp_baseline = if baseline.effective_hp == 0.0 { 1.0 } else { baseline.effective_hp };
                0.6 * (stats.total_dps / dps_baseline) + 0.4 * (stats.effective_hp / ehp_baseline)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationConfig {
    pub metric: Metric,
    pub free_budget: u32,
    pub respec_budget: Option<u32>,
    pub max_iterations: usize,
    pub max_wall_time: Duration,
    pub patience: usize,
    pub min_relative_improvement: f64,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig {
            metric: Metric::Dps,
            free_budget: 0,
            respec_budget: Some(0),
            max_iterations: 600,
            max_wall_time: Duration::from_secs(300),
            patience: 3,
            min_relative_improvement: 0.001,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConvergenceReason {
    NoImprovement,
    NoValidNeighbors,
    MaxIterations,
    Timeout,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProgressSnapshot {
    pub iteration: usize,
    pub best_metric: f64,
    pub improvement_pct: f64,
    pub free_used: u32,
    pub respec_used: u32,
    pub elapsed_seconds: f64,
}

/// One adopted mutation, recorded in order of adoption. Used by the
/// free-first scenario test (S3) to inspect which cost class was spent
/// first.
#[derive(Debug, Clone, Serialize)]
pub struct MutationLogEntry {
    pub mutation: TreeMutation,
    pub metric_after: f64,
}

#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub best_build: Build,
    pub best_stats: BuildStats,
    pub baseline_stats: BuildStats,
    pub iterations_run: usize,
    pub convergence_reason: ConvergenceReason,
    pub mutation_log: Vec<MutationLogEntry>,
    pub budget: BudgetSnapshot,
    pub improvement_pct: f64,
}

/// Steepest-ascent local search (§4.2). Calls `on_progress` at the cadence
/// described in §4.6, not on every iteration — explicit rate limiting
/// lives here (the optimizer never blocks on a slow consumer; that
/// decoupling is the progress stream's job, not this loop's).
pub fn climb(
    engine: &mut dyn EngineAdapter,
    graph: &PassiveTreeGraph,
    start: NodeId,
    baseline: Build,
    config: &OptimizationConfig,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(ProgressSnapshot),
) -> Result<OptimizationOutcome, OptimizerError> {
    let wall_start = Instant::now();

    // An engine failure on the baseline build is fatal for the session.
    let baseline_stats = engine.calculate(&baseline, graph).map_err(|e| match e {
        OptimizerError::Calculation { reason } | OptimizerError::EngineRuntime { reason } => {
            OptimizerError::EngineRuntime { reason: format!("baseline calculation failed: {reason}") }
        }
        other => other,
    })?;
    let baseline_metric = config.metric.value(&baseline_stats, &baseline_stats);

    let mut budget = BudgetLedger::new(config.free_budget, config.respec_budget);
    let mut current = baseline.clone();
    let mut current_metric = baseline_metric;
    let mut best_build = baseline.clone();
    let mut best_stats = baseline_stats.clone();
    let mut best_metric = baseline_metric;
    let mut no_improve = 0usize;
    let mut mutation_log = Vec::new();

    let mut last_publish_iteration = 0usize;
    let mut last_publish_at = wall_start;
    let mut iterations_run = 0usize;
    let mut reason;

    'outer: loop {
        if iterations_run >= config.max_iterations {
            reason = ConvergenceReason::MaxIterations;
            break;
        }
        if wall_start.elapsed() > config.max_wall_time {
            reason = ConvergenceReason::Timeout;
            break;
        }

        let neighbors = generate_neighbors(&current, graph, start, &budget);
        if neighbors.is_empty() {
            reason = ConvergenceReason::NoValidNeighbors;
            break;
        }

        iterations_run += 1;

        let mut best_candidate: Option<(TreeMutation, f64, Build, BuildStats)> = None;
        for ranked in &neighbors {
            if cancel.load(Ordering::Relaxed) {
                reason = ConvergenceReason::Cancelled;
                break 'outer;
            }

            let candidate_build = ranked.mutation.apply(&current);
            let stats = match engine.calculate(&candidate_build, graph) {
                Ok(stats) => stats,
                Err(e) => {
                    log::warn!("candidate rejected, engine error: {e}");
                    continue;
                }
            };
            let metric = config.metric.value(&stats, &baseline_stats);

            let is_better = match &best_candidate {
                None => true,
                Some((best_mutation, best_val, ..)) => tie_break(metric, &ranked.mutation, *best_val, best_mutation),
            };
            if is_better {
                best_candidate = Some((ranked.mutation, metric, candidate_build, stats));
            }
        }

        let Some((mutation, candidate_metric, candidate_build, candidate_stats)) = best_candidate else {
            // Every candidate failed in the engine; nothing legal to adopt.
            reason = ConvergenceReason::NoValidNeighbors;
            break;
        };

        if candidate_metric > current_metric * (1.0 + config.min_relative_improvement) {
            budget.apply(&mutation);
            current = candidate_build;
            current_metric = candidate_metric;
            mutation_log.push(MutationLogEntry { mutation, metric_after: candidate_metric });

            if candidate_metric > best_metric {
                best_build = current.clone();
                best_stats = candidate_stats;
                best_metric = candidate_metric;
            }
            no_improve = 0;
        } else {
            no_improve += 1;
            if no_improve >= config.patience {
                reason = ConvergenceReason::NoImprovement;
                break;
            }
        }

        // "Whichever is later" means the coarser of the two cadences
        // gates publication: both the iteration stride and the time
        // floor must have elapsed, so fast iterations (small/mock engine)
        // don't flood every 100 iterations regardless of wall-clock time.
        let since_last_iter = iterations_run - last_publish_iteration;
        let since_last_time = last_publish_at.elapsed();
        if since_last_iter >= PROGRESS_ITERATION_STRIDE && since_last_time >= PROGRESS_TIME_STRIDE {
            last_publish_iteration = iterations_run;
            last_publish_at = Instant::now();
            on_progress(ProgressSnapshot {
                iteration: iterations_run,
                best_metric,
                improvement_pct: improvement_pct(baseline_metric, best_metric),
                free_used: budget.snapshot().free_used,
                respec_used: budget.snapshot().respec_used,
                elapsed_seconds: wall_start.elapsed().as_secs_f64(),
            });
        }
    }

    let improvement = improvement_pct(baseline_metric, best_metric);
    Ok(OptimizationOutcome {
        best_build,
        best_stats,
        baseline_stats,
        iterations_run,
        convergence_reason: reason,
        mutation_log,
        budget: budget.snapshot(),
        improvement_pct: improvement,
    })
}

fn improvement_pct(baseline_metric: f64, best_metric: f64) -> f64 {
    if baseline_metric == 0.0 {
        0.0
    } else {
        (best_metric - baseline_metric) / baseline_metric * 100.0
    }
}

/// Tie-break order (§4.2): (1) lower total respec cost, (2) lower free
/// cost, (3) lowest newly-added node id. Only invoked to choose between
/// candidates whose metric is (approximately) equal to the current best;
/// a strictly higher metric always wins outright.
fn tie_break(candidate_metric: f64, candidate: &TreeMutation, best_metric: f64, best: &TreeMutation) -> bool {
    if candidate_metric > best_metric {
        return true;
    }
    if candidate_metric < best_metric {
        return false;
    }
    (candidate.respec_cost(), candidate.free_cost(), candidate.node_added().0)
        < (best.respec_cost(), best.free_cost(), best.node_added().0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::CharacterClass;
    use crate::oracle::MockEngine;

    fn linear_graph(n: u32) -> PassiveTreeGraph {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for i in 1..=n {
            let is_start = i == 1;
            nodes.push(serde_json::json!({
                "id": i,
                "stat_text": [],
                "node_type": "small",
                "is_class_start": is_start,
                "class_start_for": if is_start { Some("Witch") } else { None },
            }));
            if i > 1 {
                edges.push((i - 1, i));
            }
        }
        let text = serde_json::json!({ "nodes": nodes, "edges": edges }).to_string();
        PassiveTreeGraph::from_json(&text).unwrap()
    }

    #[test]
    fn zero_budgets_stop_immediately_at_baseline() {
        let graph = linear_graph(5);
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let mut engine = MockEngine::new();
        engine.initialize().unwrap();

        let config = OptimizationConfig {
            free_budget: 0,
            respec_budget: Some(0),
            ..Default::default()
        };
        let cancel = AtomicBool::new(false);
        let outcome = climb(&mut engine, &graph, NodeId(1), build.clone(), &config, &cancel, |_| {}).unwrap();

        assert_eq!(outcome.convergence_reason, ConvergenceReason::NoValidNeighbors);
        assert_eq!(outcome.best_build.allocated, build.allocated);
        assert_eq!(outcome.improvement_pct, 0.0);
    }

    #[test]
    fn max_iterations_of_one_runs_exactly_once() {
        let graph = linear_graph(10);
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let mut engine = MockEngine::new();
        engine.initialize().unwrap();

        let config = OptimizationConfig {
            free_budget: 10,
            respec_budget: Some(0),
            max_iterations: 1,
            patience: 100,
            ..Default::default()
        };
        let cancel = AtomicBool::new(false);
        let outcome = climb(&mut engine, &graph, NodeId(1), build, &config, &cancel, |_| {}).unwrap();

        assert_eq!(outcome.iterations_run, 1);
        assert_eq!(outcome.convergence_reason, ConvergenceReason::MaxIterations);
    }

    #[test]
    fn never_adopts_a_build_worse_than_baseline() {
        let graph = linear_graph(20);
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let mut engine = MockEngine::new();
        engine.initialize().unwrap();

        let config = OptimizationConfig {
            free_budget: 8,
            respec_budget: Some(3),
            ..Default::default()
        };
        let cancel = AtomicBool::new(false);
        let outcome = climb(&mut engine, &graph, NodeId(1), build, &config, &cancel, |_| {}).unwrap();

        assert!(outcome.best_stats.total_dps >= outcome.baseline_stats.total_dps);
    }

    #[test]
    fn free_budget_is_spent_before_respec_budget() {
        let graph = linear_graph(30);
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let mut engine = MockEngine::new();
        engine.initialize().unwrap();

        let config = OptimizationConfig {
            free_budget: 10,
            respec_budget: Some(10),
            ..Default::default()
        };
        let cancel = AtomicBool::new(false);
        let outcome = climb(&mut engine, &graph, NodeId(1), build, &config, &cancel, |_| {}).unwrap();

        let first_respec_index = outcome.mutation_log.iter().position(|e| e.mutation.respec_cost() == 1);
        if let Some(idx) = first_respec_index {
            let free_spent_before: u32 = outcome.mutation_log[..idx].iter().map(|e| e.mutation.free_cost()).sum();
            assert_eq!(free_spent_before, config.free_budget);
        }
    }

    #[test]
    fn cancellation_stops_the_loop_with_best_so_far() {
        let graph = linear_graph(50);
        let build = Build::new(CharacterClass::Witch, 90, NodeId(1));
        let mut engine = MockEngine::new();
        engine.initialize().unwrap();

        let config = OptimizationConfig {
            free_budget: 40,
            respec_budget: Some(0),
            max_iterations: 1000,
            ..Default::default()
        };
        let cancel = AtomicBool::new(true); // pre-cancelled: stops on first neighbor check
        let outcome = climb(&mut engine, &graph, NodeId(1), build.clone(), &config, &cancel, |_| {}).unwrap();

        assert_eq!(outcome.convergence_reason, ConvergenceReason::Cancelled);
        assert!(outcome.best_stats.total_dps >= outcome.baseline_stats.total_dps);
    }
}
