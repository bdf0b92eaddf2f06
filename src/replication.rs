//! Monte Carlo replications.
//!
//! Each replication builds its own [`Engine`] from the shared parameters and a seed derived from
//! its run id, so replications share no mutable state and run on a rayon thread pool without
//! locking. Results are only aggregated after every scheduled replication has finished.
//!
//! Cancelling an analysis stops new replications from starting; replications already in flight
//! run to completion and are included in the summary.
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, info};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::engine::Engine;
use crate::error::SimError;
use crate::parameters::Parameters;
use crate::random::replication_seed;
use crate::report::ReplicationRecord;
use crate::stats::{collect_stats, Stats};

/// The result of a single replication.
#[derive(Clone, Debug, PartialEq)]
pub struct ReplicationOutcome {
    pub run_id: usize,
    pub seed: u64,
    /// Ticks executed before the run stopped or hit the tick budget.
    pub ticks: usize,
    pub stats: Stats,
}

impl ReplicationOutcome {
    pub fn record(&self) -> ReplicationRecord {
        ReplicationRecord::new(self.run_id, &self.stats)
    }
}

/// Runs replication `run_id` to completion.
///
/// # Errors
///
/// Returns an error if the parameters are invalid or the engine fails.
pub fn run_replication(parameters: &Parameters, run_id: usize) -> Result<ReplicationOutcome, SimError> {
    let seed = replication_seed(parameters.seed, run_id);
    let mut engine = Engine::new(parameters, seed)?;
    let ticks = engine.run(parameters.max_ticks)?;
    debug!("replication {run_id} (seed={seed}) finished after {ticks} ticks");
    Ok(ReplicationOutcome {
        run_id,
        seed,
        ticks,
        stats: collect_stats(engine.agents(), engine.hospitals()),
    })
}

/// The joined results of an analysis, ordered by run id.
#[derive(Clone, Debug, PartialEq)]
pub struct MonteCarloSummary {
    pub requested: usize,
    pub outcomes: Vec<ReplicationOutcome>,
}

impl MonteCarloSummary {
    pub fn completed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed() == self.requested
    }

    pub fn records(&self) -> Vec<ReplicationRecord> {
        self.outcomes.iter().map(ReplicationOutcome::record).collect()
    }

    /// Mean infection rate (%) over completed replications, 0 if none completed.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_infection_rate(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .outcomes
            .iter()
            .map(|outcome| outcome.stats.infection_rate())
            .sum();
        total / self.outcomes.len() as f64
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn mean_ticks(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let total: usize = self.outcomes.iter().map(|outcome| outcome.ticks).sum();
        total as f64 / self.outcomes.len() as f64
    }
}

impl Display for MonteCarloSummary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "=== Monte Carlo Summary ===")?;
        writeln!(f, "Runs completed: {}/{}", self.completed(), self.requested)?;
        writeln!(f, "Mean infection rate: {:.2}%", self.mean_infection_rate())?;
        writeln!(f, "Mean ticks: {:.1}", self.mean_ticks())
    }
}

/// A set of replications to execute.
#[derive(Clone, Debug)]
pub struct ReplicationPlan {
    pub parameters: Parameters,
    pub runs: usize,
    /// Size of the thread pool. Uses rayon's global pool when `None`.
    pub threads: Option<usize>,
}

impl ReplicationPlan {
    pub fn new(parameters: Parameters, runs: usize) -> Self {
        ReplicationPlan {
            parameters,
            runs,
            threads: None,
        }
    }

    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Executes the plan. `on_complete` is called from worker threads as each replication
    /// finishes. Once `cancel` is set no further replications are started.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid, the thread pool cannot be built, or any
    /// replication fails.
    pub fn execute<F>(&self, cancel: &AtomicBool, on_complete: F) -> Result<MonteCarloSummary, SimError>
    where
        F: Fn(&ReplicationOutcome) + Sync,
    {
        self.parameters.validate()?;
        info!(
            "Starting {} replications (base seed {})",
            self.runs, self.parameters.seed
        );

        let run_all = || -> Vec<Option<Result<ReplicationOutcome, SimError>>> {
            (0..self.runs)
                .into_par_iter()
                .map(|run_id| {
                    if cancel.load(Ordering::SeqCst) {
                        return None;
                    }
                    let outcome = run_replication(&self.parameters, run_id);
                    if let Ok(outcome) = &outcome {
                        on_complete(outcome);
                    }
                    Some(outcome)
                })
                .collect()
        };

        let results = match self.threads {
            Some(threads) => ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| SimError::InvalidParameters(e.to_string()))?
                .install(run_all),
            None => run_all(),
        };

        let mut outcomes = Vec::with_capacity(results.len());
        for result in results.into_iter().flatten() {
            outcomes.push(result?);
        }
        // `collect` preserves index order, so outcomes are already sorted by run id.
        let summary = MonteCarloSummary {
            requested: self.runs,
            outcomes,
        };
        if !summary.is_complete() {
            info!(
                "Analysis cancelled: {} of {} replications completed",
                summary.completed(),
                summary.requested
            );
        }
        Ok(summary)
    }
}

/// Runs `runs` replications of `parameters` on rayon's global pool.
///
/// # Errors
///
/// Returns an error if the parameters are invalid or any replication fails.
pub fn run_replications(parameters: &Parameters, runs: usize) -> Result<MonteCarloSummary, SimError> {
    ReplicationPlan::new(parameters.clone(), runs).execute(&AtomicBool::new(false), |_| {})
}
