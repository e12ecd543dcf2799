use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::aggregate::StandingsTally;
use crate::config::LeagueConfig;
use crate::error::SimulationError;
use crate::schedule::ScheduleModel;
use crate::scoring::{FittedModels, ScoreDistribution};
use crate::standings::StandingsTable;

/// How per-run random streams are seeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedMode {
    /// Reproducible: run `i` always uses stream `i` of this seed.
    Fixed(u64),
    /// Draw a batch seed from the OS; it is reported in the summary.
    Entropy,
}

impl SeedMode {
    pub fn from_option(seed: Option<u64>) -> Self {
        seed.map_or(SeedMode::Entropy, SeedMode::Fixed)
    }

    fn batch_seed(self) -> u64 {
        match self {
            SeedMode::Fixed(seed) => seed,
            SeedMode::Entropy => ChaCha8Rng::from_entropy().gen(),
        }
    }
}

/// Shared abort switch for a running batch.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Final regular-season order of one simulated season.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulatedStanding {
    /// Team indices, first place first
    pub ranked: Vec<usize>,
    /// Final half-win totals by team index
    pub half_wins: Vec<u64>,
}

/// Bookkeeping for one batch of runs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub requested_runs: u64,
    pub completed_runs: u64,
    pub dropped_runs: u64,
    pub cancelled: bool,
}

/// Every run's standings, in run order.
#[derive(Clone, Debug)]
pub struct SimulationBatch {
    pub standings: Vec<SimulatedStanding>,
    pub summary: SimulationSummary,
}

/// Runs folded straight into counters.
#[derive(Clone, Debug)]
pub struct AggregatedBatch {
    pub tally: StandingsTally,
    pub summary: SimulationSummary,
}

/// Sampling produced no usable score for a team.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunFailure {
    pub team: usize,
}

/// Monte Carlo completion of the remaining regular season.
///
/// Inputs are snapshotted at construction; runs share them read-only.
#[derive(Clone, Debug)]
pub struct SimulationEngine {
    team_ids: Vec<String>,
    base: StandingsTable,
    games: Vec<(usize, usize)>,
    distributions: Vec<ScoreDistribution>,
    num_runs: u32,
    num_playoff_slots: usize,
    max_dropped_run_fraction: f64,
    cancel: CancelFlag,
}

impl SimulationEngine {
    pub fn new(
        schedule: &ScheduleModel,
        scoring_models: &FittedModels,
        config: &LeagueConfig,
    ) -> Result<Self, SimulationError> {
        let team_ids = schedule.team_ids();
        let distributions = team_ids
            .iter()
            .map(|id| {
                scoring_models
                    .get(id)
                    .copied()
                    .ok_or_else(|| SimulationError::MissingModel(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let games: Vec<(usize, usize)> = schedule
            .remaining_matchups()
            .filter(|m| !m.is_bye())
            .filter_map(|m| {
                let i = team_ids.binary_search(&m.team_a).ok()?;
                let j = team_ids.binary_search(&m.team_b).ok()?;
                Some((i, j))
            })
            .collect();

        debug!(
            teams = team_ids.len(),
            remaining_games = games.len(),
            "simulation inputs prepared"
        );

        Ok(SimulationEngine {
            base: StandingsTable::from_schedule(schedule),
            team_ids,
            games,
            distributions,
            num_runs: config.num_playoff_simulations,
            num_playoff_slots: config.num_playoff_slots,
            max_dropped_run_fraction: config.simulation.max_dropped_run_fraction,
            cancel: CancelFlag::new(),
        })
    }

    /// Watch `flag` and stop starting new runs once it is set.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn with_num_runs(mut self, num_runs: u32) -> Self {
        self.num_runs = num_runs;
        self
    }

    pub fn team_ids(&self) -> &[String] {
        &self.team_ids
    }

    pub fn remaining_games(&self) -> usize {
        self.games.len()
    }

    /// Play out the remaining schedule once.
    ///
    /// The result depends only on `batch_seed` and `run_index`.
    pub fn simulate_run(&self, batch_seed: u64, run_index: u64) -> Result<SimulatedStanding, RunFailure> {
        let mut rng = ChaCha8Rng::seed_from_u64(batch_seed);
        rng.set_stream(run_index);

        let mut table = self.base.clone();
        for &(i, j) in &self.games {
            let score_i = self.distributions[i]
                .sample(&mut rng)
                .ok_or(RunFailure { team: i })?;
            let score_j = self.distributions[j]
                .sample(&mut rng)
                .ok_or(RunFailure { team: j })?;
            table.record_game(i, j, score_i, score_j);
        }

        Ok(SimulatedStanding {
            ranked: table.ranked(),
            half_wins: table.half_wins().to_vec(),
        })
    }

    /// Run the batch and keep every standing.
    pub fn run(&self, mode: SeedMode) -> Result<SimulationBatch, SimulationError> {
        let seed = mode.batch_seed();
        info!(runs = self.num_runs, seed, "running playoff simulations");

        let outcomes: Vec<Option<Result<SimulatedStanding, RunFailure>>> = (0..u64::from(self.num_runs))
            .into_par_iter()
            .map(|run_index| {
                if self.cancel.is_cancelled() {
                    return None;
                }
                Some(self.simulate_run(seed, run_index))
            })
            .collect();

        let mut standings = Vec::with_capacity(outcomes.len());
        let mut dropped = 0;
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                Some(Ok(standing)) => standings.push(standing),
                Some(Err(failure)) => {
                    debug!(team = %self.team_ids[failure.team], "simulation run dropped");
                    dropped += 1;
                }
                None => cancelled = true,
            }
        }

        let summary = self.summarize(seed, standings.len() as u64, dropped, cancelled)?;
        Ok(SimulationBatch { standings, summary })
    }

    /// Run the batch, folding each run into per-worker tallies that are
    /// summed at the end.
    pub fn run_aggregated(&self, mode: SeedMode) -> Result<AggregatedBatch, SimulationError> {
        let seed = mode.batch_seed();
        let n = self.team_ids.len();
        let slots = self.num_playoff_slots;
        info!(runs = self.num_runs, seed, "running playoff simulations");

        let tally = (0..u64::from(self.num_runs))
            .into_par_iter()
            .fold(
                || StandingsTally::new(n, slots),
                |mut tally, run_index| {
                    if self.cancel.is_cancelled() {
                        tally.record_cancelled();
                    } else {
                        match self.simulate_run(seed, run_index) {
                            Ok(standing) => tally.record(&standing),
                            Err(_) => tally.record_dropped(),
                        }
                    }
                    tally
                },
            )
            .reduce(|| StandingsTally::new(n, slots), StandingsTally::merge);

        let summary = self.summarize(
            seed,
            tally.completed_runs(),
            tally.dropped_runs(),
            tally.cancelled_runs() > 0,
        )?;
        Ok(AggregatedBatch { tally, summary })
    }

    fn summarize(
        &self,
        seed: u64,
        completed: u64,
        dropped: u64,
        cancelled: bool,
    ) -> Result<SimulationSummary, SimulationError> {
        let attempted = completed + dropped;
        if dropped > 0 {
            warn!(dropped, attempted, "simulation runs dropped");
            if dropped as f64 / attempted as f64 > self.max_dropped_run_fraction {
                return Err(SimulationError::ExcessiveDroppedRuns {
                    dropped,
                    attempted,
                    max_fraction: self.max_dropped_run_fraction,
                });
            }
        }
        if completed == 0 {
            return Err(SimulationError::NoCompletedRuns);
        }
        if cancelled {
            warn!(completed, requested = self.num_runs, "simulation cancelled early");
        }
        Ok(SimulationSummary {
            seed,
            requested_runs: u64::from(self.num_runs),
            completed_runs: completed,
            dropped_runs: dropped,
            cancelled,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::StandingsAggregator;
    use crate::scoring::TeamScoringModel;
    use crate::team::Team;

    fn make_league(num_runs: u32) -> (ScheduleModel, FittedModels, LeagueConfig) {
        let config = LeagueConfig::new(num_runs, 2, 3);
        let teams = ["A", "B", "C", "D"].iter().map(|id| Team::new(*id, *id)).collect();
        let mut schedule = ScheduleModel::new(teams, &config).unwrap();
        schedule.add_result(1, "A", "B", 120.0, 100.0).unwrap();
        schedule.add_result(1, "C", "D", 90.0, 110.0).unwrap();
        schedule.add_matchup(2, "A", "C").unwrap();
        schedule.add_matchup(2, "B", "D").unwrap();
        schedule.add_matchup(3, "A", "D").unwrap();
        schedule.add_matchup(3, "B", "C").unwrap();

        let mut scoring = TeamScoringModel::from_schedule(&schedule);
        for id in ["A", "B", "C", "D"] {
            scoring.set_distribution(id, ScoreDistribution::new(100.0, 15.0));
        }
        let fitted = scoring.fit_all(["A", "B", "C", "D"]).unwrap();
        (schedule, fitted, config)
    }

    #[test]
    fn test_run_count_and_determinism() {
        let (schedule, fitted, config) = make_league(500);
        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        assert_eq!(engine.remaining_games(), 4);

        let first = engine.run(SeedMode::Fixed(42)).unwrap();
        let second = engine.run(SeedMode::Fixed(42)).unwrap();
        assert_eq!(first.standings.len(), 500);
        assert_eq!(first.standings, second.standings);
        assert_eq!(first.summary.seed, 42);
        assert!(!first.summary.cancelled);
    }

    #[test]
    fn test_run_independent_of_order() {
        let (schedule, fitted, config) = make_league(10);
        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        let forward: Vec<_> = (0..10).map(|i| engine.simulate_run(7, i).unwrap()).collect();
        let mut backward: Vec<_> = (0..10).rev().map(|i| engine.simulate_run(7, i).unwrap()).collect();
        backward.reverse();
        assert_eq!(forward, backward);
        assert_ne!(forward[0], forward[1]);
    }

    #[test]
    fn test_aggregated_matches_collected() {
        let (schedule, fitted, config) = make_league(2_000);
        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        let aggregator = StandingsAggregator::for_schedule(&schedule);

        let batch = engine.run(SeedMode::Fixed(3)).unwrap();
        let from_runs = aggregator.aggregate(&batch.standings, config.num_playoff_slots);
        let folded = engine.run_aggregated(SeedMode::Fixed(3)).unwrap();
        let from_tally = aggregator.finish(&folded.tally);

        assert_eq!(from_runs, from_tally);
        assert_eq!(folded.summary, batch.summary);
    }

    #[test]
    fn test_completed_games_are_kept() {
        let (schedule, fitted, config) = make_league(200);
        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        let batch = engine.run(SeedMode::Fixed(11)).unwrap();
        // A and D won week 1 and can never finish below one win
        let a = 0;
        let d = 3;
        for standing in &batch.standings {
            assert!(standing.half_wins[a] >= 2);
            assert!(standing.half_wins[d] >= 2);
            assert_eq!(standing.half_wins.iter().sum::<u64>(), 12);
        }
    }

    #[test]
    fn test_entropy_mode_reports_seed() {
        let (schedule, fitted, config) = make_league(50);
        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        let batch = engine.run(SeedMode::Entropy).unwrap();
        let replay = engine.run(SeedMode::Fixed(batch.summary.seed)).unwrap();
        assert_eq!(batch.standings, replay.standings);
    }

    #[test]
    fn test_failed_runs_dropped_and_escalated() {
        let (schedule, mut fitted, mut config) = make_league(100);
        fitted
            .distributions
            .insert("C".into(), ScoreDistribution::new(f64::NAN, 10.0));

        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        let err = engine.run(SeedMode::Fixed(1)).unwrap_err();
        assert_eq!(
            err,
            SimulationError::ExcessiveDroppedRuns {
                dropped: 100,
                attempted: 100,
                max_fraction: 0.05
            }
        );

        config.simulation.max_dropped_run_fraction = 1.0;
        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        assert_eq!(
            engine.run_aggregated(SeedMode::Fixed(1)).unwrap_err(),
            SimulationError::NoCompletedRuns
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let (schedule, fitted, config) = make_league(100);
        let flag = CancelFlag::new();
        flag.cancel();
        let engine = SimulationEngine::new(&schedule, &fitted, &config)
            .unwrap()
            .with_cancel_flag(flag);
        assert_eq!(engine.run(SeedMode::Fixed(1)).unwrap_err(), SimulationError::NoCompletedRuns);
    }

    #[test]
    fn test_partial_batch_is_valid_estimate() {
        let (schedule, fitted, config) = make_league(1_000);
        let engine = SimulationEngine::new(&schedule, &fitted, &config).unwrap();
        let batch = engine.run(SeedMode::Fixed(5)).unwrap();

        let aggregator = StandingsAggregator::for_schedule(&schedule);
        let partial = aggregator.aggregate(&batch.standings[..137], config.num_playoff_slots);
        let total: f64 = partial.iter().map(|r| r.playoff_probability).sum();
        assert!((total - 2.0).abs() < 1e-9);
        assert!(partial.iter().all(|r| (0.0..=1.0).contains(&r.playoff_probability)));
    }

    #[test]
    fn test_missing_model_rejected() {
        let (schedule, mut fitted, config) = make_league(10);
        fitted.distributions.remove("B");
        assert_eq!(
            SimulationEngine::new(&schedule, &fitted, &config).unwrap_err(),
            SimulationError::MissingModel("B".into())
        );
    }
}
