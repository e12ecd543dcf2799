//! One-call report: standings, playoff odds and the week's rankings.

use serde::Serialize;
use tracing::info;

use crate::aggregate::{PlayoffProbabilityResult, StandingsAggregator};
use crate::config::LeagueConfig;
use crate::error::EngineError;
use crate::ranking::{PlayerAttributes, RankingEngine, RankingWarning, WeeklyRankings};
use crate::schedule::ScheduleModel;
use crate::scoring::TeamScoringModel;
use crate::simulation::{CancelFlag, SeedMode, SimulationEngine, SimulationSummary};
use crate::standings::{current_standings, StandingRow};

/// Non-fatal conditions met while building a report.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportWarning {
    /// No completed weeks for the team; simulated from the league-wide
    /// distribution.
    ScoringFallback { team_id: String },
    SimulationRunsDropped { dropped: u64, attempted: u64 },
    SimulationCancelled { completed: u64, requested: u64 },
    Ranking(RankingWarning),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeagueReport {
    pub week: u32,
    pub initial_faab_budget: u32,
    pub standings: Vec<StandingRow>,
    /// Highest playoff probability first
    pub playoff_probabilities: Vec<PlayoffProbabilityResult>,
    pub rankings: WeeklyRankings,
    pub simulation: SimulationSummary,
    pub warnings: Vec<ReportWarning>,
}

impl LeagueReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn playoff_probability(&self, team_id: &str) -> Option<f64> {
        self.playoff_probabilities
            .iter()
            .find(|r| r.team_id == team_id)
            .map(|r| r.playoff_probability)
    }
}

/// Builds league reports, keeping each reported week's rankings locked
/// across calls.
#[derive(Clone, Debug)]
pub struct ReportGenerator {
    config: LeagueConfig,
    rankings: RankingEngine,
    cancel: CancelFlag,
}

impl ReportGenerator {
    pub fn new(config: LeagueConfig) -> Self {
        ReportGenerator {
            rankings: RankingEngine::new(&config),
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Stop the simulation early when `flag` is set; the report is built
    /// from the runs that finished.
    pub fn with_cancel_flag(mut self, flag: CancelFlag) -> Self {
        self.cancel = flag;
        self
    }

    pub fn config(&self) -> &LeagueConfig {
        &self.config
    }

    /// Report for the configured week, fitting scoring models from the
    /// schedule's completed weeks.
    pub fn generate(
        &mut self,
        schedule: &ScheduleModel,
        attributes: &PlayerAttributes,
    ) -> Result<LeagueReport, EngineError> {
        let model = TeamScoringModel::from_schedule(schedule);
        self.generate_with_model(schedule, &model, attributes)
    }

    /// Report using an already prepared scoring model.
    pub fn generate_with_model(
        &mut self,
        schedule: &ScheduleModel,
        model: &TeamScoringModel,
        attributes: &PlayerAttributes,
    ) -> Result<LeagueReport, EngineError> {
        let config = &self.config;
        config.validate_for_league(schedule.num_teams())?;
        schedule.validate()?;
        let week = config.report_week(schedule.latest_completed_week())?;
        info!(week, teams = schedule.num_teams(), "generating league report");

        let team_ids = schedule.team_ids();
        let fitted = model.fit_all(team_ids.iter().map(String::as_str))?;
        let simulation = SimulationEngine::new(schedule, &fitted, config)?.with_cancel_flag(self.cancel.clone());
        let mode = SeedMode::from_option(config.simulation.seed);

        let rankings = &self.rankings;
        let (batch, weekly) = rayon::join(
            || simulation.run_aggregated(mode),
            || match rankings.locked(week) {
                Some(locked) => Ok(locked.clone()),
                None => rankings.compute(schedule, week, attributes),
            },
        );
        let batch = batch?;
        let weekly = weekly?;
        // only a finished report locks its week
        if self.rankings.locked(week).is_none() {
            self.rankings.lock(weekly.clone())?;
        }

        let playoff_probabilities = StandingsAggregator::for_schedule(schedule).finish(&batch.tally);

        let mut warnings: Vec<ReportWarning> = fitted
            .fallbacks
            .iter()
            .map(|team_id| ReportWarning::ScoringFallback {
                team_id: team_id.clone(),
            })
            .collect();
        let summary = batch.summary;
        if summary.dropped_runs > 0 {
            warnings.push(ReportWarning::SimulationRunsDropped {
                dropped: summary.dropped_runs,
                attempted: summary.completed_runs + summary.dropped_runs,
            });
        }
        if summary.cancelled {
            warnings.push(ReportWarning::SimulationCancelled {
                completed: summary.completed_runs,
                requested: summary.requested_runs,
            });
        }
        warnings.extend(weekly.warnings.iter().cloned().map(ReportWarning::Ranking));

        info!(
            week,
            runs = summary.completed_runs,
            seed = summary.seed,
            warnings = warnings.len(),
            "league report ready"
        );
        Ok(LeagueReport {
            week,
            initial_faab_budget: self.config.initial_faab_budget,
            standings: current_standings(schedule),
            playoff_probabilities,
            rankings: weekly,
            simulation: summary,
            warnings,
        })
    }
}
