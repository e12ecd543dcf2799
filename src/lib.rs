//! ffmetrics core - fantasy league season simulation and weekly rankings.
//!
//! Given a league's completed and remaining matchups, this library
//! estimates playoff probabilities by Monte Carlo completion of the
//! regular season and computes the week's ranking metrics (power, z-score,
//! luck, coaching efficiency, bad boy and beef).

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod eligibility;
pub mod error;
pub mod lineup;
pub mod ranking;
pub mod report;
pub mod schedule;
pub mod scoring;
pub mod simulation;
pub mod snapshot;
pub mod standings;
pub mod team;

pub use aggregate::{PlayoffProbabilityResult, StandingsAggregator, StandingsTally};
pub use config::{LeagueConfig, ReportOverrides, WeekForReport};
pub use constants::BYE_TEAM_ID;
pub use eligibility::EligibilityFilter;
pub use error::{
    ConfigError, EngineError, RankingError, ScheduleError, ScoringError, SimulationError, SnapshotError,
};
pub use lineup::{coaching_efficiency, LineupEvaluation};
pub use ranking::{PlayerAttributes, RankingEngine, RankingMetrics, WeeklyRankings};
pub use report::{LeagueReport, ReportGenerator, ReportWarning};
pub use schedule::{Matchup, ScheduleModel, WeeklyScore};
pub use scoring::{ScoreDistribution, TeamScoringModel};
pub use simulation::{CancelFlag, SeedMode, SimulatedStanding, SimulationEngine, SimulationSummary};
pub use snapshot::LeagueSnapshot;
pub use standings::{current_standings, StandingsTable};
pub use team::{RosterSlot, Team, TeamRecord};
