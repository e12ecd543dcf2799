use std::path::PathBuf;

use thiserror::Error;

/// Invalid or unreadable league configuration. Always fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::ValidationError {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ScheduleError {
    #[error("week {week}: result for {team_a} vs {team_b} already recorded")]
    DuplicateResult {
        week: u32,
        team_a: String,
        team_b: String,
    },

    #[error("week {week}: team {team} is already scheduled against another opponent")]
    DoubleBooked { week: u32, team: String },

    #[error("unknown team id `{0}`")]
    UnknownTeam(String),

    #[error("week {week} is outside the season (1..={max_week})")]
    WeekOutOfRange { week: u32, max_week: u32 },

    #[error("week {week}: team {team} has no matchup")]
    IncompleteWeek { week: u32, team: String },

    #[error("a team cannot play itself ({0})")]
    SelfMatchup(String),

    #[error("duplicate team id `{0}`")]
    DuplicateTeam(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ScoringError {
    #[error("team {team} has no completed weeks to fit a scoring model from")]
    InsufficientData { team: String },

    #[error("no completed weeks in the league; cannot fit any scoring model")]
    EmptyLeague,

    #[error("invalid score distribution for {team}: mean {mean}, std dev {std_dev}")]
    InvalidDistribution { team: String, mean: f64, std_dev: f64 },
}

#[derive(Debug, Error, PartialEq)]
pub enum SimulationError {
    #[error("{dropped} of {attempted} simulation runs failed, above the {max_fraction} limit")]
    ExcessiveDroppedRuns {
        dropped: u64,
        attempted: u64,
        max_fraction: f64,
    },

    #[error("no simulation runs completed")]
    NoCompletedRuns,

    #[error("no scoring model for team {0}")]
    MissingModel(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum RankingError {
    #[error("week {0} has no completed results")]
    WeekNotCompleted(u32),

    #[error("metrics for week {0} are already locked")]
    WeekLocked(u32),
}

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid snapshot json: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Everything that can stop a report from being produced.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Scoring(#[from] ScoringError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    #[error(transparent)]
    Ranking(#[from] RankingError),
}
