// League configuration loading and validation (league.toml).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

use crate::constants::{
    default_flex_positions, DEFAULT_MAX_DROPPED_RUN_FRACTION, DEFAULT_NUM_PLAYOFF_SIMULATIONS,
    POWER_SCORE_WEIGHT, POWER_TREND_WEEKS, POWER_TREND_WEIGHT, POWER_WIN_WEIGHT,
};
use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Week selection
// ---------------------------------------------------------------------------

/// Which week's rankings to lock and report.
///
/// Written as `"default"` or a week number in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWeek", into = "RawWeek")]
pub enum WeekForReport {
    /// The latest fully completed week.
    Default,
    Week(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawWeek {
    Number(i64),
    Text(String),
}

impl TryFrom<RawWeek> for WeekForReport {
    type Error = String;

    fn try_from(raw: RawWeek) -> Result<Self, Self::Error> {
        match raw {
            RawWeek::Text(text) if text.trim().eq_ignore_ascii_case("default") => {
                Ok(WeekForReport::Default)
            }
            RawWeek::Text(text) => text
                .trim()
                .parse::<u32>()
                .map(WeekForReport::Week)
                .map_err(|_| format!("expected \"default\" or a week number, got {text:?}")),
            RawWeek::Number(n) => u32::try_from(n)
                .map(WeekForReport::Week)
                .map_err(|_| format!("week must be a positive number, got {n}")),
        }
    }
}

impl From<WeekForReport> for RawWeek {
    fn from(week: WeekForReport) -> Self {
        match week {
            WeekForReport::Default => RawWeek::Text("default".to_string()),
            WeekForReport::Week(w) => RawWeek::Number(i64::from(w)),
        }
    }
}

impl Default for WeekForReport {
    fn default() -> Self {
        WeekForReport::Default
    }
}

// ---------------------------------------------------------------------------
// Optional sections
// ---------------------------------------------------------------------------

/// Weights of the power ranking blend. All must be non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerRankingWeights {
    pub win_weight: f64,
    pub score_weight: f64,
    pub trend_weight: f64,
    /// Trailing weeks averaged for the trend component.
    pub trend_weeks: u32,
}

impl Default for PowerRankingWeights {
    fn default() -> Self {
        PowerRankingWeights {
            win_weight: POWER_WIN_WEIGHT,
            score_weight: POWER_SCORE_WEIGHT,
            trend_weight: POWER_TREND_WEIGHT,
            trend_weeks: POWER_TREND_WEEKS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Batch is rejected when more than this fraction of runs fail.
    pub max_dropped_run_fraction: f64,
    /// Fixed batch seed; simulations draw one from entropy when absent.
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        SimulationSettings {
            max_dropped_run_fraction: DEFAULT_MAX_DROPPED_RUN_FRACTION,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Break metric ties by team id instead of sharing the rank.
    pub break_ties: bool,
    /// Disqualify teams that started a player with a prohibited status.
    /// When off such teams are only flagged with a warning.
    pub disqualify_coaching_efficiency: bool,
}

impl Default for ReportSettings {
    fn default() -> Self {
        ReportSettings {
            break_ties: false,
            disqualify_coaching_efficiency: true,
        }
    }
}

// ---------------------------------------------------------------------------
// league.toml
// ---------------------------------------------------------------------------

/// Wrapper for the tables of league.toml.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    settings: SettingsSection,
    #[serde(default)]
    power_ranking: PowerRankingWeights,
    #[serde(default)]
    simulation: SimulationSettings,
    #[serde(default)]
    report: ReportSettings,
}

#[derive(Debug, Clone, Deserialize)]
struct SettingsSection {
    #[serde(default = "default_num_playoff_simulations")]
    num_playoff_simulations: i64,
    num_playoff_slots: i64,
    num_regular_season_weeks: i64,
    #[serde(default)]
    week_for_report: WeekForReport,
    #[serde(default)]
    bench_positions: BTreeSet<String>,
    #[serde(default)]
    prohibited_statuses: BTreeSet<String>,
    #[serde(default)]
    coaching_efficiency_disqualified_teams: BTreeSet<String>,
    #[serde(default)]
    initial_faab_budget: u32,
    flex_positions: Option<BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    roster_positions: BTreeMap<String, u32>,
}

fn default_num_playoff_simulations() -> i64 {
    i64::from(DEFAULT_NUM_PLAYOFF_SIMULATIONS)
}

/// Validated, read-only league configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeagueConfig {
    pub num_playoff_simulations: u32,
    pub num_playoff_slots: usize,
    pub num_regular_season_weeks: u32,
    pub week_for_report: WeekForReport,
    pub bench_positions: BTreeSet<String>,
    pub prohibited_statuses: BTreeSet<String>,
    pub coaching_efficiency_disqualified_teams: BTreeSet<String>,
    /// Carried through to the report untouched.
    pub initial_faab_budget: u32,
    /// Flex slot code -> positions that may fill it.
    pub flex_positions: BTreeMap<String, Vec<String>>,
    /// Starting slot code -> number of such slots in a lineup. Empty when
    /// the league's lineup shape is unknown.
    pub roster_positions: BTreeMap<String, u32>,
    pub power_ranking: PowerRankingWeights,
    pub simulation: SimulationSettings,
    pub report: ReportSettings,
}

/// Values supplied on the command line that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct ReportOverrides {
    pub week: Option<u32>,
    pub num_playoff_simulations: Option<u32>,
    pub break_ties: Option<bool>,
    pub disqualify_coaching_efficiency: Option<bool>,
    pub seed: Option<u64>,
}

impl LeagueConfig {
    /// Build a config in code with the usual defaults for everything but
    /// the three season-shape values.
    pub fn new(
        num_playoff_simulations: u32,
        num_playoff_slots: usize,
        num_regular_season_weeks: u32,
    ) -> Self {
        LeagueConfig {
            num_playoff_simulations,
            num_playoff_slots,
            num_regular_season_weeks,
            week_for_report: WeekForReport::Default,
            bench_positions: ["BN", "IR"].iter().map(|s| s.to_string()).collect(),
            prohibited_statuses: BTreeSet::new(),
            coaching_efficiency_disqualified_teams: BTreeSet::new(),
            initial_faab_budget: 0,
            flex_positions: default_flex_map(),
            roster_positions: BTreeMap::new(),
            power_ranking: PowerRankingWeights::default(),
            simulation: SimulationSettings::default(),
            report: ReportSettings::default(),
        }
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.to_path_buf(),
        })?;
        let file: ConfigFile = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_file(file)?;
        debug!(path = %path.display(), "league config loaded");
        Ok(config)
    }

    /// Parse and validate config text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
            path: "<inline>".into(),
            source: e,
        })?;
        Self::from_file(file)
    }

    fn from_file(file: ConfigFile) -> Result<Self, ConfigError> {
        let s = file.settings;
        let config = LeagueConfig {
            num_playoff_simulations: positive("settings.num_playoff_simulations", s.num_playoff_simulations)?,
            num_playoff_slots: positive("settings.num_playoff_slots", s.num_playoff_slots)? as usize,
            num_regular_season_weeks: positive("settings.num_regular_season_weeks", s.num_regular_season_weeks)?,
            week_for_report: s.week_for_report,
            bench_positions: s.bench_positions,
            prohibited_statuses: s.prohibited_statuses,
            coaching_efficiency_disqualified_teams: s.coaching_efficiency_disqualified_teams,
            initial_faab_budget: s.initial_faab_budget,
            flex_positions: s.flex_positions.unwrap_or_else(default_flex_map),
            roster_positions: s.roster_positions,
            power_ranking: file.power_ranking,
            simulation: file.simulation,
            report: file.report,
        };
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides and re-validate.
    pub fn with_overrides(mut self, overrides: &ReportOverrides) -> Result<Self, ConfigError> {
        if let Some(week) = overrides.week {
            self.week_for_report = WeekForReport::Week(week);
        }
        if let Some(sims) = overrides.num_playoff_simulations {
            self.num_playoff_simulations = sims;
        }
        if let Some(break_ties) = overrides.break_ties {
            self.report.break_ties = break_ties;
        }
        if let Some(dq) = overrides.disqualify_coaching_efficiency {
            self.report.disqualify_coaching_efficiency = dq;
        }
        if overrides.seed.is_some() {
            self.simulation.seed = overrides.seed;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks that need nothing but the config itself.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_playoff_simulations == 0 {
            return Err(ConfigError::invalid(
                "settings.num_playoff_simulations",
                "must be greater than 0",
            ));
        }
        if self.num_playoff_slots == 0 {
            return Err(ConfigError::invalid("settings.num_playoff_slots", "must be greater than 0"));
        }
        if self.num_regular_season_weeks == 0 {
            return Err(ConfigError::invalid(
                "settings.num_regular_season_weeks",
                "must be greater than 0",
            ));
        }
        if let WeekForReport::Week(week) = self.week_for_report {
            if week == 0 || week > self.num_regular_season_weeks {
                return Err(ConfigError::invalid(
                    "settings.week_for_report",
                    format!("must be between 1 and {}, got {week}", self.num_regular_season_weeks),
                ));
            }
        }

        let frac = self.simulation.max_dropped_run_fraction;
        if !(0.0..=1.0).contains(&frac) {
            return Err(ConfigError::invalid(
                "simulation.max_dropped_run_fraction",
                format!("must be between 0.0 and 1.0 inclusive, got {frac}"),
            ));
        }

        let p = &self.power_ranking;
        let weight_fields: &[(&str, f64)] = &[
            ("power_ranking.win_weight", p.win_weight),
            ("power_ranking.score_weight", p.score_weight),
            ("power_ranking.trend_weight", p.trend_weight),
        ];
        for (name, val) in weight_fields {
            if !val.is_finite() || *val < 0.0 {
                return Err(ConfigError::invalid(name, format!("must be >= 0, got {val}")));
            }
        }
        if p.win_weight + p.score_weight + p.trend_weight <= 0.0 {
            return Err(ConfigError::invalid("power_ranking", "at least one weight must be > 0"));
        }
        if p.trend_weeks == 0 {
            return Err(ConfigError::invalid("power_ranking.trend_weeks", "must be greater than 0"));
        }

        if let Some(slot) = self.roster_positions.keys().find(|slot| self.is_bench_position(slot)) {
            return Err(ConfigError::invalid(
                "settings.roster_positions",
                format!("{slot:?} is a bench position, not a starting slot"),
            ));
        }
        Ok(())
    }

    /// Checks against the league the config is about to run on.
    pub fn validate_for_league(&self, team_count: usize) -> Result<(), ConfigError> {
        self.validate()?;
        if self.num_playoff_slots >= team_count {
            return Err(ConfigError::invalid(
                "settings.num_playoff_slots",
                format!("must be less than the number of teams ({team_count}), got {}", self.num_playoff_slots),
            ));
        }
        Ok(())
    }

    /// Resolve `week_for_report` given the latest fully completed week.
    pub fn report_week(&self, latest_completed: Option<u32>) -> Result<u32, ConfigError> {
        match self.week_for_report {
            WeekForReport::Week(week) => Ok(week),
            WeekForReport::Default => latest_completed
                .map(|w| w.min(self.num_regular_season_weeks))
                .ok_or_else(|| {
                    ConfigError::invalid("settings.week_for_report", "no completed week to default to")
                }),
        }
    }

    pub fn is_bench_position(&self, position: &str) -> bool {
        self.bench_positions.contains(position)
    }

    pub fn is_prohibited_status(&self, status: &str) -> bool {
        self.prohibited_statuses.contains(status)
    }

    /// Whether a team is named, by display name or id, on the manual
    /// coaching efficiency disqualification list.
    pub fn is_coaching_efficiency_disqualified(&self, team_name: &str, team_id: &str) -> bool {
        self.coaching_efficiency_disqualified_teams.contains(team_name)
            || self.coaching_efficiency_disqualified_teams.contains(team_id)
    }

    /// Every starting slot of a full lineup, one entry per slot.
    pub fn starting_slots(&self) -> impl Iterator<Item = &str> + '_ {
        self.roster_positions
            .iter()
            .flat_map(|(slot, &count)| std::iter::repeat(slot.as_str()).take(count as usize))
    }
}

fn positive(field: &str, value: i64) -> Result<u32, ConfigError> {
    if value <= 0 {
        return Err(ConfigError::invalid(field, format!("must be greater than 0, got {value}")));
    }
    u32::try_from(value).map_err(|_| ConfigError::invalid(field, format!("too large: {value}")))
}

fn default_flex_map() -> BTreeMap<String, Vec<String>> {
    default_flex_positions()
        .into_iter()
        .map(|(slot, positions)| {
            (slot.to_string(), positions.iter().map(|p| p.to_string()).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [settings]
        num_playoff_simulations = 1000
        num_playoff_slots = 4
        num_regular_season_weeks = 13
    "#;

    #[test]
    fn test_minimal_config_defaults() {
        let config = LeagueConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.num_playoff_simulations, 1000);
        assert_eq!(config.week_for_report, WeekForReport::Default);
        assert!(config.report.disqualify_coaching_efficiency);
        assert!(!config.report.break_ties);
        assert!(config.flex_positions.contains_key("W/R/T"));
    }

    #[test]
    fn test_sample_config_parses() {
        let text = include_str!("../defaults/league.toml");
        let config = LeagueConfig::from_toml_str(text).unwrap();
        assert!(config.is_bench_position("BN"));
        assert!(config.is_prohibited_status("IR"));
        assert_eq!(config.initial_faab_budget, 100);
        assert_eq!(config.roster_positions.get("RB"), Some(&2));
        assert_eq!(config.starting_slots().filter(|s| *s == "WR").count(), 2);
    }

    #[test]
    fn test_bench_slot_in_roster_positions_rejected() {
        let text = format!("{MINIMAL}\nbench_positions = [\"BN\"]\n[settings.roster_positions]\nQB = 1\nBN = 6\n");
        let err = LeagueConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "settings.roster_positions"));
    }

    #[test]
    fn test_manual_disqualification_by_name_or_id() {
        let mut config = LeagueConfig::new(100, 2, 13);
        config.coaching_efficiency_disqualified_teams = ["Tank Squad".to_string(), "7".to_string()].into_iter().collect();
        assert!(config.is_coaching_efficiency_disqualified("Tank Squad", "3"));
        assert!(config.is_coaching_efficiency_disqualified("Lucky Seven", "7"));
        assert!(!config.is_coaching_efficiency_disqualified("Gridiron Gang", "1"));
    }

    #[test]
    fn test_week_for_report_forms() {
        let numeric = format!("{MINIMAL}\nweek_for_report = 5\n");
        let config = LeagueConfig::from_toml_str(&numeric).unwrap();
        assert_eq!(config.week_for_report, WeekForReport::Week(5));

        let quoted = format!("{MINIMAL}\nweek_for_report = \"7\"\n");
        let config = LeagueConfig::from_toml_str(&quoted).unwrap();
        assert_eq!(config.week_for_report, WeekForReport::Week(7));
    }

    #[test]
    fn test_week_out_of_range_rejected() {
        let text = format!("{MINIMAL}\nweek_for_report = 14\n");
        let err = LeagueConfig::from_toml_str(&text).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "settings.week_for_report"));
    }

    #[test]
    fn test_non_positive_simulations_rejected() {
        let text = MINIMAL.replace("num_playoff_simulations = 1000", "num_playoff_simulations = 0");
        assert!(LeagueConfig::from_toml_str(&text).is_err());

        let text = MINIMAL.replace("num_playoff_simulations = 1000", "num_playoff_simulations = -3");
        assert!(LeagueConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_slots_must_be_below_team_count() {
        let config = LeagueConfig::new(100, 4, 13);
        assert!(config.validate_for_league(4).is_err());
        assert!(config.validate_for_league(5).is_ok());
    }

    #[test]
    fn test_report_week_resolution() {
        let config = LeagueConfig::new(100, 2, 13);
        assert_eq!(config.report_week(Some(6)).unwrap(), 6);
        assert!(config.report_week(None).is_err());
    }

    #[test]
    fn test_overrides_applied() {
        let config = LeagueConfig::new(100, 2, 13);
        let overrides = ReportOverrides {
            week: Some(3),
            num_playoff_simulations: Some(50),
            break_ties: Some(true),
            seed: Some(9),
            ..Default::default()
        };
        let config = config.with_overrides(&overrides).unwrap();
        assert_eq!(config.week_for_report, WeekForReport::Week(3));
        assert_eq!(config.num_playoff_simulations, 50);
        assert!(config.report.break_ties);
        assert_eq!(config.simulation.seed, Some(9));

        let bad = ReportOverrides {
            week: Some(20),
            ..Default::default()
        };
        assert!(config.with_overrides(&bad).is_err());
    }

    #[test]
    fn test_negative_power_weight_rejected() {
        let mut config = LeagueConfig::new(100, 2, 13);
        config.power_ranking.trend_weight = -0.1;
        assert!(config.validate().is_err());
    }
}
