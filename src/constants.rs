/// Team id of the synthetic opponent used to model bye weeks
pub const BYE_TEAM_ID: &str = "__bye__";

/// Default number of Monte Carlo playoff simulations
pub const DEFAULT_NUM_PLAYOFF_SIMULATIONS: u32 = 100_000;

/// Fraction of dropped simulation runs above which a batch is rejected
pub const DEFAULT_MAX_DROPPED_RUN_FRACTION: f64 = 0.05;

/// Power ranking weight on win percentage
pub const POWER_WIN_WEIGHT: f64 = 0.5;

/// Power ranking weight on season scoring relative to the league
pub const POWER_SCORE_WEIGHT: f64 = 0.35;

/// Power ranking weight on recent scoring relative to the league
pub const POWER_TREND_WEIGHT: f64 = 0.15;

/// Number of trailing weeks that make up the power ranking trend
pub const POWER_TREND_WEEKS: u32 = 3;

/// Pounds per tabbu, the unit beef rankings are reported in
pub const POUNDS_PER_TABBU: f64 = 500.0;

/// Standard deviations below this are treated as zero
pub const STDDEV_EPSILON: f64 = 1e-9;

/// Positions accepted by the flex slot codes the major platforms use.
pub fn default_flex_positions() -> Vec<(&'static str, &'static [&'static str])> {
    vec![
        ("FLEX", &["RB", "WR", "TE"]),
        ("W/R/T", &["WR", "RB", "TE"]),
        ("W/R", &["WR", "RB"]),
        ("W/T", &["WR", "TE"]),
        ("R/W/T", &["RB", "WR", "TE"]),
        ("Q/W/R/T", &["QB", "WR", "RB", "TE"]),
        ("SUPERFLEX", &["QB", "RB", "WR", "TE"]),
    ]
}
