//! ffmetrics command line driver.
//!
//! Reads a league config (TOML) and a league snapshot (JSON), builds the
//! report and prints it as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use ffmetrics_core::{LeagueConfig, LeagueSnapshot, ReportGenerator, ReportOverrides};

#[derive(Parser)]
#[command(name = "ffmetrics")]
#[command(about = "Fantasy league playoff odds and weekly rankings")]
#[command(version)]
struct Cli {
    /// League configuration file
    #[arg(short, long, default_value = "defaults/league.toml")]
    config: PathBuf,

    /// League snapshot (teams, rosters, matchups) as JSON
    snapshot: PathBuf,

    /// Week to report instead of the configured one
    #[arg(short, long)]
    week: Option<u32>,

    /// Number of playoff simulations
    #[arg(short = 'p', long)]
    playoff_simulations: Option<u32>,

    /// Break metric ties by team id
    #[arg(short, long)]
    break_ties: bool,

    /// Disqualify teams that started players with prohibited statuses
    #[arg(short = 'q', long, conflicts_with = "allow_prohibited_starters")]
    disqualify_coaching_efficiency: bool,

    /// Only warn about prohibited starters
    #[arg(long)]
    allow_prohibited_starters: bool,

    /// Fixed simulation seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,

    /// Write compact JSON
    #[arg(long)]
    compact: bool,
}

impl Cli {
    fn overrides(&self) -> ReportOverrides {
        let disqualify = if self.disqualify_coaching_efficiency {
            Some(true)
        } else if self.allow_prohibited_starters {
            Some(false)
        } else {
            None
        };
        ReportOverrides {
            week: self.week,
            num_playoff_simulations: self.playoff_simulations,
            break_ties: self.break_ties.then_some(true),
            disqualify_coaching_efficiency: disqualify,
            seed: self.seed,
        }
    }
}

fn main() -> anyhow::Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let config = LeagueConfig::load(&cli.config)
        .and_then(|config| config.with_overrides(&cli.overrides()))
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;
    let snapshot = LeagueSnapshot::load(&cli.snapshot).context("failed to load league snapshot")?;
    info!(
        teams = snapshot.teams.len(),
        simulations = config.num_playoff_simulations,
        "inputs loaded"
    );

    let schedule = snapshot
        .to_schedule(&config)
        .context("league snapshot does not describe a valid schedule")?;
    let report = ReportGenerator::new(config)
        .generate(&schedule, &snapshot.player_attributes)
        .context("failed to build league report")?;

    let json = if cli.compact {
        serde_json::to_string(&report)?
    } else {
        report.to_json()?
    };
    println!("{json}");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ffmetrics=info,ffmetrics_core=info,warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;
    Ok(())
}
