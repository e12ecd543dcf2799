use rand::distributions::Distribution as _;
use rand::Rng;
use serde::Serialize;
use statrs::distribution::Normal;
use std::collections::BTreeMap;
use tracing::warn;

use crate::constants::STDDEV_EPSILON;
use crate::error::ScoringError;
use crate::schedule::{ScheduleModel, WeeklyScore};

/// Normal approximation of a team's weekly scoring.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ScoreDistribution {
    pub mean: f64,
    pub std_dev: f64,
}

impl ScoreDistribution {
    pub fn new(mean: f64, std_dev: f64) -> Self {
        ScoreDistribution { mean, std_dev }
    }

    pub fn is_valid(&self) -> bool {
        self.mean.is_finite() && self.std_dev.is_finite() && self.std_dev >= 0.0
    }

    /// Draw one score. A zero spread always yields the mean.
    ///
    /// Returns `None` when the parameters cannot describe a distribution.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<f64> {
        if !self.is_valid() {
            return None;
        }
        if self.std_dev < STDDEV_EPSILON {
            return Some(self.mean);
        }
        let normal = Normal::new(self.mean, self.std_dev).ok()?;
        Some(normal.sample(rng))
    }
}

/// Running count / sum / sum of squares, so a new week is folded in O(1).
#[derive(Clone, Copy, Debug, Default)]
struct RunningStats {
    count: u32,
    sum: f64,
    sum_sq: f64,
}

impl RunningStats {
    fn push(&mut self, x: f64) {
        self.count += 1;
        self.sum += x;
        self.sum_sq += x * x;
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Sample standard deviation (n - 1 denominator); needs two values.
    fn std_dev(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        let n = self.count as f64;
        let variance = (self.sum_sq - self.sum * self.sum / n) / (n - 1.0);
        Some(variance.max(0.0).sqrt())
    }
}

/// Per-team score distributions fitted to completed regular-season weeks.
///
/// Call [`TeamScoringModel::sync`] after new results land in the schedule;
/// only the weekly scores appended since the previous sync are read.
#[derive(Clone, Debug, Default)]
pub struct TeamScoringModel {
    teams: BTreeMap<String, RunningStats>,
    league: RunningStats,
    consumed: usize,
    fixed: BTreeMap<String, ScoreDistribution>,
}

/// Distributions for every team of a league, with the teams that had to
/// borrow the league-wide distribution.
#[derive(Clone, Debug, Default)]
pub struct FittedModels {
    pub distributions: BTreeMap<String, ScoreDistribution>,
    pub fallbacks: Vec<String>,
}

impl FittedModels {
    pub fn get(&self, team_id: &str) -> Option<&ScoreDistribution> {
        self.distributions.get(team_id)
    }
}

impl TeamScoringModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_schedule(schedule: &ScheduleModel) -> Self {
        let mut model = Self::new();
        model.sync(schedule);
        model
    }

    /// Fold in weekly scores appended to `schedule` since the last sync.
    pub fn sync(&mut self, schedule: &ScheduleModel) {
        let scores = schedule.weekly_scores();
        for score in scores.iter().skip(self.consumed) {
            self.observe(score);
        }
        self.consumed = scores.len();
    }

    pub fn observe(&mut self, score: &WeeklyScore) {
        self.teams.entry(score.team_id.clone()).or_default().push(score.points);
        self.league.push(score.points);
    }

    /// Pin a team to explicit parameters, bypassing its observed scores.
    pub fn set_distribution(&mut self, team_id: &str, distribution: ScoreDistribution) {
        self.fixed.insert(team_id.to_string(), distribution);
    }

    pub fn completed_weeks(&self, team_id: &str) -> u32 {
        self.teams.get(team_id).map_or(0, |s| s.count)
    }

    /// Distribution over every score in the league.
    pub fn league_distribution(&self) -> Result<ScoreDistribution, ScoringError> {
        let mean = self.league.mean().ok_or(ScoringError::EmptyLeague)?;
        Ok(ScoreDistribution::new(mean, self.league.std_dev().unwrap_or(0.0)))
    }

    /// Mean and sample standard deviation of one team's completed weeks.
    ///
    /// With a single week the standard deviation is taken from the league.
    pub fn fit(&self, team_id: &str) -> Result<ScoreDistribution, ScoringError> {
        if let Some(fixed) = self.fixed.get(team_id) {
            return Ok(*fixed);
        }
        let stats = self
            .teams
            .get(team_id)
            .filter(|s| s.count > 0)
            .ok_or_else(|| ScoringError::InsufficientData {
                team: team_id.to_string(),
            })?;
        let mean = stats.sum / stats.count as f64;
        let std_dev = match stats.std_dev() {
            Some(sd) => sd,
            None => self.league.std_dev().unwrap_or(0.0),
        };
        Ok(ScoreDistribution::new(mean, std_dev))
    }

    /// Fit every team, substituting the league distribution for teams
    /// without data. Fails only when the league itself has no data.
    pub fn fit_all<'a>(
        &self,
        team_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<FittedModels, ScoringError> {
        let mut fitted = FittedModels::default();
        let mut league = None;
        for team_id in team_ids {
            let distribution = match self.fit(team_id) {
                Ok(d) => d,
                Err(ScoringError::InsufficientData { team }) => {
                    warn!(team = %team, "no completed weeks, using league-wide distribution");
                    fitted.fallbacks.push(team);
                    match league {
                        Some(d) => d,
                        None => {
                            let d = self.league_distribution()?;
                            league = Some(d);
                            d
                        }
                    }
                }
                Err(e) => return Err(e),
            };
            fitted.distributions.insert(team_id.to_string(), distribution);
        }
        Ok(fitted)
    }

    /// Draw one score for a team from its fitted distribution.
    pub fn sample<R: Rng + ?Sized>(&self, team_id: &str, rng: &mut R) -> Result<f64, ScoringError> {
        let distribution = self.fit(team_id)?;
        distribution
            .sample(rng)
            .ok_or_else(|| ScoringError::InvalidDistribution {
                team: team_id.to_string(),
                mean: distribution.mean,
                std_dev: distribution.std_dev,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::team::Team;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn make_schedule() -> ScheduleModel {
        let teams = vec![Team::new("A", "A"), Team::new("B", "B")];
        let mut schedule = ScheduleModel::with_weeks(teams, 4, 0).unwrap();
        schedule.add_result(1, "A", "B", 100.0, 80.0).unwrap();
        schedule.add_result(2, "A", "B", 120.0, 90.0).unwrap();
        schedule.add_result(3, "A", "B", 110.0, 100.0).unwrap();
        schedule
    }

    #[test]
    fn test_fit_mean_and_sample_std_dev() {
        let model = TeamScoringModel::from_schedule(&make_schedule());
        let dist = model.fit("A").unwrap();
        assert!((dist.mean - 110.0).abs() < 1e-9);
        // sample sd of 100, 120, 110 is 10
        assert!((dist.std_dev - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_sync_is_incremental() {
        let mut schedule = make_schedule();
        let mut model = TeamScoringModel::from_schedule(&schedule);
        assert_eq!(model.completed_weeks("A"), 3);

        schedule.add_result(4, "A", "B", 130.0, 70.0).unwrap();
        model.sync(&schedule);
        model.sync(&schedule);
        assert_eq!(model.completed_weeks("A"), 4);
        assert!((model.fit("A").unwrap().mean - 115.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data_falls_back_to_league() {
        let model = TeamScoringModel::from_schedule(&make_schedule());
        assert_eq!(
            model.fit("C"),
            Err(ScoringError::InsufficientData { team: "C".into() })
        );

        let fitted = model.fit_all(["A", "C"]).unwrap();
        assert_eq!(fitted.fallbacks, vec!["C".to_string()]);
        let league = model.league_distribution().unwrap();
        assert_eq!(fitted.get("C"), Some(&league));
        assert!((league.mean - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_league_is_an_error() {
        let model = TeamScoringModel::new();
        assert_eq!(model.fit_all(["A"]).unwrap_err(), ScoringError::EmptyLeague);
    }

    #[test]
    fn test_single_week_borrows_league_spread() {
        let teams = vec![Team::new("A", "A"), Team::new("B", "B")];
        let mut schedule = ScheduleModel::with_weeks(teams, 2, 0).unwrap();
        schedule.add_result(1, "A", "B", 100.0, 80.0).unwrap();
        let model = TeamScoringModel::from_schedule(&schedule);

        let dist = model.fit("A").unwrap();
        assert!((dist.mean - 100.0).abs() < 1e-9);
        assert!((dist.std_dev - model.league_distribution().unwrap().std_dev).abs() < 1e-9);
        assert!(dist.std_dev > 0.0);
    }

    #[test]
    fn test_seeded_sampling_reproducible() {
        let model = TeamScoringModel::from_schedule(&make_schedule());
        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..10 {
            assert_eq!(model.sample("A", &mut rng1).unwrap(), model.sample("A", &mut rng2).unwrap());
        }
    }

    #[test]
    fn test_degenerate_and_invalid_distributions() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert_eq!(ScoreDistribution::new(90.0, 0.0).sample(&mut rng), Some(90.0));
        assert_eq!(ScoreDistribution::new(f64::NAN, 5.0).sample(&mut rng), None);

        let mut model = TeamScoringModel::new();
        model.set_distribution("X", ScoreDistribution::new(100.0, f64::INFINITY));
        assert!(matches!(
            model.sample("X", &mut rng),
            Err(ScoringError::InvalidDistribution { .. })
        ));
    }

    #[test]
    fn test_sample_mean_close_to_fitted_mean() {
        let mut model = TeamScoringModel::new();
        model.set_distribution("A", ScoreDistribution::new(100.0, 10.0));
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let n = 20_000;
        let total: f64 = (0..n).map(|_| model.sample("A", &mut rng).unwrap()).sum();
        assert!((total / n as f64 - 100.0).abs() < 0.5);
    }
}
