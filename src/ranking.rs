//! Weekly ranking metrics: power, z-score, luck, coaching efficiency, bad
//! boy and beef.
//!
//! Everything is derived from results through the ranked week, never from
//! later weeks, so recomputing an old week gives the old numbers. A week's
//! metrics are locked once reported.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use tracing::{debug, info, warn};

use crate::config::{LeagueConfig, PowerRankingWeights};
use crate::constants::{POUNDS_PER_TABBU, STDDEV_EPSILON};
use crate::eligibility::{EligibilityFilter, ProhibitedStarter};
use crate::error::RankingError;
use crate::lineup::{coaching_efficiency, starters, LineupEvaluation};
use crate::schedule::ScheduleModel;
use crate::team::{Team, TeamRecord};

/// Externally supplied per-player values, keyed by player id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerAttributes {
    /// Offense points charged to a player this week
    pub bad_boy_points: BTreeMap<String, f64>,
    /// Body weight in pounds
    pub weights: BTreeMap<String, f64>,
}

/// One team's metrics for one week.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankingMetrics {
    pub team_id: String,
    pub team_name: String,
    pub week: u32,

    pub power_score: f64,
    pub power_rank: usize,

    /// Points scored in the ranked week
    pub score: f64,
    pub z_score: f64,
    pub z_score_rank: usize,

    /// All-play expected wins through the ranked week
    pub expected_wins: f64,
    /// Actual wins through the ranked week, ties counted as half
    pub actual_wins: f64,
    pub luck: f64,
    /// Luck as a percentage of games played
    pub luck_pct: f64,
    pub luck_rank: usize,

    pub coaching_efficiency: LineupEvaluation,
    /// None when the team is kept out of the eligible ranking
    pub coaching_efficiency_rank: Option<usize>,
    pub coaching_efficiency_eligible: bool,

    pub bad_boy_points: f64,
    pub bad_boy_offenders: usize,
    pub bad_boy_rank: usize,

    pub beef_pounds: f64,
    pub beef_tabbus: f64,
    pub beef_rank: usize,
}

/// Something odd about a week's numbers that did not stop them from
/// being computed.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RankingWarning {
    /// Every team scored the same; z-scores are all 0.
    DegenerateScoreDistribution { week: u32 },
    CoachingEfficiencyDisqualified {
        team_id: String,
        manually: bool,
        prohibited_starters: Vec<ProhibitedStarter>,
    },
    /// Prohibited starters found while status disqualification is off.
    ProhibitedStatusIgnored {
        team_id: String,
        prohibited_starters: Vec<ProhibitedStarter>,
    },
    /// Best possible lineup was worth nothing; efficiency reported as 0.
    DegenerateLineup { team_id: String },
}

/// All teams' metrics for one week.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WeeklyRankings {
    pub week: u32,
    /// Ordered by power rank
    pub metrics: Vec<RankingMetrics>,
    /// Eligible team ids, most efficient first
    pub coaching_efficiency_ranking: Vec<String>,
    pub warnings: Vec<RankingWarning>,
}

impl WeeklyRankings {
    pub fn get(&self, team_id: &str) -> Option<&RankingMetrics> {
        self.metrics.iter().find(|m| m.team_id == team_id)
    }
}

/// Competition ranks ("1224") for `entries`, highest value first.
///
/// With `break_ties`, equal values are ordered by id instead and every rank
/// is distinct. Returned ranks line up with `entries`.
pub fn assign_ranks(entries: &[(&str, f64)], break_ties: bool) -> Vec<usize> {
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by(|&a, &b| {
        entries[b]
            .1
            .total_cmp(&entries[a].1)
            .then_with(|| entries[a].0.cmp(entries[b].0))
    });

    let mut ranks = vec![0; entries.len()];
    for (pos, &i) in order.iter().enumerate() {
        ranks[i] = if !break_ties && pos > 0 && entries[order[pos - 1]].1 == entries[i].1 {
            ranks[order[pos - 1]]
        } else {
            pos + 1
        };
    }
    ranks
}

/// Per-team numbers that need no knowledge of the other teams' results
/// beyond the shared weekly score table.
struct TeamInputs {
    /// Regular-season record through the ranked week
    record: TeamRecord,
    expected_wins: f64,
    score: f64,
    average: f64,
    recent_average: f64,
    lineup: LineupEvaluation,
    eligible: bool,
    manually_disqualified: bool,
    prohibited_starters: Vec<ProhibitedStarter>,
    bad_boy_points: f64,
    bad_boy_offenders: usize,
    beef_pounds: f64,
}

/// Computes and locks weekly rankings.
#[derive(Clone, Debug)]
pub struct RankingEngine {
    config: LeagueConfig,
    eligibility: EligibilityFilter,
    locked: BTreeMap<u32, WeeklyRankings>,
}

impl RankingEngine {
    pub fn new(config: &LeagueConfig) -> Self {
        RankingEngine {
            config: config.clone(),
            eligibility: EligibilityFilter::new(config),
            locked: BTreeMap::new(),
        }
    }

    /// Metrics for `week` without locking them.
    pub fn compute(
        &self,
        schedule: &ScheduleModel,
        week: u32,
        attributes: &PlayerAttributes,
    ) -> Result<WeeklyRankings, RankingError> {
        if week == 0 || week > schedule.num_regular_season_weeks() || !schedule.is_week_complete(week) {
            return Err(RankingError::WeekNotCompleted(week));
        }
        info!(week, teams = schedule.num_teams(), "computing weekly rankings");

        let weekly: BTreeMap<u32, Vec<(&str, f64)>> =
            (1..=week).map(|w| (w, schedule.scores_for_week(w))).collect();
        let teams: Vec<&Team> = schedule.teams().collect();

        let inputs: Vec<TeamInputs> = teams
            .par_iter()
            .map(|team| self.team_inputs(schedule, team, week, &weekly, attributes))
            .collect();

        // ranks need every team's numbers
        Ok(self.rank(&teams, week, &weekly, inputs))
    }

    /// Store `rankings` as final for its week.
    pub fn lock(&mut self, rankings: WeeklyRankings) -> Result<&WeeklyRankings, RankingError> {
        let week = rankings.week;
        if self.locked.contains_key(&week) {
            return Err(RankingError::WeekLocked(week));
        }
        debug!(week, "weekly rankings locked");
        Ok(self.locked.entry(week).or_insert(rankings))
    }

    /// The locked metrics for `week`, computing and locking them first if
    /// needed.
    pub fn compute_week(
        &mut self,
        schedule: &ScheduleModel,
        week: u32,
        attributes: &PlayerAttributes,
    ) -> Result<&WeeklyRankings, RankingError> {
        if self.locked.contains_key(&week) {
            debug!(week, "returning locked rankings");
            return self.locked.get(&week).ok_or(RankingError::WeekNotCompleted(week));
        }
        let rankings = self.compute(schedule, week, attributes)?;
        self.lock(rankings)
    }

    pub fn locked(&self, week: u32) -> Option<&WeeklyRankings> {
        self.locked.get(&week)
    }

    /// Weeks averaged for the power trend, ending at `week`.
    fn trend_window(&self, week: u32) -> RangeInclusive<u32> {
        let span = self.config.power_ranking.trend_weeks.max(1);
        week.saturating_sub(span) + 1..=week
    }

    fn team_inputs(
        &self,
        schedule: &ScheduleModel,
        team: &Team,
        week: u32,
        weekly: &BTreeMap<u32, Vec<(&str, f64)>>,
        attributes: &PlayerAttributes,
    ) -> TeamInputs {
        let mut record = TeamRecord::default();
        let mut expected_wins = 0.0;
        for m in schedule.completed_regular_season().filter(|m| m.week <= week) {
            let Some((scored, allowed)) = m.scores_for(&team.id) else {
                continue;
            };
            record.record_game(scored, allowed);
            if let Some(scores) = weekly.get(&m.week) {
                expected_wins += all_play_fraction(&team.id, scored, scores);
            }
        }

        let scores = schedule.team_scores(&team.id, week);
        let recent: Vec<f64> = weekly
            .range(self.trend_window(week))
            .filter_map(|(_, scores)| scores.iter().find(|(id, _)| *id == team.id).map(|&(_, p)| p))
            .collect();
        let score = weekly
            .get(&week)
            .and_then(|scores| scores.iter().find(|(id, _)| *id == team.id))
            .map_or(0.0, |&(_, p)| p);

        let check = self.eligibility.evaluate(team);
        let eligible = self.eligibility.is_eligible(team, week);

        let mut bad_boy_points = 0.0;
        let mut bad_boy_offenders = 0;
        let mut beef_pounds = 0.0;
        for slot in starters(&team.roster, &self.config) {
            if let Some(&points) = attributes.bad_boy_points.get(&slot.player_id) {
                bad_boy_points += points;
                if points > 0.0 {
                    bad_boy_offenders += 1;
                }
            }
            beef_pounds += attributes.weights.get(&slot.player_id).copied().unwrap_or(0.0);
        }

        TeamInputs {
            record,
            expected_wins,
            score,
            average: mean(&scores),
            recent_average: mean(&recent),
            lineup: coaching_efficiency(&team.roster, &self.config),
            eligible,
            manually_disqualified: check.manually_disqualified,
            prohibited_starters: check.prohibited_starters,
            bad_boy_points,
            bad_boy_offenders,
            beef_pounds,
        }
    }

    fn rank(
        &self,
        teams: &[&Team],
        week: u32,
        weekly: &BTreeMap<u32, Vec<(&str, f64)>>,
        inputs: Vec<TeamInputs>,
    ) -> WeeklyRankings {
        let break_ties = self.config.report.break_ties;
        let mut warnings = Vec::new();

        let all_scores: Vec<f64> = weekly.values().flatten().map(|&(_, p)| p).collect();
        let recent_scores: Vec<f64> = weekly
            .range(self.trend_window(week))
            .flat_map(|(_, scores)| scores.iter().map(|&(_, p)| p))
            .collect();
        let league_average = mean(&all_scores);
        let league_recent_average = mean(&recent_scores);

        let this_week: Vec<f64> = inputs.iter().map(|t| t.score).collect();
        let week_mean = mean(&this_week);
        let week_std = population_std_dev(&this_week, week_mean);
        let degenerate = week_std < STDDEV_EPSILON;
        if degenerate {
            warn!(week, "all teams scored the same; z-scores set to 0");
            warnings.push(RankingWarning::DegenerateScoreDistribution { week });
        }

        let power: Vec<f64> = inputs
            .iter()
            .map(|t| {
                power_score(
                    &self.config.power_ranking,
                    t.record.win_pct(),
                    ratio(t.average, league_average),
                    ratio(t.recent_average, league_recent_average),
                )
            })
            .collect();
        let luck: Vec<f64> = inputs
            .iter()
            .map(|t| actual_wins(&t.record) - t.expected_wins)
            .collect();
        let efficiency: Vec<f64> = inputs.iter().map(|t| t.lineup.efficiency).collect();

        let keyed = |values: &[f64]| -> Vec<usize> {
            let entries: Vec<(&str, f64)> = teams
                .iter()
                .zip(values)
                .map(|(team, &v)| (team.id.as_str(), v))
                .collect();
            assign_ranks(&entries, break_ties)
        };
        let power_ranks = keyed(&power);
        // z is monotonic in score, and raw score is the fallback when degenerate
        let score_ranks = keyed(&this_week);
        let luck_ranks = keyed(&luck);
        let bad_boy_ranks = keyed(&inputs.iter().map(|t| t.bad_boy_points).collect::<Vec<_>>());
        let beef_ranks = keyed(&inputs.iter().map(|t| t.beef_pounds).collect::<Vec<_>>());

        let eligible: Vec<(&str, f64)> = teams
            .iter()
            .zip(&inputs)
            .zip(&efficiency)
            .filter(|((_, t), _)| t.eligible)
            .map(|((team, _), &e)| (team.id.as_str(), e))
            .collect();
        let eligible_ranks = assign_ranks(&eligible, break_ties);
        let mut ce_ranked: Vec<(usize, &str)> = eligible_ranks
            .iter()
            .zip(&eligible)
            .map(|(&r, &(id, _))| (r, id))
            .collect();
        ce_ranked.sort();
        let ce_rank_of: BTreeMap<&str, usize> = ce_ranked.iter().map(|&(r, id)| (id, r)).collect();

        let mut metrics: Vec<RankingMetrics> = Vec::with_capacity(teams.len());
        for (i, (team, t)) in teams.iter().zip(inputs).enumerate() {
            if t.lineup.degenerate {
                warn!(team = %team.name, week, "optimal lineup scored nothing");
                warnings.push(RankingWarning::DegenerateLineup {
                    team_id: team.id.clone(),
                });
            }
            if !t.eligible {
                warnings.push(RankingWarning::CoachingEfficiencyDisqualified {
                    team_id: team.id.clone(),
                    manually: t.manually_disqualified,
                    prohibited_starters: t.prohibited_starters.clone(),
                });
            } else if !t.prohibited_starters.is_empty() {
                warn!(team = %team.name, week, "prohibited starters ignored for coaching efficiency");
                warnings.push(RankingWarning::ProhibitedStatusIgnored {
                    team_id: team.id.clone(),
                    prohibited_starters: t.prohibited_starters.clone(),
                });
            }

            let z_score = if degenerate {
                0.0
            } else {
                z_score(t.score, week_mean, week_std)
            };
            let games = t.record.games();
            let luck_pct = if games > 0 {
                100.0 * luck[i] / f64::from(games)
            } else {
                0.0
            };

            metrics.push(RankingMetrics {
                team_id: team.id.clone(),
                team_name: team.name.clone(),
                week,
                power_score: power[i],
                power_rank: power_ranks[i],
                score: t.score,
                z_score,
                z_score_rank: score_ranks[i],
                expected_wins: t.expected_wins,
                actual_wins: actual_wins(&t.record),
                luck: luck[i],
                luck_pct,
                luck_rank: luck_ranks[i],
                coaching_efficiency: t.lineup,
                coaching_efficiency_rank: ce_rank_of.get(team.id.as_str()).copied(),
                coaching_efficiency_eligible: t.eligible,
                bad_boy_points: t.bad_boy_points,
                bad_boy_offenders: t.bad_boy_offenders,
                bad_boy_rank: bad_boy_ranks[i],
                beef_pounds: t.beef_pounds,
                beef_tabbus: t.beef_pounds / POUNDS_PER_TABBU,
                beef_rank: beef_ranks[i],
            });
        }
        metrics.sort_by(|a, b| a.power_rank.cmp(&b.power_rank).then_with(|| a.team_id.cmp(&b.team_id)));

        WeeklyRankings {
            week,
            metrics,
            coaching_efficiency_ranking: ce_ranked.into_iter().map(|(_, id)| id.to_string()).collect(),
            warnings,
        }
    }
}

/// Weighted blend of win percentage and scoring relative to the league.
pub fn power_score(weights: &PowerRankingWeights, win_pct: f64, score_ratio: f64, trend_ratio: f64) -> f64 {
    weights.win_weight * win_pct + weights.score_weight * score_ratio + weights.trend_weight * trend_ratio
}

/// Share of the other teams `team_id` outscored in one week, ties half.
fn all_play_fraction(team_id: &str, scored: f64, week_scores: &[(&str, f64)]) -> f64 {
    let others = week_scores.iter().filter(|(id, _)| *id != team_id);
    let count = others.clone().count();
    if count == 0 {
        return 0.0;
    }
    let half_beaten: u32 = others
        .map(|&(_, p)| {
            if scored > p {
                2
            } else if scored == p {
                1
            } else {
                0
            }
        })
        .sum();
    f64::from(half_beaten) / (2.0 * count as f64)
}

fn actual_wins(record: &TeamRecord) -> f64 {
    record.half_wins() as f64 / 2.0
}

/// Standard score of `score`; exactly 0 for a score at the mean, whatever
/// rounding the mean picked up.
fn z_score(score: f64, mean: f64, std_dev: f64) -> f64 {
    let diff = score - mean;
    if diff.abs() <= STDDEV_EPSILON * score.abs().max(1.0) {
        0.0
    } else {
        diff / std_dev
    }
}

fn ratio(value: f64, league: f64) -> f64 {
    if league > 0.0 {
        value / league
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn population_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}
