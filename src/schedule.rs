use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::config::LeagueConfig;
use crate::constants::BYE_TEAM_ID;
use crate::error::ScheduleError;
use crate::team::{RosterSlot, Team};

/// Points one team scored in one completed regular-season week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeeklyScore {
    pub team_id: String,
    pub week: u32,
    pub points: f64,
}

/// A scheduled game; `scores` is filled in once it has been played.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matchup {
    pub week: u32,
    pub team_a: String,
    pub team_b: String,
    /// (team_a points, team_b points)
    pub scores: Option<(f64, f64)>,
}

impl Matchup {
    pub fn scheduled(week: u32, team_a: impl Into<String>, team_b: impl Into<String>) -> Self {
        Matchup {
            week,
            team_a: team_a.into(),
            team_b: team_b.into(),
            scores: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.scores.is_some()
    }

    /// One side is the synthetic bye entity.
    pub fn is_bye(&self) -> bool {
        self.team_a == BYE_TEAM_ID || self.team_b == BYE_TEAM_ID
    }

    pub fn involves(&self, team_id: &str) -> bool {
        self.team_a == team_id || self.team_b == team_id
    }

    fn is_pair(&self, a: &str, b: &str) -> bool {
        (self.team_a == a && self.team_b == b) || (self.team_a == b && self.team_b == a)
    }

    /// Scores oriented from `team_id`'s side: (scored, allowed).
    pub fn scores_for(&self, team_id: &str) -> Option<(f64, f64)> {
        let (a, b) = self.scores?;
        if self.team_a == team_id {
            Some((a, b))
        } else if self.team_b == team_id {
            Some((b, a))
        } else {
            None
        }
    }
}

/// Completed and remaining matchups of one season, plus the teams in it.
///
/// Records and weekly scores are derived from the results added here and
/// cover regular-season weeks only. Playoff-week results are stored but do
/// not touch either.
#[derive(Clone, Debug)]
pub struct ScheduleModel {
    teams: BTreeMap<String, Team>,
    matchups: Vec<Matchup>,
    weekly_scores: Vec<WeeklyScore>,
    num_regular_season_weeks: u32,
    num_playoff_weeks: u32,
}

impl ScheduleModel {
    pub fn new(teams: Vec<Team>, config: &LeagueConfig) -> Result<Self, ScheduleError> {
        Self::with_weeks(
            teams,
            config.num_regular_season_weeks,
            playoff_weeks_for_slots(config.num_playoff_slots),
        )
    }

    pub fn with_weeks(
        teams: Vec<Team>,
        num_regular_season_weeks: u32,
        num_playoff_weeks: u32,
    ) -> Result<Self, ScheduleError> {
        let mut by_id = BTreeMap::new();
        for mut team in teams {
            if team.is_bye() {
                continue;
            }
            // records are rebuilt from results
            team.record = Default::default();
            if by_id.contains_key(&team.id) {
                return Err(ScheduleError::DuplicateTeam(team.id));
            }
            by_id.insert(team.id.clone(), team);
        }
        Ok(ScheduleModel {
            teams: by_id,
            matchups: Vec::new(),
            weekly_scores: Vec::new(),
            num_regular_season_weeks,
            num_playoff_weeks,
        })
    }

    pub fn num_regular_season_weeks(&self) -> u32 {
        self.num_regular_season_weeks
    }

    pub fn num_playoff_weeks(&self) -> u32 {
        self.num_playoff_weeks
    }

    pub fn num_teams(&self) -> usize {
        self.teams.len()
    }

    /// Teams in id order. Simulation indexes teams by this order.
    pub fn teams(&self) -> impl Iterator<Item = &Team> + '_ {
        self.teams.values()
    }

    pub fn team_ids(&self) -> Vec<String> {
        self.teams.keys().cloned().collect()
    }

    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.get(team_id)
    }

    pub fn matchups(&self) -> &[Matchup] {
        &self.matchups
    }

    pub fn weekly_scores(&self) -> &[WeeklyScore] {
        &self.weekly_scores
    }

    /// Replace a team's roster snapshot.
    pub fn set_roster(&mut self, team_id: &str, roster: Vec<RosterSlot>) -> Result<(), ScheduleError> {
        let team = self
            .teams
            .get_mut(team_id)
            .ok_or_else(|| ScheduleError::UnknownTeam(team_id.to_string()))?;
        team.roster = roster;
        Ok(())
    }

    /// Schedule an unplayed matchup.
    pub fn add_matchup(&mut self, week: u32, team_a: &str, team_b: &str) -> Result<(), ScheduleError> {
        self.check_pair(week, team_a, team_b)?;
        if self.find(week, team_a, team_b).is_some() {
            return Ok(());
        }
        self.check_unbooked(week, team_a, team_b)?;
        self.matchups.push(Matchup::scheduled(week, team_a, team_b));
        Ok(())
    }

    /// Record the result of a played matchup, scheduling it first if needed.
    ///
    /// A second result for the same week and pair is rejected with
    /// `DuplicateResult` and the stored result is left as it was.
    pub fn add_result(
        &mut self,
        week: u32,
        team_a: &str,
        team_b: &str,
        score_a: f64,
        score_b: f64,
    ) -> Result<(), ScheduleError> {
        self.check_pair(week, team_a, team_b)?;

        let idx = match self.find(week, team_a, team_b) {
            Some(idx) => {
                if self.matchups[idx].is_completed() {
                    warn!(week, team_a, team_b, "duplicate result rejected");
                    return Err(ScheduleError::DuplicateResult {
                        week,
                        team_a: team_a.to_string(),
                        team_b: team_b.to_string(),
                    });
                }
                idx
            }
            None => {
                self.check_unbooked(week, team_a, team_b)?;
                self.matchups.push(Matchup::scheduled(week, team_a, team_b));
                self.matchups.len() - 1
            }
        };

        let matchup = &mut self.matchups[idx];
        matchup.scores = if matchup.team_a == team_a {
            Some((score_a, score_b))
        } else {
            Some((score_b, score_a))
        };

        if week <= self.num_regular_season_weeks {
            self.apply_regular_season_result(week, team_a, team_b, score_a, score_b);
        }
        debug!(week, team_a, team_b, score_a, score_b, "result recorded");
        Ok(())
    }

    fn apply_regular_season_result(&mut self, week: u32, team_a: &str, team_b: &str, score_a: f64, score_b: f64) {
        let bye = team_a == BYE_TEAM_ID || team_b == BYE_TEAM_ID;
        for (id, scored, allowed) in [(team_a, score_a, score_b), (team_b, score_b, score_a)] {
            if let Some(team) = self.teams.get_mut(id) {
                if !bye {
                    team.record.record_game(scored, allowed);
                }
                self.weekly_scores.push(WeeklyScore {
                    team_id: id.to_string(),
                    week,
                    points: scored,
                });
            }
        }
    }

    /// Unplayed regular-season matchups, in schedule order.
    ///
    /// Each call starts a fresh pass over the schedule.
    pub fn remaining_matchups(&self) -> impl Iterator<Item = &Matchup> + Clone + '_ {
        let last_week = self.num_regular_season_weeks;
        self.matchups
            .iter()
            .filter(move |m| !m.is_completed() && m.week <= last_week)
    }

    /// Whether every team has a completed result in `week`.
    pub fn is_week_complete(&self, week: u32) -> bool {
        !self.teams.is_empty()
            && self.teams.keys().all(|id| {
                self.matchups
                    .iter()
                    .any(|m| m.week == week && m.is_completed() && m.involves(id))
            })
    }

    /// Number of fully resolved regular-season weeks.
    pub fn completed_weeks(&self) -> u32 {
        (1..=self.num_regular_season_weeks)
            .filter(|&w| self.is_week_complete(w))
            .count() as u32
    }

    pub fn latest_completed_week(&self) -> Option<u32> {
        (1..=self.num_regular_season_weeks)
            .rev()
            .find(|&w| self.is_week_complete(w))
    }

    /// Check that every team plays exactly once in every regular-season week.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for week in 1..=self.num_regular_season_weeks {
            for id in self.teams.keys() {
                let appearances = self
                    .matchups
                    .iter()
                    .filter(|m| m.week == week && m.involves(id))
                    .count();
                match appearances {
                    1 => {}
                    0 => {
                        return Err(ScheduleError::IncompleteWeek {
                            week,
                            team: id.clone(),
                        })
                    }
                    _ => {
                        return Err(ScheduleError::DoubleBooked {
                            week,
                            team: id.clone(),
                        })
                    }
                }
            }
        }
        Ok(())
    }

    /// Regular-season head-to-head half wins: (a over b, b over a).
    pub fn head_to_head(&self, team_a: &str, team_b: &str) -> (u32, u32) {
        let mut a_half = 0;
        let mut b_half = 0;
        for m in self.completed_regular_season().filter(|m| m.is_pair(team_a, team_b)) {
            if let Some((scored, allowed)) = m.scores_for(team_a) {
                if scored > allowed {
                    a_half += 2;
                } else if scored < allowed {
                    b_half += 2;
                } else {
                    a_half += 1;
                    b_half += 1;
                }
            }
        }
        (a_half, b_half)
    }

    /// Completed non-bye regular-season matchups.
    pub fn completed_regular_season(&self) -> impl Iterator<Item = &Matchup> + '_ {
        let last_week = self.num_regular_season_weeks;
        self.matchups
            .iter()
            .filter(move |m| m.is_completed() && !m.is_bye() && m.week <= last_week)
    }

    /// Every team's score for `week`, in team id order.
    pub fn scores_for_week(&self, week: u32) -> Vec<(&str, f64)> {
        let mut scores: Vec<(&str, f64)> = self
            .weekly_scores
            .iter()
            .filter(|s| s.week == week)
            .map(|s| (s.team_id.as_str(), s.points))
            .collect();
        scores.sort_by(|a, b| a.0.cmp(b.0));
        scores
    }

    /// One team's weekly scores up to and including `through_week`.
    pub fn team_scores(&self, team_id: &str, through_week: u32) -> Vec<f64> {
        self.weekly_scores
            .iter()
            .filter(|s| s.team_id == team_id && s.week <= through_week)
            .map(|s| s.points)
            .collect()
    }

    fn find(&self, week: u32, team_a: &str, team_b: &str) -> Option<usize> {
        self.matchups
            .iter()
            .position(|m| m.week == week && m.is_pair(team_a, team_b))
    }

    fn check_pair(&self, week: u32, team_a: &str, team_b: &str) -> Result<(), ScheduleError> {
        let max_week = self.num_regular_season_weeks + self.num_playoff_weeks;
        if week == 0 || week > max_week {
            return Err(ScheduleError::WeekOutOfRange { week, max_week });
        }
        if team_a == team_b {
            return Err(ScheduleError::SelfMatchup(team_a.to_string()));
        }
        for id in [team_a, team_b] {
            if id != BYE_TEAM_ID && !self.teams.contains_key(id) {
                return Err(ScheduleError::UnknownTeam(id.to_string()));
            }
        }
        Ok(())
    }

    fn check_unbooked(&self, week: u32, team_a: &str, team_b: &str) -> Result<(), ScheduleError> {
        for id in [team_a, team_b] {
            if id == BYE_TEAM_ID {
                continue;
            }
            if self.matchups.iter().any(|m| m.week == week && m.involves(id)) {
                return Err(ScheduleError::DoubleBooked {
                    week,
                    team: id.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Playoff rounds needed to reduce `slots` teams to a champion.
pub fn playoff_weeks_for_slots(slots: usize) -> u32 {
    if slots <= 1 {
        return 0;
    }
    usize::BITS - (slots - 1).leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_league() -> ScheduleModel {
        let teams = ["A", "B", "C", "D"]
            .iter()
            .map(|id| Team::new(*id, format!("Team {id}")))
            .collect();
        ScheduleModel::with_weeks(teams, 3, 1).unwrap()
    }

    #[test]
    fn test_add_result_updates_records() {
        let mut schedule = make_league();
        schedule.add_result(1, "A", "B", 120.0, 100.0).unwrap();
        schedule.add_result(1, "C", "D", 90.0, 90.0).unwrap();

        let a = schedule.team("A").unwrap();
        assert_eq!(a.record.wins, 1);
        assert!((a.record.points_for - 120.0).abs() < 1e-9);
        assert_eq!(schedule.team("C").unwrap().record.ties, 1);
        assert_eq!(schedule.weekly_scores().len(), 4);
        assert_eq!(schedule.completed_weeks(), 1);
    }

    #[test]
    fn test_duplicate_result_rejected_and_original_kept() {
        let mut schedule = make_league();
        schedule.add_result(1, "A", "B", 120.0, 100.0).unwrap();

        let err = schedule.add_result(1, "B", "A", 130.0, 80.0).unwrap_err();
        assert!(matches!(err, ScheduleError::DuplicateResult { week: 1, .. }));

        let a = schedule.team("A").unwrap();
        assert_eq!(a.record.wins, 1);
        assert_eq!(schedule.matchups()[0].scores, Some((120.0, 100.0)));
        assert_eq!(schedule.weekly_scores().len(), 2);
    }

    #[test]
    fn test_result_resolves_scheduled_matchup_in_either_order() {
        let mut schedule = make_league();
        schedule.add_matchup(2, "A", "C").unwrap();
        schedule.add_result(2, "C", "A", 88.0, 99.0).unwrap();

        assert_eq!(schedule.matchups().len(), 1);
        assert_eq!(schedule.matchups()[0].scores, Some((99.0, 88.0)));
        assert_eq!(schedule.team("A").unwrap().record.wins, 1);
    }

    #[test]
    fn test_double_booking_rejected() {
        let mut schedule = make_league();
        schedule.add_matchup(1, "A", "B").unwrap();
        let err = schedule.add_matchup(1, "A", "C").unwrap_err();
        assert_eq!(err, ScheduleError::DoubleBooked { week: 1, team: "A".into() });
    }

    #[test]
    fn test_bad_inputs_rejected() {
        let mut schedule = make_league();
        assert!(matches!(
            schedule.add_matchup(5, "A", "B"),
            Err(ScheduleError::WeekOutOfRange { week: 5, max_week: 4 })
        ));
        assert!(matches!(schedule.add_matchup(1, "A", "Z"), Err(ScheduleError::UnknownTeam(_))));
        assert!(matches!(schedule.add_matchup(1, "A", "A"), Err(ScheduleError::SelfMatchup(_))));
    }

    #[test]
    fn test_remaining_matchups_restartable() {
        let mut schedule = make_league();
        schedule.add_result(1, "A", "B", 1.0, 0.0).unwrap();
        schedule.add_matchup(2, "A", "C").unwrap();
        schedule.add_matchup(2, "B", "D").unwrap();
        // playoff week is never "remaining" regular season
        schedule.add_matchup(4, "A", "B").unwrap();

        let remaining = schedule.remaining_matchups();
        assert_eq!(remaining.clone().count(), 2);
        assert_eq!(remaining.count(), 2);
        assert_eq!(schedule.remaining_matchups().count(), 2);
    }

    #[test]
    fn test_playoff_results_do_not_touch_records() {
        let mut schedule = make_league();
        schedule.add_result(4, "A", "B", 150.0, 60.0).unwrap();
        assert_eq!(schedule.team("A").unwrap().record.games(), 0);
        assert!(schedule.weekly_scores().is_empty());
    }

    #[test]
    fn test_bye_gives_score_but_no_record() {
        let teams = vec![Team::new("A", "A"), Team::new("B", "B"), Team::new("C", "C")];
        let mut schedule = ScheduleModel::with_weeks(teams, 1, 0).unwrap();
        schedule.add_result(1, "A", "B", 100.0, 90.0).unwrap();
        schedule.add_result(1, "C", BYE_TEAM_ID, 111.0, 0.0).unwrap();

        assert_eq!(schedule.team("C").unwrap().record.games(), 0);
        assert_eq!(schedule.team_scores("C", 1), vec![111.0]);
        assert!(schedule.validate().is_ok());
        assert_eq!(schedule.completed_weeks(), 1);
        assert_eq!(schedule.completed_regular_season().count(), 1);
    }

    #[test]
    fn test_validate_detects_missing_team() {
        let mut schedule = make_league();
        schedule.add_matchup(1, "A", "B").unwrap();
        let err = schedule.validate().unwrap_err();
        assert_eq!(err, ScheduleError::IncompleteWeek { week: 1, team: "C".into() });
    }

    #[test]
    fn test_head_to_head() {
        let mut schedule = make_league();
        schedule.add_result(1, "A", "B", 100.0, 90.0).unwrap();
        schedule.add_result(2, "B", "A", 95.0, 95.0).unwrap();
        assert_eq!(schedule.head_to_head("A", "B"), (3, 1));
        assert_eq!(schedule.head_to_head("B", "A"), (1, 3));
    }

    #[test]
    fn test_playoff_weeks_for_slots() {
        assert_eq!(playoff_weeks_for_slots(1), 0);
        assert_eq!(playoff_weeks_for_slots(2), 1);
        assert_eq!(playoff_weeks_for_slots(4), 2);
        assert_eq!(playoff_weeks_for_slots(6), 3);
    }
}
