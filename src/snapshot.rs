//! JSON input model for a league as collaborators hand it over.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::config::LeagueConfig;
use crate::error::{ScheduleError, SnapshotError};
use crate::ranking::PlayerAttributes;
use crate::schedule::ScheduleModel;
use crate::team::Team;

/// One scheduled or played game. `scores` is absent until it is played.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchupEntry {
    pub week: u32,
    pub team_a: String,
    pub team_b: String,
    #[serde(default)]
    pub scores: Option<(f64, f64)>,
}

/// Teams, their roster snapshots and every matchup of the season.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueSnapshot {
    pub teams: Vec<Team>,
    #[serde(default)]
    pub matchups: Vec<MatchupEntry>,
    #[serde(default)]
    pub player_attributes: PlayerAttributes,
}

impl LeagueSnapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let snapshot = Self::from_json_str(&text)?;
        debug!(
            path = %path.display(),
            teams = snapshot.teams.len(),
            matchups = snapshot.matchups.len(),
            "league snapshot loaded"
        );
        Ok(snapshot)
    }

    pub fn from_json_str(text: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Build the schedule, replaying played games in week order.
    pub fn to_schedule(&self, config: &LeagueConfig) -> Result<ScheduleModel, ScheduleError> {
        let mut schedule = ScheduleModel::new(self.teams.clone(), config)?;

        let mut entries: Vec<&MatchupEntry> = self.matchups.iter().collect();
        entries.sort_by_key(|m| m.week);
        for m in entries {
            match m.scores {
                Some((a, b)) => schedule.add_result(m.week, &m.team_a, &m.team_b, a, b)?,
                None => schedule.add_matchup(m.week, &m.team_a, &m.team_b)?,
            }
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BYE_TEAM_ID;

    const SNAPSHOT: &str = r#"{
        "teams": [
            {"id": "1", "name": "Alpha", "roster": [
                {"player_id": "p1", "position": "QB", "eligible_positions": ["QB"], "points": 21.5},
                {"player_id": "p2", "position": "BN", "eligible_positions": ["RB"], "status": "IR"}
            ]},
            {"id": "2", "name": "Bravo"},
            {"id": "3", "name": "Charlie"}
        ],
        "matchups": [
            {"week": 2, "team_a": "1", "team_b": "2"},
            {"week": 1, "team_a": "1", "team_b": "2", "scores": [101.0, 99.5]},
            {"week": 1, "team_a": "3", "team_b": "__bye__", "scores": [88.0, 0.0]}
        ],
        "player_attributes": {"weights": {"p1": 225.0}}
    }"#;

    #[test]
    fn test_parse_and_build_schedule() {
        let snapshot = LeagueSnapshot::from_json_str(SNAPSHOT).unwrap();
        assert_eq!(snapshot.teams[0].roster[1].status.as_deref(), Some("IR"));
        assert_eq!(snapshot.player_attributes.weights["p1"], 225.0);
        assert_eq!(snapshot.matchups[2].team_b, BYE_TEAM_ID);

        let schedule = snapshot.to_schedule(&LeagueConfig::new(10, 1, 2)).unwrap();
        assert_eq!(schedule.num_teams(), 3);
        assert_eq!(schedule.team("1").unwrap().record.wins, 1);
        // a bye scores but does not count as a game
        assert_eq!(schedule.team("3").unwrap().record.games(), 0);
        assert_eq!(schedule.team_scores("3", 1), vec![88.0]);
        assert_eq!(schedule.remaining_matchups().count(), 1);
        assert_eq!(schedule.latest_completed_week(), Some(1));
    }

    #[test]
    fn test_unknown_team_rejected() {
        let mut snapshot = LeagueSnapshot::from_json_str(SNAPSHOT).unwrap();
        snapshot.matchups[0].team_b = "9".into();
        let err = snapshot.to_schedule(&LeagueConfig::new(10, 1, 2)).unwrap_err();
        assert_eq!(err, ScheduleError::UnknownTeam("9".into()));
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            LeagueSnapshot::from_json_str("{\"teams\": 3}"),
            Err(SnapshotError::Parse(_))
        ));
    }
}
