use serde::{Deserialize, Serialize};

use crate::constants::BYE_TEAM_ID;

/// Team identity, current roster and cumulative regular-season record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Platform team id
    pub id: String,

    /// Display name
    pub name: String,

    /// Roster snapshot for the week being reported
    #[serde(default)]
    pub roster: Vec<RosterSlot>,

    #[serde(default)]
    pub record: TeamRecord,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Team {
            id: id.into(),
            name: name.into(),
            roster: Vec::new(),
            record: TeamRecord::default(),
        }
    }

    pub fn with_roster(mut self, roster: Vec<RosterSlot>) -> Self {
        self.roster = roster;
        self
    }

    pub fn is_bye(&self) -> bool {
        self.id == BYE_TEAM_ID
    }
}

/// Wins, losses, ties and points for/against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
    pub points_for: f64,
    pub points_against: f64,
}

impl TeamRecord {
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.ties
    }

    /// Wins counted in halves so ties stay exact: `2 * wins + ties`.
    pub fn half_wins(&self) -> u64 {
        2 * u64::from(self.wins) + u64::from(self.ties)
    }

    /// Win percentage with ties worth half a win; 0.0 before any games.
    pub fn win_pct(&self) -> f64 {
        let games = self.games();
        if games == 0 {
            return 0.0;
        }
        self.half_wins() as f64 / (2.0 * games as f64)
    }

    /// Fold one game into the record.
    pub fn record_game(&mut self, scored: f64, allowed: f64) {
        if scored > allowed {
            self.wins += 1;
        } else if scored < allowed {
            self.losses += 1;
        } else {
            self.ties += 1;
        }
        self.points_for += scored;
        self.points_against += allowed;
    }
}

/// One player's place on a team's roster for one week.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RosterSlot {
    pub player_id: String,

    #[serde(default)]
    pub player_name: String,

    /// Lineup slot the player was assigned to (e.g. "QB", "W/R/T", "BN")
    pub position: String,

    /// Positions the player may fill. The assigned position is always allowed.
    #[serde(default)]
    pub eligible_positions: Vec<String>,

    /// Injury/availability designation such as "O" or "IR"
    #[serde(default)]
    pub status: Option<String>,

    /// Fantasy points the player scored that week
    #[serde(default)]
    pub points: f64,
}

impl RosterSlot {
    pub fn new(
        player_id: impl Into<String>,
        position: impl Into<String>,
        eligible_positions: &[&str],
        points: f64,
    ) -> Self {
        let player_id = player_id.into();
        RosterSlot {
            player_name: player_id.clone(),
            player_id,
            position: position.into(),
            eligible_positions: eligible_positions.iter().map(|p| p.to_string()).collect(),
            status: None,
            points,
        }
    }

    pub fn with_status(mut self, status: &str) -> Self {
        self.status = Some(status.to_string());
        self
    }
}
