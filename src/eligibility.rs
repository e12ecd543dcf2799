use serde::Serialize;
use tracing::debug;

use crate::config::LeagueConfig;
use crate::lineup::starters;
use crate::team::Team;

/// A started player whose status is on the prohibited list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProhibitedStarter {
    pub player_id: String,
    pub status: String,
}

/// Why a team may be kept out of the coaching efficiency ranking.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EligibilityCheck {
    /// Named in `coaching_efficiency_disqualified_teams`
    pub manually_disqualified: bool,
    pub prohibited_starters: Vec<ProhibitedStarter>,
}

/// Coaching efficiency eligibility, judged from a team's roster snapshot.
#[derive(Clone, Debug)]
pub struct EligibilityFilter {
    config: LeagueConfig,
}

impl EligibilityFilter {
    pub fn new(config: &LeagueConfig) -> Self {
        EligibilityFilter { config: config.clone() }
    }

    pub fn evaluate(&self, team: &Team) -> EligibilityCheck {
        let config = &self.config;
        let manually_disqualified = config.is_coaching_efficiency_disqualified(&team.name, &team.id);
        let prohibited_starters = starters(&team.roster, config)
            .filter_map(|slot| {
                let status = slot.status.as_ref()?;
                config.is_prohibited_status(status).then(|| ProhibitedStarter {
                    player_id: slot.player_id.clone(),
                    status: status.clone(),
                })
            })
            .collect();
        EligibilityCheck {
            manually_disqualified,
            prohibited_starters,
        }
    }

    /// Whether the team may appear in the coaching efficiency ranking for
    /// `week`, given its roster snapshot for that week.
    pub fn is_eligible(&self, team: &Team, week: u32) -> bool {
        let check = self.evaluate(team);
        let eligible = !check.manually_disqualified
            && (check.prohibited_starters.is_empty() || !self.config.report.disqualify_coaching_efficiency);
        if !eligible {
            debug!(team = %team.name, week, "not eligible for coaching efficiency");
        }
        eligible
    }
}
