//! Optimal lineup selection and coaching efficiency.
//!
//! The lineup slots to fill come from the league's `roster_positions`, so a
//! starting slot the manager left empty still counts against them. Leagues
//! without a configured lineup fall back to the slots the team's starters
//! occupied. Any rostered player may fill a slot they are eligible for:
//! their own eligible positions, the positions a flex slot accepts, or the
//! slot they actually occupied. A slot may also stay empty, worth zero.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::config::LeagueConfig;
use crate::team::RosterSlot;

/// Cost of an assignment that is not allowed.
const FORBIDDEN: f64 = 1e12;

/// Started points are snapped to the optimum within this tolerance.
const EFFICIENCY_TOLERANCE: f64 = 1e-9;

/// Coaching efficiency of one roster for one week.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LineupEvaluation {
    pub actual_points: f64,
    pub optimal_points: f64,
    /// `actual / optimal` clamped to [0, 1]
    pub efficiency: f64,
    /// Optimal lineup worth zero or less; efficiency is reported as 0
    pub degenerate: bool,
}

/// Whether `player` may be started in `slot`.
pub fn can_fill(slot: &str, player: &RosterSlot, flex_positions: &BTreeMap<String, Vec<String>>) -> bool {
    if player.position == slot || player.eligible_positions.iter().any(|p| p == slot) {
        return true;
    }
    flex_positions
        .get(slot)
        .is_some_and(|accepted| player.eligible_positions.iter().any(|p| accepted.contains(p)))
}

/// Roster entries that were started (not in a bench position).
pub fn starters<'a>(roster: &'a [RosterSlot], config: &'a LeagueConfig) -> impl Iterator<Item = &'a RosterSlot> + 'a {
    roster.iter().filter(|slot| !config.is_bench_position(&slot.position))
}

/// Starting slots a full lineup has to fill.
pub fn lineup_slots<'a>(roster: &'a [RosterSlot], config: &'a LeagueConfig) -> Vec<&'a str> {
    if config.roster_positions.is_empty() {
        starters(roster, config).map(|s| s.position.as_str()).collect()
    } else {
        config.starting_slots().collect()
    }
}

/// Best achievable starting points from `roster` over the league's
/// starting slots.
pub fn optimal_lineup_points(roster: &[RosterSlot], config: &LeagueConfig) -> f64 {
    let slots = lineup_slots(roster, config);
    if slots.is_empty() {
        return 0.0;
    }

    // rows: lineup slots; columns: players, then one "empty" column per slot
    let rows = slots.len();
    let cols = roster.len() + rows;
    let cost: Vec<Vec<f64>> = slots
        .iter()
        .map(|slot| {
            let mut row: Vec<f64> = roster
                .iter()
                .map(|player| {
                    if can_fill(slot, player, &config.flex_positions) {
                        -player.points
                    } else {
                        FORBIDDEN
                    }
                })
                .collect();
            row.extend(std::iter::repeat(0.0).take(rows));
            row
        })
        .collect();

    min_cost_assignment(&cost, cols)
        .into_iter()
        .enumerate()
        .filter(|&(_, col)| col < roster.len())
        .map(|(_, col)| roster[col].points)
        .sum()
}

/// Started points over optimal points for one roster.
pub fn coaching_efficiency(roster: &[RosterSlot], config: &LeagueConfig) -> LineupEvaluation {
    let actual_points: f64 = starters(roster, config).map(|s| s.points).sum();
    let mut optimal_points = optimal_lineup_points(roster, config);

    if actual_points >= optimal_points - EFFICIENCY_TOLERANCE {
        optimal_points = actual_points;
    }
    if optimal_points <= 0.0 {
        return LineupEvaluation {
            actual_points,
            optimal_points,
            efficiency: 0.0,
            degenerate: true,
        };
    }

    let efficiency = if actual_points >= optimal_points {
        1.0
    } else {
        (actual_points / optimal_points).clamp(0.0, 1.0)
    };
    LineupEvaluation {
        actual_points,
        optimal_points,
        efficiency,
        degenerate: false,
    }
}

/// Hungarian algorithm for a `rows x cols` cost matrix with rows <= cols.
///
/// Returns the column assigned to each row, minimizing total cost.
fn min_cost_assignment(cost: &[Vec<f64>], cols: usize) -> Vec<usize> {
    let rows = cost.len();
    debug_assert!(rows <= cols);

    // 1-indexed potentials; column 0 is a sentinel
    let mut u = vec![0.0; rows + 1];
    let mut v = vec![0.0; cols + 1];
    let mut owner = vec![0usize; cols + 1];
    let mut way = vec![0usize; cols + 1];

    for row in 1..=rows {
        owner[0] = row;
        let mut j0 = 0;
        let mut min_v = vec![f64::INFINITY; cols + 1];
        let mut used = vec![false; cols + 1];
        loop {
            used[j0] = true;
            let i0 = owner[j0];
            let mut delta = f64::INFINITY;
            let mut j1 = 0;
            for j in 1..=cols {
                if used[j] {
                    continue;
                }
                let reduced = cost[i0 - 1][j - 1] - u[i0] - v[j];
                if reduced < min_v[j] {
                    min_v[j] = reduced;
                    way[j] = j0;
                }
                if min_v[j] < delta {
                    delta = min_v[j];
                    j1 = j;
                }
            }
            for j in 0..=cols {
                if used[j] {
                    u[owner[j]] += delta;
                    v[j] -= delta;
                } else {
                    min_v[j] -= delta;
                }
            }
            j0 = j1;
            if owner[j0] == 0 {
                break;
            }
        }
        loop {
            let j1 = way[j0];
            owner[j0] = owner[j1];
            j0 = j1;
            if j0 == 0 {
                break;
            }
        }
    }

    let mut assignment = vec![0; rows];
    for j in 1..=cols {
        if owner[j] != 0 {
            assignment[owner[j] - 1] = j - 1;
        }
    }
    assignment
}
