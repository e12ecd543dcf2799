use serde::Serialize;
use std::cmp::Ordering;

use crate::schedule::ScheduleModel;
use crate::team::TeamRecord;

/// Wins, points-for and head-to-head tallies for a fixed set of teams,
/// addressed by index (team id order of the schedule).
#[derive(Clone, Debug)]
pub struct StandingsTable {
    n: usize,
    half_wins: Vec<u64>,
    points_for: Vec<f64>,
    /// `h2h[i * n + j]` = half wins of team i over team j
    h2h: Vec<u32>,
}

impl StandingsTable {
    pub fn new(n: usize) -> Self {
        StandingsTable {
            n,
            half_wins: vec![0; n],
            points_for: vec![0.0; n],
            h2h: vec![0; n * n],
        }
    }

    /// Seed from the completed regular-season results of a schedule.
    pub fn from_schedule(schedule: &ScheduleModel) -> Self {
        let ids = schedule.team_ids();
        let mut table = StandingsTable::new(ids.len());
        for (i, team) in schedule.teams().enumerate() {
            table.half_wins[i] = team.record.half_wins();
            table.points_for[i] = team.record.points_for;
        }
        for m in schedule.completed_regular_season() {
            let (Some(i), Some(j)) = (index_of(&ids, &m.team_a), index_of(&ids, &m.team_b)) else {
                continue;
            };
            if let Some((a, b)) = m.scores {
                table.tally_head_to_head(i, j, a, b);
            }
        }
        table
    }

    pub fn half_wins(&self) -> &[u64] {
        &self.half_wins
    }

    /// Fold one game between teams `i` and `j` into the table.
    pub fn record_game(&mut self, i: usize, j: usize, score_i: f64, score_j: f64) {
        match score_i.partial_cmp(&score_j) {
            Some(Ordering::Greater) => self.half_wins[i] += 2,
            Some(Ordering::Less) => self.half_wins[j] += 2,
            _ => {
                self.half_wins[i] += 1;
                self.half_wins[j] += 1;
            }
        }
        self.points_for[i] += score_i;
        self.points_for[j] += score_j;
        self.tally_head_to_head(i, j, score_i, score_j);
    }

    fn tally_head_to_head(&mut self, i: usize, j: usize, score_i: f64, score_j: f64) {
        let n = self.n;
        match score_i.partial_cmp(&score_j) {
            Some(Ordering::Greater) => self.h2h[i * n + j] += 2,
            Some(Ordering::Less) => self.h2h[j * n + i] += 2,
            _ => {
                self.h2h[i * n + j] += 1;
                self.h2h[j * n + i] += 1;
            }
        }
    }

    /// Team indices from first place to last.
    ///
    /// Order is wins, then points-for, then head-to-head half wins against
    /// the other teams tied on both, then index. No two teams compare equal.
    pub fn ranked(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.n).collect();
        order.sort_by(|&a, &b| self.primary_cmp(a, b).then(a.cmp(&b)));

        let mut tie_h2h = vec![0u32; self.n];
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len() && self.primary_cmp(order[start], order[end]) == Ordering::Equal {
                end += 1;
            }
            if end - start > 1 {
                let group = &order[start..end];
                for &i in group {
                    tie_h2h[i] = group
                        .iter()
                        .filter(|&&j| j != i)
                        .map(|&j| self.h2h[i * self.n + j])
                        .sum();
                }
            }
            start = end;
        }

        order.sort_by(|&a, &b| {
            self.primary_cmp(a, b)
                .then_with(|| tie_h2h[b].cmp(&tie_h2h[a]))
                .then(a.cmp(&b))
        });
        order
    }

    fn primary_cmp(&self, a: usize, b: usize) -> Ordering {
        self.half_wins[b]
            .cmp(&self.half_wins[a])
            .then_with(|| self.points_for[b].total_cmp(&self.points_for[a]))
    }
}

fn index_of(ids: &[String], id: &str) -> Option<usize> {
    ids.binary_search_by(|probe| probe.as_str().cmp(id)).ok()
}

/// One line of the current real standings.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StandingRow {
    pub rank: usize,
    pub team_id: String,
    pub team_name: String,
    pub record: TeamRecord,
}

/// Current regular-season standings under the league tie-break rule.
pub fn current_standings(schedule: &ScheduleModel) -> Vec<StandingRow> {
    let teams: Vec<_> = schedule.teams().collect();
    StandingsTable::from_schedule(schedule)
        .ranked()
        .into_iter()
        .enumerate()
        .map(|(pos, i)| StandingRow {
            rank: pos + 1,
            team_id: teams[i].id.clone(),
            team_name: teams[i].name.clone(),
            record: teams[i].record,
        })
        .collect()
}
