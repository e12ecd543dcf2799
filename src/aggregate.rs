use serde::Serialize;
use std::cmp::Ordering;

use crate::schedule::ScheduleModel;
use crate::simulation::SimulatedStanding;

/// Playoff outlook of one team over a batch of simulated seasons.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlayoffProbabilityResult {
    pub team_id: String,
    pub team_name: String,

    /// Fraction of runs finishing in a playoff slot
    pub playoff_probability: f64,

    /// `seed_probabilities[k]` = fraction of runs finishing exactly in seed k + 1
    pub seed_probabilities: Vec<f64>,

    /// Fraction of runs finishing exactly on the last playoff seed
    pub cutoff_probability: f64,

    /// Mean final regular-season rank (1 = first)
    pub average_final_rank: f64,

    /// Mean final win total, ties counted as half a win
    pub average_wins: f64,
}

/// Integer berth/seed/rank counters for a set of runs.
///
/// Merging is plain addition, so tallies built on any number of workers in
/// any order combine to the same totals.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StandingsTally {
    num_playoff_slots: usize,
    berths: Vec<u64>,
    /// team-major: `seeds[team * num_playoff_slots + seed]`
    seeds: Vec<u64>,
    rank_sum: Vec<u64>,
    half_win_sum: Vec<u64>,
    runs: u64,
    dropped: u64,
    cancelled: u64,
}

impl StandingsTally {
    pub fn new(num_teams: usize, num_playoff_slots: usize) -> Self {
        StandingsTally {
            num_playoff_slots,
            berths: vec![0; num_teams],
            seeds: vec![0; num_teams * num_playoff_slots],
            rank_sum: vec![0; num_teams],
            half_win_sum: vec![0; num_teams],
            runs: 0,
            dropped: 0,
            cancelled: 0,
        }
    }

    /// Credit one completed run.
    pub fn record(&mut self, standing: &SimulatedStanding) {
        for (pos, &team) in standing.ranked.iter().enumerate() {
            if pos < self.num_playoff_slots {
                self.berths[team] += 1;
                self.seeds[team * self.num_playoff_slots + pos] += 1;
            }
            self.rank_sum[team] += pos as u64 + 1;
            self.half_win_sum[team] += standing.half_wins[team];
        }
        self.runs += 1;
    }

    pub fn record_dropped(&mut self) {
        self.dropped += 1;
    }

    pub fn record_cancelled(&mut self) {
        self.cancelled += 1;
    }

    pub fn merge(mut self, other: StandingsTally) -> StandingsTally {
        for (a, b) in self.berths.iter_mut().zip(&other.berths) {
            *a += b;
        }
        for (a, b) in self.seeds.iter_mut().zip(&other.seeds) {
            *a += b;
        }
        for (a, b) in self.rank_sum.iter_mut().zip(&other.rank_sum) {
            *a += b;
        }
        for (a, b) in self.half_win_sum.iter_mut().zip(&other.half_win_sum) {
            *a += b;
        }
        self.runs += other.runs;
        self.dropped += other.dropped;
        self.cancelled += other.cancelled;
        self
    }

    pub fn completed_runs(&self) -> u64 {
        self.runs
    }

    pub fn dropped_runs(&self) -> u64 {
        self.dropped
    }

    pub fn cancelled_runs(&self) -> u64 {
        self.cancelled
    }

    pub fn berths(&self, team: usize) -> u64 {
        self.berths[team]
    }
}

/// Reduces simulated standings to per-team playoff probabilities.
#[derive(Clone, Debug)]
pub struct StandingsAggregator {
    teams: Vec<(String, String)>,
}

impl StandingsAggregator {
    /// Team order must match the indices used in the standings.
    pub fn new(teams: Vec<(String, String)>) -> Self {
        StandingsAggregator { teams }
    }

    pub fn for_schedule(schedule: &ScheduleModel) -> Self {
        Self::new(schedule.teams().map(|t| (t.id.clone(), t.name.clone())).collect())
    }

    pub fn aggregate(
        &self,
        standings_runs: &[SimulatedStanding],
        num_playoff_slots: usize,
    ) -> Vec<PlayoffProbabilityResult> {
        let mut tally = StandingsTally::new(self.teams.len(), num_playoff_slots);
        for standing in standings_runs {
            tally.record(standing);
        }
        self.finish(&tally)
    }

    /// Probabilities from a tally, highest playoff probability first.
    pub fn finish(&self, tally: &StandingsTally) -> Vec<PlayoffProbabilityResult> {
        let runs = tally.runs.max(1) as f64;
        let slots = tally.num_playoff_slots;
        let mut results: Vec<PlayoffProbabilityResult> = self
            .teams
            .iter()
            .enumerate()
            .map(|(i, (id, name))| {
                let seed_probabilities: Vec<f64> = tally.seeds[i * slots..(i + 1) * slots]
                    .iter()
                    .map(|&c| c as f64 / runs)
                    .collect();
                PlayoffProbabilityResult {
                    team_id: id.clone(),
                    team_name: name.clone(),
                    playoff_probability: tally.berths[i] as f64 / runs,
                    cutoff_probability: seed_probabilities.last().copied().unwrap_or(0.0),
                    seed_probabilities,
                    average_final_rank: tally.rank_sum[i] as f64 / runs,
                    average_wins: tally.half_win_sum[i] as f64 / (2.0 * runs),
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.playoff_probability
                .total_cmp(&a.playoff_probability)
                .then_with(|| {
                    a.average_final_rank
                        .partial_cmp(&b.average_final_rank)
                        .unwrap_or(Ordering::Equal)
                })
                .then_with(|| a.team_id.cmp(&b.team_id))
        });
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_aggregator() -> StandingsAggregator {
        StandingsAggregator::new(
            ["A", "B", "C"]
                .iter()
                .map(|id| (id.to_string(), format!("Team {id}")))
                .collect(),
        )
    }

    fn standing(ranked: Vec<usize>, half_wins: Vec<u64>) -> SimulatedStanding {
        SimulatedStanding { ranked, half_wins }
    }

    #[test]
    fn test_berth_counting() {
        let runs = vec![
            standing(vec![0, 1, 2], vec![6, 4, 2]),
            standing(vec![1, 0, 2], vec![4, 6, 2]),
            standing(vec![0, 2, 1], vec![6, 2, 4]),
            standing(vec![0, 1, 2], vec![5, 5, 2]),
        ];
        let results = make_aggregator().aggregate(&runs, 1);

        assert_eq!(results[0].team_id, "A");
        assert!((results[0].playoff_probability - 0.75).abs() < 1e-12);
        assert!((results[1].playoff_probability - 0.25).abs() < 1e-12);
        assert_eq!(results[2].playoff_probability, 0.0);
        assert!((results[0].average_final_rank - 1.25).abs() < 1e-12);
        assert!((results[0].average_wins - 2.625).abs() < 1e-12);

        let total: f64 = results.iter().map(|r| r.playoff_probability).sum();
        assert!((total - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_seed_and_cutoff_probabilities() {
        let runs = vec![
            standing(vec![0, 1, 2], vec![0; 3]),
            standing(vec![1, 0, 2], vec![0; 3]),
        ];
        let results = make_aggregator().aggregate(&runs, 2);
        let a = results.iter().find(|r| r.team_id == "A").unwrap();
        assert_eq!(a.seed_probabilities, vec![0.5, 0.5]);
        assert_eq!(a.cutoff_probability, 0.5);
        assert_eq!(a.playoff_probability, 1.0);

        let total: f64 = results.iter().map(|r| r.playoff_probability).sum();
        assert!((total - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let a = standing(vec![0, 1, 2], vec![6, 4, 2]);
        let b = standing(vec![2, 1, 0], vec![2, 4, 6]);

        let mut left = StandingsTally::new(3, 2);
        left.record(&a);
        let mut right = StandingsTally::new(3, 2);
        right.record(&b);
        right.record_dropped();

        let ab = left.clone().merge(right.clone());
        let ba = right.merge(left);
        assert_eq!(ab, ba);
        assert_eq!(ab.completed_runs(), 2);
        assert_eq!(ab.dropped_runs(), 1);
        assert_eq!(ab.berths(1), 2);
    }

    #[test]
    fn test_empty_batch_yields_zeroes() {
        let results = make_aggregator().aggregate(&[], 1);
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.playoff_probability == 0.0));
        // ties fall back to team id
        assert_eq!(results[0].team_id, "A");
    }
}
