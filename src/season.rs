use std::collections::{BTreeMap, BTreeSet};

use crate::graph::Season;

pub const PENDING_WINNER: &str = "TO_BE_UPDATED";

/// Result of a final-stage match, ordered so that the latest final wins a merge.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FinalResult {
    pub date: String,
    pub match_id: String,
    pub winner: String,
}

/// Per-file contribution to a season. Every field merges with a commutative,
/// associative operation, so deltas can be folded in any order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeasonDelta {
    pub total_runs: u64,
    pub total_wickets: u64,
    pub total_fours: u64,
    pub total_sixes: u64,
    pub matches: u32,
    pub super_over_matches: u32,
    pub duckworth_lewis_matches: u32,
    pub highest_team_score: Option<u32>,
    pub lowest_team_score: Option<u32>,
    pub teams: BTreeSet<String>,
    pub final_result: Option<FinalResult>,
}

impl SeasonDelta {
    pub fn observe_team_score(&mut self, runs: u32, eligible_for_lowest: bool) {
        self.highest_team_score = Some(self.highest_team_score.map_or(runs, |h| h.max(runs)));
        if eligible_for_lowest {
            self.lowest_team_score = min_ignoring_absent(self.lowest_team_score, Some(runs));
        }
    }

    pub fn merge(&mut self, other: &SeasonDelta) {
        self.total_runs += other.total_runs;
        self.total_wickets += other.total_wickets;
        self.total_fours += other.total_fours;
        self.total_sixes += other.total_sixes;
        self.matches += other.matches;
        self.super_over_matches += other.super_over_matches;
        self.duckworth_lewis_matches += other.duckworth_lewis_matches;
        self.highest_team_score = self.highest_team_score.max(other.highest_team_score);
        self.lowest_team_score =
            min_ignoring_absent(self.lowest_team_score, other.lowest_team_score);
        self.teams.extend(other.teams.iter().cloned());
        if other.final_result > self.final_result {
            self.final_result = other.final_result.clone();
        }
    }
}

fn min_ignoring_absent(a: Option<u32>, b: Option<u32>) -> Option<u32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeasonStats {
    pub year: String,
    pub total_runs: u64,
    pub total_wickets: u64,
    pub total_fours: u64,
    pub total_sixes: u64,
    pub matches: u32,
    pub number_of_teams: usize,
    pub highest_team_score: u32,
    pub lowest_team_score: Option<u32>,
    pub super_over_matches: u32,
    pub duckworth_lewis_matches: u32,
    pub winner: String,
}

impl SeasonStats {
    pub fn to_node(&self, format: Option<&str>) -> Season {
        Season {
            year: self.year.clone(),
            total_runs: Some(self.total_runs),
            total_wickets: Some(self.total_wickets),
            number_of_matches: Some(self.matches),
            highest_team_score: Some(self.highest_team_score),
            lowest_team_score: self.lowest_team_score,
            total_sixes: Some(self.total_sixes),
            total_fours: Some(self.total_fours),
            number_of_teams: Some(self.number_of_teams),
            winner: Some(self.winner.clone()),
            super_over_matches: Some(self.super_over_matches),
            duckworth_lewis_matches: Some(self.duckworth_lewis_matches),
            format: format.map(str::to_string),
        }
    }
}

/// Folds per-file deltas into per-season totals. Fed by a single thread after
/// all file tasks have returned.
#[derive(Debug, Default)]
pub struct SeasonAggregator {
    seasons: BTreeMap<String, SeasonDelta>,
}

impl SeasonAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(&mut self, year: &str, delta: &SeasonDelta) {
        self.seasons
            .entry(year.to_string())
            .or_default()
            .merge(delta);
    }

    pub fn years(&self) -> impl Iterator<Item = &str> {
        self.seasons.keys().map(String::as_str)
    }

    pub fn finalize(&self, year: &str) -> Option<SeasonStats> {
        let delta = self.seasons.get(year)?;
        Some(SeasonStats {
            year: year.to_string(),
            total_runs: delta.total_runs,
            total_wickets: delta.total_wickets,
            total_fours: delta.total_fours,
            total_sixes: delta.total_sixes,
            matches: delta.matches,
            number_of_teams: delta.teams.len(),
            highest_team_score: delta.highest_team_score.unwrap_or(0),
            lowest_team_score: delta.lowest_team_score,
            super_over_matches: delta.super_over_matches,
            duckworth_lewis_matches: delta.duckworth_lewis_matches,
            winner: delta
                .final_result
                .as_ref()
                .map(|f| f.winner.clone())
                .unwrap_or_else(|| PENDING_WINNER.to_string()),
        })
    }
}
