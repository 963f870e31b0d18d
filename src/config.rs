use std::env;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

const ROLLING_STATS: &[&str] = &[
    "points",
    "goals_for",
    "goals_against",
    "goal_diff",
    "xg_for",
    "xg_against",
    "xg_diff",
    "shots",
    "shots_on_target",
    "possession",
    "corners",
    "fouls",
    "sca",
    "gca",
    "passes",
    "passes_completed_pct",
    "progressive_passes",
    "carries",
    "tackles",
    "interceptions",
    "aerials_won",
    "clearances",
    "blocked_shots",
    "shot_accuracy",
    "shots_conversion",
    "goals_vs_xg",
];

const RATE_FLAGS: &[&str] = &[
    "win",
    "draw",
    "loss",
    "clean_sheet",
    "failed_to_score",
    "both_scored",
];

const THRESHOLD_FLAGS: &[&str] = &["over_0_5", "over_1_5", "over_2_5", "over_3_5", "both_scored"];

const GOAL_COUNT_FLAGS: &[&str] = &["scored_exactly_0", "scored_exactly_1", "scored_exactly_2"];

const CARD_STATS: &[&str] = &[
    "cards_yellow",
    "cards_red",
    "cards_yellow_against",
    "cards_red_against",
    "total_cards",
];

const MIRROR_FEATURES: &[&str] = &[
    "win_rate_L5",
    "draw_rate_L5",
    "clean_sheet_rate_L5",
    "failed_to_score_rate_L5",
    "points_L5_mean",
    "goals_for_L5_mean",
    "goals_against_L5_mean",
    "points_expanding_mean",
    "goals_for_expanding_mean",
    "goals_against_expanding_mean",
    "xg_for_expanding_mean",
    "xg_against_expanding_mean",
    "win_streak",
    "unbeaten_streak",
    "matches_played",
    "rest_days",
];

const DIFF_PAIRS: &[(&str, &str)] = &[
    ("points", "points_expanding_mean"),
    ("goals_for", "goals_for_expanding_mean"),
    ("goals_against", "goals_against_expanding_mean"),
    ("xg_for", "xg_for_expanding_mean"),
    ("xg_against", "xg_against_expanding_mean"),
    ("win_rate_L5", "win_rate_L5"),
    ("rest_days", "rest_days"),
];

/// Minimum number of non-missing prior values before an aggregate is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinPeriods {
    pub mean: usize,
    pub std: usize,
    pub rate: usize,
}

impl Default for MinPeriods {
    fn default() -> Self {
        Self {
            mean: 1,
            std: 2,
            rate: 1,
        }
    }
}

/// `diff_<label>` = own `feature` minus `opp_<feature>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPair {
    pub label: String,
    pub feature: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trailing window sizes for rolling means and outcome rates.
    pub windows: Vec<usize>,
    /// Standard deviations are only produced for windows at least this wide.
    pub std_min_window: usize,
    pub min_periods: MinPeriods,
    /// Candidate stats; those absent from the log are skipped.
    pub rolling_stats: Vec<String>,
    /// Venue-split means use the first N available rolling stats.
    pub venue_stat_limit: usize,
    /// Expanding means use the first N available rolling stats.
    pub expanding_stat_limit: usize,
    pub rate_flags: Vec<String>,
    pub threshold_flags: Vec<String>,
    pub threshold_windows: Vec<usize>,
    pub goal_count_flags: Vec<String>,
    pub goal_count_windows: Vec<usize>,
    pub card_stats: Vec<String>,
    pub card_windows: Vec<usize>,
    /// Fill value for events-since-last counters that never fired.
    pub since_cap: f64,
    pub h2h_window: usize,
    pub mirror_features: Vec<String>,
    pub diff_pairs: Vec<DiffPair>,
    /// Worker threads for the per-entity stage; 0 uses the rayon default.
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            windows: vec![3, 5, 10],
            std_min_window: 5,
            min_periods: MinPeriods::default(),
            rolling_stats: owned(ROLLING_STATS),
            venue_stat_limit: 8,
            expanding_stat_limit: 12,
            rate_flags: owned(RATE_FLAGS),
            threshold_flags: owned(THRESHOLD_FLAGS),
            threshold_windows: vec![5, 10],
            goal_count_flags: owned(GOAL_COUNT_FLAGS),
            goal_count_windows: vec![10],
            card_stats: owned(CARD_STATS),
            card_windows: vec![5, 10],
            since_cap: 10.0,
            h2h_window: 5,
            mirror_features: owned(MIRROR_FEATURES),
            diff_pairs: DIFF_PAIRS
                .iter()
                .map(|(label, feature)| DiffPair {
                    label: label.to_string(),
                    feature: feature.to_string(),
                })
                .collect(),
            parallelism: 0,
        }
    }
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let cfg: EngineConfig = serde_json::from_str(&raw)?;
        Ok(cfg.normalized())
    }

    /// `FEATURE_WINDOWS=3,5,10` and `FEATURE_PARALLELISM=8` take precedence
    /// over file or default values.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(windows) = env::var("FEATURE_WINDOWS")
            .ok()
            .and_then(|raw| parse_usize_list(&raw))
        {
            self.windows = windows;
        }
        if let Some(threads) = env::var("FEATURE_PARALLELISM")
            .ok()
            .and_then(|val| val.trim().parse::<usize>().ok())
        {
            self.parallelism = threads.min(64);
        }
        self.normalized()
    }

    /// Sorted, deduplicated, non-zero window lists.
    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.windows,
            &mut self.threshold_windows,
            &mut self.goal_count_windows,
            &mut self.card_windows,
        ] {
            list.retain(|w| *w > 0);
            list.sort_unstable();
            list.dedup();
        }
        self.min_periods.mean = self.min_periods.mean.max(1);
        self.min_periods.rate = self.min_periods.rate.max(1);
        self.min_periods.std = self.min_periods.std.max(2);
        self.h2h_window = self.h2h_window.max(1);
        self.since_cap = self.since_cap.max(0.0);
        self
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn parse_usize_list(raw: &str) -> Option<Vec<usize>> {
    let out = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<usize>().ok())
        .collect::<Vec<_>>();
    if out.is_empty() { None } else { Some(out) }
}
