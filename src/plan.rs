use std::collections::HashMap;

use log::debug;

use crate::config::EngineConfig;
use crate::cross::CrossKind;
use crate::event_log::{EventLog, EventRow, Outcome, Venue};
use crate::stats::{Derived, StatSource};

pub const OPP_PREFIX: &str = "opp_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Agg {
    Mean,
    Std,
    Rate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreakKind {
    Win,
    Unbeaten,
    Scoring,
    CleanSheet,
}

impl StreakKind {
    pub const ALL: [StreakKind; 4] = [
        StreakKind::Win,
        StreakKind::Unbeaten,
        StreakKind::Scoring,
        StreakKind::CleanSheet,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StreakKind::Win => "win_streak",
            StreakKind::Unbeaten => "unbeaten_streak",
            StreakKind::Scoring => "scoring_streak",
            StreakKind::CleanSheet => "clean_sheet_streak",
        }
    }

    /// `None` when the row lacks the input; the streak then resets.
    pub fn holds(self, row: &EventRow) -> Option<bool> {
        match self {
            StreakKind::Win => Some(row.outcome == Outcome::Win),
            StreakKind::Unbeaten => Some(row.outcome != Outcome::Loss),
            StreakKind::Scoring => row.goals_for().map(|g| g > 0.0),
            StreakKind::CleanSheet => row.goals_against().map(|g| g == 0.0),
        }
    }

    fn is_available(self, log: &EventLog) -> bool {
        match self {
            StreakKind::Win | StreakKind::Unbeaten => true,
            StreakKind::Scoring => log.has_stat("goals_for"),
            StreakKind::CleanSheet => log.has_stat("goals_against"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum H2hStat {
    Matches,
    WinRate,
    Points,
    GoalsFor,
    GoalsAgainst,
}

impl H2hStat {
    pub const ALL: [H2hStat; 5] = [
        H2hStat::Matches,
        H2hStat::WinRate,
        H2hStat::Points,
        H2hStat::GoalsFor,
        H2hStat::GoalsAgainst,
    ];
}

/// A feature computed from one entity's own timeline.
#[derive(Debug, Clone, PartialEq)]
pub enum OwnFeature {
    IsHome,
    IsWeekend,
    RestDays,
    MatchesPlayed,
    Rolling {
        source: StatSource,
        window: usize,
        agg: Agg,
        venue: Option<Venue>,
    },
    Expanding {
        source: StatSource,
    },
    Streak(StreakKind),
    /// Prior events since the flag last fired.
    SinceLast(Derived),
    HeadToHead(H2hStat),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureKind {
    Own(OwnFeature),
    /// Opponent's value of the own feature at plan position `source`.
    Mirror { source: usize },
    Diff { own: usize, opp: usize },
    Cross { kind: CrossKind, own: usize, opp: usize },
}

/// How the registry resolves a missing value for this feature.
#[derive(Debug, Clone, PartialEq)]
pub enum FillRule {
    Zero,
    Fixed(f64),
    /// Population mean of the flag over the training log.
    PopulationRate(StatSource),
    /// No default: a missing value is a schema mismatch.
    Required,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureDef {
    pub name: String,
    pub kind: FeatureKind,
    pub fill: FillRule,
}

/// Ordered feature definitions for one run, resolved once against the
/// capabilities of the log. Own features come first, then mirrored,
/// differential and cross features.
#[derive(Debug, Clone)]
pub struct FeaturePlan {
    defs: Vec<FeatureDef>,
    index: HashMap<String, usize>,
    own_len: usize,
}

impl FeaturePlan {
    pub fn resolve(cfg: &EngineConfig, log: &EventLog) -> Self {
        let mut plan = FeaturePlan {
            defs: Vec::new(),
            index: HashMap::new(),
            own_len: 0,
        };

        plan.push_own("is_home", OwnFeature::IsHome, FillRule::Required);
        plan.push_own("is_weekend", OwnFeature::IsWeekend, FillRule::Zero);
        plan.push_own("rest_days", OwnFeature::RestDays, FillRule::Fixed(7.0));
        plan.push_own("matches_played", OwnFeature::MatchesPlayed, FillRule::Zero);

        let rolling = available(&cfg.rolling_stats, log);

        for &window in &cfg.windows {
            for source in &rolling {
                plan.push_rolling(source, window, Agg::Mean, None);
                if window >= cfg.std_min_window {
                    plan.push_rolling(source, window, Agg::Std, None);
                }
            }
        }

        for venue in Venue::ALL {
            for &window in &cfg.windows {
                for source in rolling.iter().take(cfg.venue_stat_limit) {
                    plan.push_rolling(source, window, Agg::Mean, Some(venue));
                }
            }
        }

        for source in rolling.iter().take(cfg.expanding_stat_limit) {
            plan.push_own(
                &format!("{source}_expanding_mean"),
                OwnFeature::Expanding {
                    source: source.clone(),
                },
                FillRule::Zero,
            );
        }

        let rate_groups = [
            (&cfg.rate_flags, &cfg.windows),
            (&cfg.threshold_flags, &cfg.threshold_windows),
            (&cfg.goal_count_flags, &cfg.goal_count_windows),
        ];
        for (flags, windows) in rate_groups {
            let flags = available(flags, log)
                .into_iter()
                .filter(|s| s.is_flag())
                .collect::<Vec<_>>();
            for &window in windows {
                for source in &flags {
                    plan.push_rolling(source, window, Agg::Rate, None);
                }
            }
        }

        let cards = available(&cfg.card_stats, log);
        for &window in &cfg.card_windows {
            for source in &cards {
                plan.push_rolling(source, window, Agg::Mean, None);
            }
        }

        for kind in StreakKind::ALL {
            if kind.is_available(log) {
                plan.push_own(kind.name(), OwnFeature::Streak(kind), FillRule::Zero);
            }
        }

        for flag in [Derived::Win, Derived::Loss, Derived::CleanSheet] {
            if StatSource::Derived(flag).is_available(log) {
                plan.push_own(
                    &format!("events_since_{}", flag.name()),
                    OwnFeature::SinceLast(flag),
                    FillRule::Fixed(cfg.since_cap),
                );
            }
        }

        let h = cfg.h2h_window;
        for stat in H2hStat::ALL {
            let (name, fill) = match stat {
                H2hStat::Matches => ("h2h_matches".to_string(), FillRule::Zero),
                H2hStat::WinRate => (
                    "h2h_win_rate".to_string(),
                    FillRule::PopulationRate(StatSource::Derived(Derived::Win)),
                ),
                H2hStat::Points => (format!("h2h_points_L{h}"), FillRule::Zero),
                H2hStat::GoalsFor => (format!("h2h_goals_for_L{h}"), FillRule::Zero),
                H2hStat::GoalsAgainst => (format!("h2h_goals_against_L{h}"), FillRule::Zero),
            };
            plan.push_own(&name, OwnFeature::HeadToHead(stat), fill);
        }

        plan.own_len = plan.defs.len();

        // Every opponent-side input of a diff or cross feature must be mirrored.
        let mut wanted = cfg.mirror_features.clone();
        wanted.extend(cfg.diff_pairs.iter().map(|p| p.feature.clone()));
        wanted.extend(CrossKind::ALL.iter().map(|k| k.inputs().1.to_string()));
        for name in &wanted {
            let Some(source) = plan.position(name).filter(|idx| *idx < plan.own_len) else {
                debug!("mirror input `{name}` not produced by this log; skipped");
                continue;
            };
            let fill = plan.defs[source].fill.clone();
            plan.push(
                format!("{OPP_PREFIX}{name}"),
                FeatureKind::Mirror { source },
                fill,
            );
        }

        for pair in &cfg.diff_pairs {
            let own = plan.position(&pair.feature);
            let opp = plan.position(&format!("{OPP_PREFIX}{}", pair.feature));
            let (Some(own), Some(opp)) = (own, opp) else {
                debug!("diff pair `{}` skipped: inputs unavailable", pair.label);
                continue;
            };
            plan.push(
                format!("diff_{}", pair.label),
                FeatureKind::Diff { own, opp },
                FillRule::Zero,
            );
        }

        for kind in CrossKind::ALL {
            let (own_name, opp_name) = kind.inputs();
            let own = plan.position(own_name);
            let opp = plan.position(&format!("{OPP_PREFIX}{opp_name}"));
            let (Some(own), Some(opp)) = (own, opp) else {
                debug!("cross feature `{}` skipped: inputs unavailable", kind.name());
                continue;
            };
            plan.push(
                kind.name().to_string(),
                FeatureKind::Cross { kind, own, opp },
                FillRule::Zero,
            );
        }

        plan
    }

    pub fn defs(&self) -> &[FeatureDef] {
        &self.defs
    }

    /// The contiguous own-feature prefix.
    pub fn own(&self) -> &[FeatureDef] {
        &self.defs[..self.own_len]
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.defs.iter().map(|d| d.name.clone()).collect()
    }

    fn push_own(&mut self, name: &str, feature: OwnFeature, fill: FillRule) {
        self.push(name.to_string(), FeatureKind::Own(feature), fill);
    }

    fn push_rolling(&mut self, source: &StatSource, window: usize, agg: Agg, venue: Option<Venue>) {
        let name = match (agg, venue) {
            (Agg::Mean, None) => format!("{source}_L{window}_mean"),
            (Agg::Mean, Some(v)) => format!("{source}_{}_L{window}_mean", v.label()),
            (Agg::Std, None) => format!("{source}_L{window}_std"),
            (Agg::Std, Some(v)) => format!("{source}_{}_L{window}_std", v.label()),
            (Agg::Rate, None) => format!("{source}_rate_L{window}"),
            (Agg::Rate, Some(v)) => format!("{source}_{}_rate_L{window}", v.label()),
        };
        let fill = if agg == Agg::Rate {
            FillRule::PopulationRate(source.clone())
        } else {
            FillRule::Zero
        };
        self.push_own(
            &name,
            OwnFeature::Rolling {
                source: source.clone(),
                window,
                agg,
                venue,
            },
            fill,
        );
    }

    /// First registration of a name wins.
    fn push(&mut self, name: String, kind: FeatureKind, fill: FillRule) {
        if self.index.contains_key(&name) {
            return;
        }
        self.index.insert(name.clone(), self.defs.len());
        self.defs.push(FeatureDef { name, kind, fill });
    }
}

fn available(names: &[String], log: &EventLog) -> Vec<StatSource> {
    let mut out = Vec::new();
    for name in names {
        let source = StatSource::named(name);
        if source.is_available(log) {
            if !out.contains(&source) {
                out.push(source);
            }
        } else {
            debug!("stat `{name}` absent from log; features skipped");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::PairedEvent;
    use chrono::NaiveDate;

    fn small_log(with_xg: bool) -> EventLog {
        let d = |day| NaiveDate::from_ymd_opt(2024, 2, day).unwrap();
        let mut a = PairedEvent::new("m1", d(3), "A", "B", 1, 0).with_stat("shots", 9.0, 4.0);
        let mut b = PairedEvent::new("m2", d(10), "B", "A", 2, 2).with_stat("shots", 11.0, 7.0);
        if with_xg {
            a = a.with_stat("xg_for", 1.2, 0.4).with_stat("xg_against", 0.4, 1.2);
            b = b.with_stat("xg_for", 1.9, 1.1).with_stat("xg_against", 1.1, 1.9);
        }
        EventLog::from_paired(&[a, b]).unwrap()
    }

    #[test]
    fn absent_stats_are_skipped_not_errors() {
        let plan = FeaturePlan::resolve(&EngineConfig::default(), &small_log(false));
        assert!(plan.position("shots_L5_mean").is_some());
        assert!(plan.position("xg_for_L5_mean").is_none());
        assert!(plan.position("corners_L3_mean").is_none());
        assert!(plan.position("diff_xg_for").is_none());
        assert!(plan.position("diff_points").is_some());
    }

    #[test]
    fn std_only_for_wide_windows() {
        let plan = FeaturePlan::resolve(&EngineConfig::default(), &small_log(true));
        assert!(plan.position("goals_for_L3_std").is_none());
        assert!(plan.position("goals_for_L5_std").is_some());
        assert!(plan.position("xg_for_L10_std").is_some());
    }

    #[test]
    fn own_features_precede_derived_columns() {
        let plan = FeaturePlan::resolve(&EngineConfig::default(), &small_log(true));
        let own = plan.own().len();
        assert!(plan.defs()[..own].iter().all(|d| matches!(d.kind, FeatureKind::Own(_))));
        assert!(plan.defs()[own..].iter().all(|d| !matches!(d.kind, FeatureKind::Own(_))));
        let mirror = plan.position("opp_win_rate_L5").unwrap();
        assert!(mirror >= own);
        assert!(plan.position("btts_index_L5").is_some());
    }

    #[test]
    fn names_are_unique_and_ordered_deterministically() {
        let log = small_log(true);
        let a = FeaturePlan::resolve(&EngineConfig::default(), &log).names();
        let b = FeaturePlan::resolve(&EngineConfig::default(), &log).names();
        assert_eq!(a, b);
        let mut dedup = a.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(dedup.len(), a.len());
        assert_eq!(a[0], "is_home");
    }
}
