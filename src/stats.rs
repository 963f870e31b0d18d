use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::event_log::{EventLog, EventRow, Outcome};

/// Values computed from a single row. Never stored, never a feature on their own:
/// they only feed the aggregators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Derived {
    Points,
    GoalDiff,
    XgDiff,
    TotalGoals,
    ShotAccuracy,
    ShotsConversion,
    GoalsVsXg,
    TotalCards,
    Win,
    Draw,
    Loss,
    CleanSheet,
    FailedToScore,
    BothScored,
    /// Total goals above `n + 0.5`.
    Over(u8),
    ScoredExactly(u8),
}

const DERIVED_ALL: [Derived; 22] = [
    Derived::Points,
    Derived::GoalDiff,
    Derived::XgDiff,
    Derived::TotalGoals,
    Derived::ShotAccuracy,
    Derived::ShotsConversion,
    Derived::GoalsVsXg,
    Derived::TotalCards,
    Derived::Win,
    Derived::Draw,
    Derived::Loss,
    Derived::CleanSheet,
    Derived::FailedToScore,
    Derived::BothScored,
    Derived::Over(0),
    Derived::Over(1),
    Derived::Over(2),
    Derived::Over(3),
    Derived::ScoredExactly(0),
    Derived::ScoredExactly(1),
    Derived::ScoredExactly(2),
    Derived::ScoredExactly(3),
];

static DERIVED_BY_NAME: OnceCell<HashMap<String, Derived>> = OnceCell::new();

fn derived_by_name() -> &'static HashMap<String, Derived> {
    DERIVED_BY_NAME.get_or_init(|| DERIVED_ALL.iter().map(|d| (d.name(), *d)).collect())
}

const GOALS: &[&str] = &["goals_for", "goals_against"];

impl Derived {
    pub fn name(self) -> String {
        match self {
            Derived::Points => "points".to_string(),
            Derived::GoalDiff => "goal_diff".to_string(),
            Derived::XgDiff => "xg_diff".to_string(),
            Derived::TotalGoals => "total_goals".to_string(),
            Derived::ShotAccuracy => "shot_accuracy".to_string(),
            Derived::ShotsConversion => "shots_conversion".to_string(),
            Derived::GoalsVsXg => "goals_vs_xg".to_string(),
            Derived::TotalCards => "total_cards".to_string(),
            Derived::Win => "win".to_string(),
            Derived::Draw => "draw".to_string(),
            Derived::Loss => "loss".to_string(),
            Derived::CleanSheet => "clean_sheet".to_string(),
            Derived::FailedToScore => "failed_to_score".to_string(),
            Derived::BothScored => "both_scored".to_string(),
            Derived::Over(n) => format!("over_{n}_5"),
            Derived::ScoredExactly(n) => format!("scored_exactly_{n}"),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        derived_by_name().get(name).copied()
    }

    /// Raw stats that must exist in the log for this value to be computable.
    pub fn requires(self) -> &'static [&'static str] {
        match self {
            Derived::Points | Derived::Win | Derived::Draw | Derived::Loss => &[],
            Derived::GoalDiff
            | Derived::TotalGoals
            | Derived::CleanSheet
            | Derived::FailedToScore
            | Derived::BothScored
            | Derived::Over(_)
            | Derived::ScoredExactly(_) => GOALS,
            Derived::XgDiff => &["xg_for", "xg_against"],
            Derived::ShotAccuracy => &["shots_on_target", "shots"],
            Derived::ShotsConversion => &["goals_for", "shots"],
            Derived::GoalsVsXg => &["goals_for", "xg_for"],
            Derived::TotalCards => &["cards_yellow", "cards_red"],
        }
    }

    pub fn is_flag(self) -> bool {
        matches!(
            self,
            Derived::Win
                | Derived::Draw
                | Derived::Loss
                | Derived::CleanSheet
                | Derived::FailedToScore
                | Derived::BothScored
                | Derived::Over(_)
                | Derived::ScoredExactly(_)
        )
    }

    pub fn eval(self, row: &EventRow) -> Option<f64> {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        match self {
            Derived::Points => Some(row.outcome.points()),
            Derived::Win => Some(flag(row.outcome == Outcome::Win)),
            Derived::Draw => Some(flag(row.outcome == Outcome::Draw)),
            Derived::Loss => Some(flag(row.outcome == Outcome::Loss)),
            Derived::GoalDiff => Some(row.goals_for()? - row.goals_against()?),
            Derived::TotalGoals => Some(row.goals_for()? + row.goals_against()?),
            Derived::XgDiff => Some(row.stat("xg_for")? - row.stat("xg_against")?),
            Derived::ShotAccuracy => {
                Some(row.stat("shots_on_target")? / (row.stat("shots")? + 0.01))
            }
            Derived::ShotsConversion => Some(row.goals_for()? / (row.stat("shots")? + 0.01)),
            Derived::GoalsVsXg => Some(row.goals_for()? - row.stat("xg_for")?),
            Derived::TotalCards => Some(row.stat("cards_yellow")? + row.stat("cards_red")?),
            Derived::CleanSheet => Some(flag(row.goals_against()? == 0.0)),
            Derived::FailedToScore => Some(flag(row.goals_for()? == 0.0)),
            Derived::BothScored => Some(flag(row.goals_for()? > 0.0 && row.goals_against()? > 0.0)),
            Derived::Over(n) => {
                let total = row.goals_for()? + row.goals_against()?;
                Some(flag(total > n as f64 + 0.5))
            }
            Derived::ScoredExactly(n) => Some(flag(row.goals_for()? == n as f64)),
        }
    }
}

/// Where an aggregator reads its per-row input from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StatSource {
    Raw(String),
    Derived(Derived),
}

impl StatSource {
    pub fn named(name: &str) -> Self {
        match Derived::from_name(name) {
            Some(d) => StatSource::Derived(d),
            None => StatSource::Raw(name.to_string()),
        }
    }

    pub fn name(&self) -> String {
        match self {
            StatSource::Raw(name) => name.clone(),
            StatSource::Derived(d) => d.name(),
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, StatSource::Derived(d) if d.is_flag())
    }

    pub fn is_available(&self, log: &EventLog) -> bool {
        match self {
            StatSource::Raw(name) => log.has_stat(name),
            StatSource::Derived(d) => d.requires().iter().all(|name| log.has_stat(name)),
        }
    }

    pub fn value(&self, row: &EventRow) -> Option<f64> {
        match self {
            StatSource::Raw(name) => row.stat(name),
            StatSource::Derived(d) => d.eval(row).filter(|v| v.is_finite()),
        }
    }

    pub fn series(&self, rows: &[EventRow]) -> Vec<Option<f64>> {
        rows.iter().map(|row| self.value(row)).collect()
    }

    /// Mean of the value over every row of the log; the population baseline.
    pub fn population_mean(&self, log: &EventLog) -> Option<f64> {
        let mut sum = 0.0;
        let mut n = 0usize;
        for row in log.rows() {
            if let Some(v) = self.value(row) {
                sum += v;
                n += 1;
            }
        }
        (n > 0).then(|| sum / n as f64)
    }
}

impl fmt::Display for StatSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::PairedEvent;
    use chrono::NaiveDate;

    fn row(hg: u32, ag: u32) -> EventRow {
        let date = NaiveDate::from_ymd_opt(2024, 1, 6).unwrap();
        let [home, _] = PairedEvent::new("m", date, "A", "B", hg, ag)
            .with_stat("shots", 10.0, 4.0)
            .with_stat("shots_on_target", 5.0, 1.0)
            .to_rows();
        home
    }

    #[test]
    fn names_round_trip_through_catalog() {
        for d in DERIVED_ALL {
            assert_eq!(Derived::from_name(&d.name()), Some(d));
        }
        assert_eq!(StatSource::named("corners"), StatSource::Raw("corners".into()));
        assert_eq!(StatSource::named("over_2_5"), StatSource::Derived(Derived::Over(2)));
    }

    #[test]
    fn derived_values_follow_row() {
        let r = row(2, 1);
        assert_eq!(Derived::Points.eval(&r), Some(3.0));
        assert_eq!(Derived::GoalDiff.eval(&r), Some(1.0));
        assert_eq!(Derived::BothScored.eval(&r), Some(1.0));
        assert_eq!(Derived::Over(2).eval(&r), Some(1.0));
        assert_eq!(Derived::Over(3).eval(&r), Some(0.0));
        assert_eq!(Derived::ScoredExactly(2).eval(&r), Some(1.0));
        let acc = Derived::ShotAccuracy.eval(&r).unwrap();
        assert!((acc - 5.0 / 10.01).abs() < 1e-12);
        assert_eq!(Derived::XgDiff.eval(&r), None);
    }

    #[test]
    fn clean_sheet_and_failed_to_score() {
        let r = row(0, 0);
        assert_eq!(Derived::CleanSheet.eval(&r), Some(1.0));
        assert_eq!(Derived::FailedToScore.eval(&r), Some(1.0));
        assert_eq!(Derived::Draw.eval(&r), Some(1.0));
    }
}
