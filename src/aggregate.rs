//! As-of aggregation over one entity timeline.
//!
//! Every output at position `i` is built from rows `0..i` only. Each feature
//! is a single forward pass: the value for row `i` is read from the
//! accumulator *before* row `i` is folded into it, and every read checks that
//! the newest input is dated strictly before the row being featurized.

use std::collections::{HashMap, VecDeque};

use chrono::{Datelike, NaiveDate, Weekday};

use crate::config::{EngineConfig, MinPeriods};
use crate::error::{FeatureError, Result};
use crate::event_log::{EntityId, EntityTimeline, EventRow, Outcome, Venue};
use crate::plan::{Agg, FeatureDef, FeatureKind, H2hStat, OwnFeature, StreakKind};
use crate::stats::{Derived, StatSource};

pub type Column = Vec<Option<f64>>;

/// Own-feature columns of one entity, `columns[feature][row]`.
#[derive(Debug, Clone)]
pub struct EntityBlock {
    pub columns: Vec<Column>,
}

pub fn aggregate_timeline(
    timeline: &EntityTimeline,
    own: &[FeatureDef],
    cfg: &EngineConfig,
) -> Result<EntityBlock> {
    let rows = timeline.rows();
    let entity = timeline.entity();
    let mut series: HashMap<StatSource, Column> = HashMap::new();
    let mut h2h: Option<HashMap<H2hStat, Column>> = None;
    let mut columns = Vec::with_capacity(own.len());

    for def in own {
        let FeatureKind::Own(feature) = &def.kind else {
            continue;
        };
        let column = match feature {
            OwnFeature::IsHome => rows
                .iter()
                .map(|r| Some(if r.venue == Venue::Home { 1.0 } else { 0.0 }))
                .collect(),
            OwnFeature::IsWeekend => rows
                .iter()
                .map(|r| {
                    let weekend = matches!(r.date.weekday(), Weekday::Sat | Weekday::Sun);
                    Some(if weekend { 1.0 } else { 0.0 })
                })
                .collect(),
            OwnFeature::RestDays => rest_days(entity, rows)?,
            OwnFeature::MatchesPlayed => (0..rows.len()).map(|i| Some(i as f64)).collect(),
            OwnFeature::Rolling {
                source,
                window,
                agg,
                venue,
            } => {
                let values = series
                    .entry(source.clone())
                    .or_insert_with(|| source.series(rows));
                rolling(entity, rows, values, *window, *agg, *venue, cfg.min_periods)?
            }
            OwnFeature::Expanding { source } => {
                let values = series
                    .entry(source.clone())
                    .or_insert_with(|| source.series(rows));
                expanding_mean(entity, rows, values, cfg.min_periods.mean)?
            }
            OwnFeature::Streak(kind) => streak(entity, rows, *kind)?,
            OwnFeature::SinceLast(flag) => events_since(entity, rows, *flag, cfg.since_cap)?,
            OwnFeature::HeadToHead(stat) => {
                if h2h.is_none() {
                    h2h = Some(head_to_head(entity, rows, cfg.h2h_window)?);
                }
                h2h.as_ref()
                    .and_then(|cols| cols.get(stat))
                    .cloned()
                    .unwrap_or_else(|| vec![None; rows.len()])
            }
        };
        columns.push(column);
    }

    Ok(EntityBlock { columns })
}

fn ensure_causal(entity: &EntityId, input_date: NaiveDate, row_date: NaiveDate) -> Result<()> {
    if input_date < row_date {
        Ok(())
    } else {
        Err(FeatureError::CausalityViolation {
            entity: entity.clone(),
            row_date,
            input_date,
        })
    }
}

/// Aggregate over the last `window` prior events (optionally only those
/// played at `venue`). Missing values inside the window do not count toward
/// the minimum-periods threshold.
pub fn rolling(
    entity: &EntityId,
    rows: &[EventRow],
    values: &[Option<f64>],
    window: usize,
    agg: Agg,
    venue: Option<Venue>,
    min_periods: MinPeriods,
) -> Result<Column> {
    let mut buf: VecDeque<(NaiveDate, Option<f64>)> =
        VecDeque::with_capacity(window.min(rows.len()) + 1);
    let mut out = Vec::with_capacity(rows.len());

    for (row, value) in rows.iter().zip(values) {
        if let Some((newest, _)) = buf.back() {
            ensure_causal(entity, *newest, row.date)?;
        }
        out.push(window_value(&buf, agg, min_periods));

        if venue.is_none_or(|v| v == row.venue) {
            buf.push_back((row.date, *value));
            if buf.len() > window {
                buf.pop_front();
            }
        }
    }
    Ok(out)
}

fn window_value(
    buf: &VecDeque<(NaiveDate, Option<f64>)>,
    agg: Agg,
    min_periods: MinPeriods,
) -> Option<f64> {
    let present = buf.iter().filter_map(|(_, v)| *v);
    let (mut n, mut sum) = (0usize, 0.0);
    for v in present.clone() {
        n += 1;
        sum += v;
    }
    match agg {
        Agg::Mean | Agg::Rate => {
            let min = if agg == Agg::Mean {
                min_periods.mean
            } else {
                min_periods.rate
            };
            (n >= min).then(|| sum / n as f64)
        }
        Agg::Std => {
            if n < min_periods.std {
                return None;
            }
            let mean = sum / n as f64;
            let ss = present.map(|v| (v - mean).powi(2)).sum::<f64>();
            Some((ss / (n - 1) as f64).sqrt())
        }
    }
}

pub fn expanding_mean(
    entity: &EntityId,
    rows: &[EventRow],
    values: &[Option<f64>],
    min_periods: usize,
) -> Result<Column> {
    let mut sum = 0.0;
    let mut n = 0usize;
    let mut last: Option<NaiveDate> = None;
    let mut out = Vec::with_capacity(rows.len());
    for (row, value) in rows.iter().zip(values) {
        if let Some(prev) = last {
            ensure_causal(entity, prev, row.date)?;
        }
        out.push((n >= min_periods).then(|| sum / n as f64));
        if let Some(v) = value {
            sum += v;
            n += 1;
        }
        last = Some(row.date);
    }
    Ok(out)
}

/// Length of the run of `kind` ending at the previous event.
pub fn streak(entity: &EntityId, rows: &[EventRow], kind: StreakKind) -> Result<Column> {
    let mut run = 0usize;
    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            ensure_causal(entity, rows[i - 1].date, row.date)?;
        }
        out.push(Some(run as f64));
        run = match kind.holds(row) {
            Some(true) => run + 1,
            _ => 0,
        };
    }
    Ok(out)
}

/// Prior events played since `flag` last fired, clamped to `cap`; 0 when the
/// previous event fired it, missing when it never has. `cap` is also the fill
/// value for the missing case.
pub fn events_since(
    entity: &EntityId,
    rows: &[EventRow],
    flag: Derived,
    cap: f64,
) -> Result<Column> {
    let mut since: Option<usize> = None;
    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            ensure_causal(entity, rows[i - 1].date, row.date)?;
        }
        out.push(since.map(|k| (k as f64).min(cap)));
        since = match flag.eval(row) {
            Some(v) if v > 0.0 => Some(0),
            _ => since.map(|k| k + 1),
        };
    }
    Ok(out)
}

pub fn rest_days(entity: &EntityId, rows: &[EventRow]) -> Result<Column> {
    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.iter().enumerate() {
        if i == 0 {
            out.push(None);
            continue;
        }
        let prev = rows[i - 1].date;
        ensure_causal(entity, prev, row.date)?;
        out.push(Some((row.date - prev).num_days() as f64));
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct H2hAcc {
    matches: usize,
    wins: usize,
    recent: VecDeque<(NaiveDate, f64, Option<f64>, Option<f64>)>,
}

/// Meetings with the current opponent, from this entity's side. One pass with
/// a per-opponent accumulator.
fn head_to_head(
    entity: &EntityId,
    rows: &[EventRow],
    window: usize,
) -> Result<HashMap<H2hStat, Column>> {
    let mut accs: HashMap<&EntityId, H2hAcc> = HashMap::new();
    let mut cols: HashMap<H2hStat, Column> = H2hStat::ALL
        .iter()
        .map(|s| (*s, Vec::with_capacity(rows.len())))
        .collect();
    let mut push = |stat: H2hStat, v: Option<f64>| {
        if let Some(col) = cols.get_mut(&stat) {
            col.push(v);
        }
    };

    for row in rows {
        let acc = accs.entry(&row.opponent).or_default();
        if let Some((newest, ..)) = acc.recent.back() {
            ensure_causal(entity, *newest, row.date)?;
        }

        push(H2hStat::Matches, Some(acc.matches as f64));
        push(
            H2hStat::WinRate,
            (acc.matches > 0).then(|| acc.wins as f64 / acc.matches as f64),
        );
        push(H2hStat::Points, mean(acc.recent.iter().map(|e| Some(e.1))));
        push(H2hStat::GoalsFor, mean(acc.recent.iter().map(|e| e.2)));
        push(H2hStat::GoalsAgainst, mean(acc.recent.iter().map(|e| e.3)));

        acc.matches += 1;
        if row.outcome == Outcome::Win {
            acc.wins += 1;
        }
        acc.recent.push_back((
            row.date,
            row.outcome.points(),
            row.goals_for(),
            row.goals_against(),
        ));
        if acc.recent.len() > window {
            acc.recent.pop_front();
        }
    }
    Ok(cols)
}

fn mean(values: impl Iterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .flatten()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}
