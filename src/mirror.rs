//! Opponent alignment. For row (A, t, opponent B) the mirrored value of a
//! feature is B's own value at (B, t), which was itself computed from B's
//! events strictly before t.

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use log::{debug, warn};

use crate::event_log::EntityId;
use crate::frame::RowKey;

/// Row index of the opponent's perspective for every row, built once per run.
#[derive(Debug, Clone)]
pub struct OpponentIndex {
    opponent_rows: Vec<Option<usize>>,
    inconsistent: usize,
}

impl OpponentIndex {
    /// Rows whose opponent has no timeline in `keys` (the historical rows of
    /// an inference run) are left unmatched without complaint. Only rows whose
    /// opponent is present but disagrees are reported.
    pub fn build(keys: &[RowKey]) -> Self {
        let by_entity_date: HashMap<(&EntityId, NaiveDate), usize> = keys
            .iter()
            .enumerate()
            .map(|(idx, k)| ((&k.entity, k.date), idx))
            .collect();
        let present: HashSet<&EntityId> = keys.iter().map(|k| &k.entity).collect();

        let mut inconsistent = 0usize;
        let mut absent = 0usize;
        let opponent_rows = keys
            .iter()
            .map(|k| {
                let found = by_entity_date
                    .get(&(&k.opponent, k.date))
                    .copied()
                    .filter(|idx| keys[*idx].opponent == k.entity);
                if found.is_none() {
                    if present.contains(&k.opponent) {
                        inconsistent += 1;
                    } else {
                        absent += 1;
                    }
                }
                found
            })
            .collect();

        if inconsistent > 0 {
            warn!(
                "{inconsistent} rows have no matching opponent row; mirrored features left missing"
            );
        }
        if absent > 0 {
            debug!("{absent} rows face opponents outside this run");
        }
        Self {
            opponent_rows,
            inconsistent,
        }
    }

    /// Rows whose opponent timeline is loaded but holds no matching row.
    pub fn inconsistent(&self) -> usize {
        self.inconsistent
    }

    pub fn opponent_row(&self, row: usize) -> Option<usize> {
        self.opponent_rows.get(row).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.opponent_rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opponent_rows.is_empty()
    }

    /// Opponent's value of `source` for every row.
    pub fn mirror(&self, source: &[Option<f64>]) -> Vec<Option<f64>> {
        self.opponent_rows
            .iter()
            .map(|opp| opp.and_then(|idx| source.get(idx).copied().flatten()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::Venue;

    fn key(entity: &str, opponent: &str, day: u32) -> RowKey {
        RowKey {
            match_id: format!("{entity}-{opponent}-{day}"),
            entity: entity.into(),
            opponent: opponent.into(),
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            venue: Venue::Home,
        }
    }

    #[test]
    fn mirror_reads_opponent_row_on_same_date() {
        let keys = vec![key("A", "B", 1), key("A", "C", 8), key("B", "A", 1), key("C", "A", 8)];
        let idx = OpponentIndex::build(&keys);
        assert_eq!(idx.opponent_row(0), Some(2));
        assert_eq!(idx.opponent_row(3), Some(1));
        let col = vec![Some(1.0), Some(2.0), Some(0.25), None];
        assert_eq!(idx.mirror(&col), vec![Some(0.25), None, Some(1.0), Some(2.0)]);
    }

    #[test]
    fn inconsistent_opponent_is_left_missing() {
        let keys = vec![key("A", "B", 1), key("B", "C", 1)];
        let idx = OpponentIndex::build(&keys);
        assert_eq!(idx.opponent_row(0), None);
        assert_eq!(idx.mirror(&[Some(1.0), Some(2.0)]), vec![None, None]);
        // B is loaded but disagrees; C is simply not part of the run.
        assert_eq!(idx.inconsistent(), 1);
    }

    #[test]
    fn opponents_outside_the_run_are_not_inconsistent() {
        // An inference run: two timelines, history against other teams.
        let keys = vec![
            key("A", "C", 1),
            key("A", "B", 8),
            key("B", "D", 1),
            key("B", "A", 8),
        ];
        let idx = OpponentIndex::build(&keys);
        assert_eq!(idx.opponent_row(1), Some(3));
        assert_eq!(idx.opponent_row(3), Some(1));
        assert_eq!(idx.opponent_row(0), None);
        assert_eq!(idx.inconsistent(), 0);
    }
}
