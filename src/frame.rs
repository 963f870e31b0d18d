use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::event_log::{EntityId, EventRow, Venue};

/// Identity of one output row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowKey {
    pub match_id: String,
    pub entity: EntityId,
    pub opponent: EntityId,
    pub date: NaiveDate,
    pub venue: Venue,
}

impl From<&EventRow> for RowKey {
    fn from(row: &EventRow) -> Self {
        Self {
            match_id: row.match_id.clone(),
            entity: row.entity.clone(),
            opponent: row.opponent.clone(),
            date: row.date,
            venue: row.venue,
        }
    }
}

/// Columnar feature matrix, one row per (entity, event). Row order follows
/// the log: entities by id, then chronologically.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    names: Vec<String>,
    index: HashMap<String, usize>,
    keys: Vec<RowKey>,
    columns: Vec<Vec<Option<f64>>>,
}

impl FeatureFrame {
    pub fn new(names: Vec<String>, keys: Vec<RowKey>, columns: Vec<Vec<Option<f64>>>) -> Self {
        let index = names
            .iter()
            .enumerate()
            .map(|(idx, name)| (name.clone(), idx))
            .collect();
        Self {
            names,
            index,
            keys,
            columns,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.index.get(name).map(|idx| self.columns[*idx].as_slice())
    }

    pub fn column_at(&self, idx: usize) -> &[Option<f64>] {
        &self.columns[idx]
    }

    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        self.column(name).and_then(|col| col.get(row).copied().flatten())
    }

    pub fn row_of(&self, entity: &EntityId, date: NaiveDate) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| &k.entity == entity && k.date == date)
    }
}

/// A fully reconciled, dense row in registry order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub key: RowKey,
    pub values: Vec<f64>,
}
