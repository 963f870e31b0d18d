//! Feature schema registry. The training run fixes the ordered list of names
//! and a fill default per name; inference reuses that artifact so both sides
//! emit identical columns.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{FeatureError, Result};
use crate::event_log::EventLog;
use crate::frame::{FeatureFrame, FeatureRow};
use crate::plan::{FeaturePlan, FillRule};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum FillDefault {
    Value(f64),
    /// No substitute exists; a missing value is an error.
    Required,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEntry {
    pub name: String,
    pub default: FillDefault,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// SHA-256 of the ordered names, newline separated.
    pub fingerprint: String,
    pub features: Vec<FeatureEntry>,
}

impl FeatureSchema {
    /// Register every planned feature in plan order, resolving fill defaults
    /// against the training log.
    pub fn register(plan: &FeaturePlan, log: &EventLog) -> Self {
        let features = plan
            .defs()
            .iter()
            .map(|def| {
                let default = match &def.fill {
                    FillRule::Zero => FillDefault::Value(0.0),
                    FillRule::Fixed(v) => FillDefault::Value(*v),
                    FillRule::PopulationRate(source) => {
                        FillDefault::Value(source.population_mean(log).unwrap_or(0.0))
                    }
                    FillRule::Required => FillDefault::Required,
                };
                FeatureEntry {
                    name: def.name.clone(),
                    default,
                }
            })
            .collect::<Vec<_>>();
        let fingerprint = fingerprint(features.iter().map(|f| f.name.as_str()));
        Self {
            version: SCHEMA_VERSION,
            created_at: Utc::now(),
            fingerprint,
            features,
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name == name)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        info!("schema with {} features saved to {}", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let schema: FeatureSchema = serde_json::from_str(&raw)?;
        if schema.version != SCHEMA_VERSION {
            return Err(FeatureError::SchemaCorrupt(format!(
                "version {} (expected {SCHEMA_VERSION})",
                schema.version
            )));
        }
        let expected = fingerprint(schema.features.iter().map(|f| f.name.as_str()));
        if expected != schema.fingerprint {
            return Err(FeatureError::SchemaCorrupt(
                "fingerprint does not match feature names".to_string(),
            ));
        }
        Ok(schema)
    }

    /// Every frame row projected onto the schema.
    pub fn reconcile(&self, frame: &FeatureFrame) -> Result<Vec<FeatureRow>> {
        let columns = self.align(frame);
        (0..frame.len())
            .map(|row| self.fill_row(frame, &columns, row))
            .collect()
    }

    /// One frame row projected onto the schema.
    pub fn reconcile_row(&self, frame: &FeatureFrame, row: usize) -> Result<FeatureRow> {
        let columns = self.align(frame);
        self.fill_row(frame, &columns, row)
    }

    /// Frame column index for each schema entry; warns about names present
    /// on only one side.
    fn align(&self, frame: &FeatureFrame) -> Vec<Option<usize>> {
        let columns = self
            .features
            .iter()
            .map(|f| frame.position(&f.name))
            .collect::<Vec<_>>();

        let missing = self
            .features
            .iter()
            .zip(&columns)
            .filter(|(_, col)| col.is_none())
            .map(|(f, _)| f.name.as_str())
            .collect::<Vec<_>>();
        if !missing.is_empty() {
            warn!(
                "{} schema features absent from frame, filled with defaults: {}",
                missing.len(),
                preview(&missing)
            );
        }

        let known = self
            .features
            .iter()
            .map(|f| f.name.as_str())
            .collect::<HashSet<_>>();
        let extra = frame
            .names()
            .iter()
            .map(String::as_str)
            .filter(|n| !known.contains(n))
            .collect::<Vec<_>>();
        if !extra.is_empty() {
            warn!(
                "{} frame features not in schema, dropped: {}",
                extra.len(),
                preview(&extra)
            );
        }
        columns
    }

    fn fill_row(
        &self,
        frame: &FeatureFrame,
        columns: &[Option<usize>],
        row: usize,
    ) -> Result<FeatureRow> {
        let key = frame.keys()[row].clone();
        let mut values = Vec::with_capacity(self.features.len());
        for (entry, col) in self.features.iter().zip(columns) {
            let value = col
                .and_then(|idx| frame.column_at(idx).get(row).copied().flatten())
                .filter(|v| v.is_finite());
            let value = match (value, entry.default) {
                (Some(v), _) => v,
                (None, FillDefault::Value(d)) => d,
                (None, FillDefault::Required) => {
                    return Err(FeatureError::SchemaMismatch {
                        feature: entry.name.clone(),
                        entity: key.entity.clone(),
                        date: key.date,
                    });
                }
            };
            values.push(value);
        }
        Ok(FeatureRow { key, values })
    }
}

fn fingerprint<'a>(names: impl Iterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for (i, name) in names.enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(name.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

fn preview(names: &[&str]) -> String {
    let mut out = names.iter().take(5).copied().collect::<Vec<_>>().join(", ");
    if names.len() > 5 {
        out.push_str(", ...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_log::Venue;
    use crate::frame::RowKey;
    use chrono::NaiveDate;

    fn schema(entries: &[(&str, FillDefault)]) -> FeatureSchema {
        let features = entries
            .iter()
            .map(|(name, default)| FeatureEntry {
                name: name.to_string(),
                default: *default,
            })
            .collect::<Vec<_>>();
        FeatureSchema {
            version: SCHEMA_VERSION,
            created_at: Utc::now(),
            fingerprint: fingerprint(features.iter().map(|f| f.name.as_str())),
            features,
        }
    }

    fn frame(names: &[&str], values: Vec<Vec<Option<f64>>>) -> FeatureFrame {
        let key = RowKey {
            match_id: "m1".into(),
            entity: "A".into(),
            opponent: "B".into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            venue: Venue::Home,
        };
        FeatureFrame::new(
            names.iter().map(|n| n.to_string()).collect(),
            vec![key],
            values,
        )
    }

    #[test]
    fn reconcile_fills_missing_and_drops_extra() {
        let s = schema(&[
            ("is_home", FillDefault::Required),
            ("win_rate_L5", FillDefault::Value(0.45)),
            ("rest_days", FillDefault::Value(7.0)),
        ]);
        let f = frame(
            &["rest_days", "is_home", "brand_new", "win_rate_L5"],
            vec![vec![Some(4.0)], vec![Some(1.0)], vec![Some(9.0)], vec![None]],
        );
        let rows = s.reconcile(&f).unwrap();
        assert_eq!(rows[0].values, vec![1.0, 0.45, 4.0]);
    }

    #[test]
    fn required_without_value_is_a_mismatch() {
        let s = schema(&[("is_home", FillDefault::Required)]);
        let f = frame(&["is_home"], vec![vec![None]]);
        let err = s.reconcile_row(&f, 0).unwrap_err();
        assert!(matches!(err, FeatureError::SchemaMismatch { ref feature, .. } if feature == "is_home"));
    }

    #[test]
    fn fingerprint_depends_on_order() {
        let a = fingerprint(["x", "y"].into_iter());
        let b = fingerprint(["y", "x"].into_iter());
        assert_ne!(a, b);
        assert_eq!(a.len(), 64);
    }
}
