use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::aggregate::{Column, EntityBlock, aggregate_timeline};
use crate::config::EngineConfig;
use crate::cross::{cross, difference};
use crate::error::Result;
use crate::event_log::{EntityTimeline, EventLog, EventRow, Outcome};
use crate::frame::{FeatureFrame, FeatureRow, RowKey};
use crate::mirror::OpponentIndex;
use crate::plan::{FeatureKind, FeaturePlan};
use crate::schema::FeatureSchema;
use crate::stats::Derived;
use crate::synth::{MatchupRequest, synthesize};

/// Supervised labels for one row, from the row's own event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRow {
    pub result: Outcome,
    pub goals_for: Option<f64>,
    pub goals_against: Option<f64>,
    pub total_goals: Option<f64>,
    pub cards: Option<f64>,
    pub over_2_5: Option<bool>,
    pub btts: Option<bool>,
}

impl From<&EventRow> for TargetRow {
    fn from(row: &EventRow) -> Self {
        let flag = |d: Derived| d.eval(row).map(|v| v > 0.0);
        Self {
            result: row.outcome,
            goals_for: row.goals_for(),
            goals_against: row.goals_against(),
            total_goals: Derived::TotalGoals.eval(row),
            cards: Derived::TotalCards.eval(row),
            over_2_5: flag(Derived::Over(2)),
            btts: flag(Derived::BothScored),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub schema: FeatureSchema,
    pub rows: Vec<FeatureRow>,
    pub targets: Vec<TargetRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceVector {
    pub key: RowKey,
    pub fingerprint: String,
    pub names: Vec<String>,
    pub values: Vec<f64>,
}

pub struct Engine {
    config: EngineConfig,
    pool: Option<rayon::ThreadPool>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let config = config.normalized();
        let pool = (config.parallelism > 0)
            .then(|| {
                rayon::ThreadPoolBuilder::new()
                    .num_threads(config.parallelism)
                    .build()
                    .ok()
            })
            .flatten();
        Self { config, pool }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn plan(&self, log: &EventLog) -> FeaturePlan {
        FeaturePlan::resolve(&self.config, log)
    }

    pub fn featurize(&self, log: &EventLog) -> Result<FeatureFrame> {
        let plan = self.plan(log);
        self.run(&plan, log.timelines())
    }

    /// Per-entity aggregation in parallel, then opponent mirroring, then
    /// differential and cross features. Each stage reads only completed
    /// columns of the previous one.
    pub fn run(&self, plan: &FeaturePlan, timelines: &[EntityTimeline]) -> Result<FeatureFrame> {
        self.with_pool(|| {
            let own = plan.own();
            let blocks = timelines
                .par_iter()
                .map(|tl| aggregate_timeline(tl, own, &self.config))
                .collect::<Result<Vec<EntityBlock>>>()?;

            let keys = timelines
                .iter()
                .flat_map(|tl| tl.rows().iter().map(RowKey::from))
                .collect::<Vec<_>>();

            let mut columns: Vec<Column> = (0..own.len())
                .map(|_| Vec::with_capacity(keys.len()))
                .collect();
            for block in blocks {
                for (col, part) in columns.iter_mut().zip(block.columns) {
                    col.extend(part);
                }
            }

            let opponents = OpponentIndex::build(&keys);
            let derived = &plan.defs()[own.len()..];
            let mirrored = derived
                .par_iter()
                .map(|def| match def.kind {
                    FeatureKind::Mirror { source } => Some(opponents.mirror(&columns[source])),
                    _ => None,
                })
                .collect::<Vec<_>>();

            for (def, mirror) in derived.iter().zip(mirrored) {
                let col = match (&def.kind, mirror) {
                    (_, Some(col)) => col,
                    (FeatureKind::Diff { own, opp }, None) => {
                        difference(&columns[*own], &columns[*opp])
                    }
                    (FeatureKind::Cross { kind, own, opp }, None) => {
                        cross(*kind, &columns[*own], &columns[*opp])
                    }
                    _ => vec![None; keys.len()],
                };
                columns.push(col);
            }

            Ok(FeatureFrame::new(plan.names(), keys, columns))
        })
    }

    pub fn train(&self, log: &EventLog) -> Result<TrainingSet> {
        let plan = self.plan(log);
        let frame = self.run(&plan, log.timelines())?;
        let schema = FeatureSchema::register(&plan, log);
        let rows = schema.reconcile(&frame)?;
        let targets = log.rows().map(TargetRow::from).collect::<Vec<_>>();
        info!(
            "training table: {} rows x {} features over {} entities",
            rows.len(),
            schema.len(),
            log.timelines().len()
        );
        Ok(TrainingSet {
            schema,
            rows,
            targets,
        })
    }

    /// One schema-aligned vector for an upcoming matchup. The log is only
    /// read; the synthetic rows live in private timeline copies.
    pub fn infer(
        &self,
        log: &EventLog,
        schema: &FeatureSchema,
        request: &MatchupRequest,
    ) -> Result<InferenceVector> {
        let matchup = synthesize(log, request)?;
        let plan = self.plan(log);
        let frame = self.run(&plan, &matchup.timelines)?;
        let row = schema.reconcile_row(&frame, matchup.target_row)?;
        info!(
            "inference vector for {} vs {} on {}",
            request.entity, request.opponent, matchup.date
        );
        Ok(InferenceVector {
            key: row.key,
            fingerprint: schema.fingerprint.clone(),
            names: schema.names(),
            values: row.values,
        })
    }

    fn with_pool<T>(&self, action: impl FnOnce() -> T + Send) -> T
    where
        T: Send,
    {
        if let Some(pool) = self.pool.as_ref() {
            pool.install(action)
        } else {
            action()
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
