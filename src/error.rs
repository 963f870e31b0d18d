use chrono::NaiveDate;
use thiserror::Error;

use crate::event_log::EntityId;

/// Failures that must reach the caller.
///
/// Missing raw stats and short histories are not errors: the planner skips
/// absent stats and the aggregator emits the missing-data sentinel.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("feature `{feature}` has no value and no declared default for {entity} on {date}")]
    SchemaMismatch {
        feature: String,
        entity: EntityId,
        date: NaiveDate,
    },

    #[error("causality violation for {entity}: row dated {row_date} read input dated {input_date}")]
    CausalityViolation {
        entity: EntityId,
        row_date: NaiveDate,
        input_date: NaiveDate,
    },

    #[error("{entity} has more than one event on {date}")]
    DuplicateEventDate { entity: EntityId, date: NaiveDate },

    #[error("cannot build a matchup of {0} against itself")]
    SelfMatchup(EntityId),

    #[error("inference date {requested} is not after the latest logged event {latest}")]
    InferenceDate {
        requested: NaiveDate,
        latest: NaiveDate,
    },

    #[error("event log is empty")]
    EmptyLog,

    #[error("schema artifact is corrupt: {0}")]
    SchemaCorrupt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, FeatureError>;
