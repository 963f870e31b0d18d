//! As-of feature engineering for paired-entity events.
//!
//! Each entity's history is aggregated causally (row `t` only sees events
//! dated before `t`), aligned against the opponent's own history, and
//! reconciled onto a fixed feature schema shared by training and inference.

pub mod aggregate;
pub mod config;
pub mod cross;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod export;
pub mod fake_log;
pub mod frame;
pub mod match_store;
pub mod mirror;
pub mod plan;
pub mod schema;
pub mod stats;
pub mod synth;

pub use config::EngineConfig;
pub use engine::{Engine, InferenceVector, TargetRow, TrainingSet};
pub use error::{FeatureError, Result};
pub use event_log::{EntityId, EventLog, EventRow, Outcome, PairedEvent, Venue};
pub use frame::{FeatureFrame, FeatureRow, RowKey};
pub use schema::FeatureSchema;
pub use synth::MatchupRequest;
