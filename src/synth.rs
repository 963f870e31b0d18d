use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};
use crate::event_log::{EntityId, EntityTimeline, EventLog, EventRow, Outcome, Venue};

/// An upcoming matchup to featurize, seen from `entity`'s side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupRequest {
    pub entity: EntityId,
    pub opponent: EntityId,
    pub venue: Venue,
    /// Defaults to the day after the latest logged event.
    pub date: Option<NaiveDate>,
}

impl MatchupRequest {
    pub fn new(entity: impl Into<String>, opponent: impl Into<String>, venue: Venue) -> Self {
        Self {
            entity: EntityId::new(entity),
            opponent: EntityId::new(opponent),
            venue,
            date: None,
        }
    }

    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Private copies of both timelines with a placeholder row appended to each.
#[derive(Debug, Clone)]
pub struct SyntheticMatchup {
    pub timelines: Vec<EntityTimeline>,
    pub entity: EntityId,
    pub date: NaiveDate,
    /// Position of the requested side's placeholder in the concatenated rows.
    pub target_row: usize,
}

pub fn synthesize(log: &EventLog, request: &MatchupRequest) -> Result<SyntheticMatchup> {
    if request.entity == request.opponent {
        return Err(FeatureError::SelfMatchup(request.entity.clone()));
    }

    let latest = log.latest_date();
    let date = match request.date {
        Some(requested) if requested <= latest => {
            return Err(FeatureError::InferenceDate { requested, latest });
        }
        Some(requested) => requested,
        None => latest + Duration::days(1),
    };
    let match_id = format!(
        "synthetic:{}:{}:{date}",
        request.entity, request.opponent
    );

    let sides = [
        (&request.entity, &request.opponent, request.venue),
        (&request.opponent, &request.entity, request.venue.opposite()),
    ];
    let mut timelines = Vec::with_capacity(2);
    for (entity, opponent, venue) in sides {
        let mut timeline = match log.timeline(entity) {
            Some(tl) => tl.clone(),
            None => {
                warn!("{entity} has no history; its features fall back to defaults");
                EntityTimeline::new(entity.clone())
            }
        };
        // Placeholder outcome and stats; features of this row never read them.
        timeline.push(EventRow {
            match_id: match_id.clone(),
            entity: entity.clone(),
            opponent: opponent.clone(),
            date,
            venue,
            outcome: Outcome::Draw,
            stats: BTreeMap::new(),
        })?;
        timelines.push(timeline);
    }
    timelines.sort_by(|a, b| a.entity().cmp(b.entity()));

    let mut target_row = 0;
    for tl in &timelines {
        target_row += tl.len();
        if tl.entity() == &request.entity {
            break;
        }
    }

    Ok(SyntheticMatchup {
        timelines,
        entity: request.entity.clone(),
        date,
        target_row: target_row - 1,
    })
}
