use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Result};

/// Identifier of a participant in paired events (a team).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Venue {
    Home,
    Away,
}

impl Venue {
    pub const ALL: [Venue; 2] = [Venue::Home, Venue::Away];

    pub fn opposite(self) -> Self {
        match self {
            Venue::Home => Venue::Away,
            Venue::Away => Venue::Home,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Venue::Home => "Home",
            Venue::Away => "Away",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "home" | "h" => Some(Venue::Home),
            "away" | "a" => Some(Venue::Away),
            _ => None,
        }
    }
}

/// Result of an event from one entity's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Draw,
    Loss,
}

impl Outcome {
    pub fn from_goals(goals_for: u32, goals_against: u32) -> Self {
        match goals_for.cmp(&goals_against) {
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Less => Outcome::Loss,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Draw => Outcome::Draw,
        }
    }

    pub fn points(self) -> f64 {
        match self {
            Outcome::Win => 3.0,
            Outcome::Draw => 1.0,
            Outcome::Loss => 0.0,
        }
    }

    pub fn code(self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Draw => 'D',
            Outcome::Loss => 'L',
        }
    }
}

/// One entity's participation in one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRow {
    pub match_id: String,
    pub entity: EntityId,
    pub opponent: EntityId,
    pub date: NaiveDate,
    pub venue: Venue,
    pub outcome: Outcome,
    pub stats: BTreeMap<String, f64>,
}

impl EventRow {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied().filter(|v| v.is_finite())
    }

    pub fn goals_for(&self) -> Option<f64> {
        self.stat("goals_for")
    }

    pub fn goals_against(&self) -> Option<f64> {
        self.stat("goals_against")
    }

    pub fn is_home(&self) -> bool {
        self.venue == Venue::Home
    }
}

/// A match as delivered by a loader, before it is split per perspective.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairedEvent {
    pub match_id: String,
    pub date: NaiveDate,
    pub home: EntityId,
    pub away: EntityId,
    pub home_goals: u32,
    pub away_goals: u32,
    #[serde(default)]
    pub home_stats: BTreeMap<String, f64>,
    #[serde(default)]
    pub away_stats: BTreeMap<String, f64>,
}

impl PairedEvent {
    pub fn new(
        match_id: impl Into<String>,
        date: NaiveDate,
        home: impl Into<String>,
        away: impl Into<String>,
        home_goals: u32,
        away_goals: u32,
    ) -> Self {
        Self {
            match_id: match_id.into(),
            date,
            home: EntityId::new(home),
            away: EntityId::new(away),
            home_goals,
            away_goals,
            home_stats: BTreeMap::new(),
            away_stats: BTreeMap::new(),
        }
    }

    pub fn with_stat(mut self, name: &str, home: f64, away: f64) -> Self {
        self.home_stats.insert(name.to_string(), home);
        self.away_stats.insert(name.to_string(), away);
        self
    }

    /// Home perspective first, then away.
    pub fn to_rows(&self) -> [EventRow; 2] {
        let mut home_stats = self.home_stats.clone();
        home_stats.insert("goals_for".to_string(), self.home_goals as f64);
        home_stats.insert("goals_against".to_string(), self.away_goals as f64);
        let mut away_stats = self.away_stats.clone();
        away_stats.insert("goals_for".to_string(), self.away_goals as f64);
        away_stats.insert("goals_against".to_string(), self.home_goals as f64);

        let home_outcome = Outcome::from_goals(self.home_goals, self.away_goals);
        [
            EventRow {
                match_id: self.match_id.clone(),
                entity: self.home.clone(),
                opponent: self.away.clone(),
                date: self.date,
                venue: Venue::Home,
                outcome: home_outcome,
                stats: home_stats,
            },
            EventRow {
                match_id: self.match_id.clone(),
                entity: self.away.clone(),
                opponent: self.home.clone(),
                date: self.date,
                venue: Venue::Away,
                outcome: home_outcome.flipped(),
                stats: away_stats,
            },
        ]
    }
}

/// Chronological, append-only history of one entity.
#[derive(Debug, Clone)]
pub struct EntityTimeline {
    entity: EntityId,
    rows: Vec<EventRow>,
}

impl EntityTimeline {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            rows: Vec::new(),
        }
    }

    pub fn entity(&self) -> &EntityId {
        &self.entity
    }

    pub fn rows(&self) -> &[EventRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.rows.last().map(|r| r.date)
    }

    /// Rejects rows that are not strictly later than the current tail.
    pub fn push(&mut self, row: EventRow) -> Result<()> {
        if let Some(last) = self.last_date()
            && row.date <= last
        {
            return Err(FeatureError::DuplicateEventDate {
                entity: self.entity.clone(),
                date: row.date,
            });
        }
        self.rows.push(row);
        Ok(())
    }
}

/// Immutable store of every entity timeline, ordered by entity id.
#[derive(Debug, Clone)]
pub struct EventLog {
    timelines: Vec<EntityTimeline>,
    ordinals: HashMap<EntityId, usize>,
    raw_stats: BTreeSet<String>,
    latest: NaiveDate,
    len: usize,
}

impl EventLog {
    pub fn from_paired(events: &[PairedEvent]) -> Result<Self> {
        let rows = events.iter().flat_map(|e| e.to_rows()).collect();
        Self::from_rows(rows)
    }

    pub fn from_rows(mut rows: Vec<EventRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(FeatureError::EmptyLog);
        }
        rows.sort_by(|a, b| {
            a.entity
                .cmp(&b.entity)
                .then(a.date.cmp(&b.date))
                .then(a.match_id.cmp(&b.match_id))
        });

        let len = rows.len();
        let mut raw_stats = BTreeSet::new();
        let mut latest = rows[0].date;
        let mut timelines: Vec<EntityTimeline> = Vec::new();
        for row in rows {
            for (name, value) in &row.stats {
                if value.is_finite() && !raw_stats.contains(name) {
                    raw_stats.insert(name.clone());
                }
            }
            latest = latest.max(row.date);
            match timelines.last_mut() {
                Some(tl) if tl.entity == row.entity => tl.push(row)?,
                _ => {
                    let mut tl = EntityTimeline::new(row.entity.clone());
                    tl.push(row)?;
                    timelines.push(tl);
                }
            }
        }

        let ordinals = timelines
            .iter()
            .enumerate()
            .map(|(idx, tl)| (tl.entity.clone(), idx))
            .collect();

        Ok(Self {
            timelines,
            ordinals,
            raw_stats,
            latest,
            len,
        })
    }

    pub fn timelines(&self) -> &[EntityTimeline] {
        &self.timelines
    }

    pub fn timeline(&self, entity: &EntityId) -> Option<&EntityTimeline> {
        self.ordinals.get(entity).map(|idx| &self.timelines[*idx])
    }

    pub fn entity_ordinal(&self, entity: &EntityId) -> Option<usize> {
        self.ordinals.get(entity).copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = &EventRow> {
        self.timelines.iter().flat_map(|tl| tl.rows.iter())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn latest_date(&self) -> NaiveDate {
        self.latest
    }

    /// Capability query: is this raw stat present anywhere in the log?
    pub fn has_stat(&self, name: &str) -> bool {
        self.raw_stats.contains(name)
    }

    pub fn raw_stats(&self) -> impl Iterator<Item = &str> {
        self.raw_stats.iter().map(|s| s.as_str())
    }
}
