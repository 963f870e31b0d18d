use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use log::{info, warn};
use rusqlite::{Connection, params};

use crate::event_log::{EventLog, PairedEvent};

const CACHE_DIR: &str = "form_engine";

/// One row of the `matches` table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMatch {
    pub match_id: String,
    pub season: String,
    pub league_id: u32,
    pub round: Option<i64>,
    pub utc_time: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub finished: bool,
    pub cancelled: bool,
    pub awarded: bool,
    pub score_str: Option<String>,
    pub home_stats: BTreeMap<String, f64>,
    pub away_stats: BTreeMap<String, f64>,
}

impl StoredMatch {
    pub fn from_paired(event: &PairedEvent, season: &str, league_id: u32) -> Self {
        Self {
            match_id: event.match_id.clone(),
            season: season.to_string(),
            league_id,
            round: None,
            utc_time: format!("{}T15:00:00Z", event.date),
            home_team: event.home.to_string(),
            away_team: event.away.to_string(),
            home_goals: i32::try_from(event.home_goals).ok(),
            away_goals: i32::try_from(event.away_goals).ok(),
            finished: true,
            cancelled: false,
            awarded: false,
            score_str: Some(format!("{} - {}", event.home_goals, event.away_goals)),
            home_stats: event.home_stats.clone(),
            away_stats: event.away_stats.clone(),
        }
    }

    /// Final score, falling back to the score string when the goal columns
    /// are empty.
    pub fn score(&self) -> Option<(i32, i32)> {
        match (self.home_goals, self.away_goals) {
            (Some(h), Some(a)) => Some((h, a)),
            _ => self.score_str.as_deref().and_then(parse_score_pair),
        }
    }

    pub fn outcome(&self) -> Option<char> {
        let (home_goals, away_goals) = self.score()?;
        if !self.finished || self.cancelled || self.awarded {
            return None;
        }
        if home_goals > away_goals {
            Some('H')
        } else if home_goals < away_goals {
            Some('A')
        } else {
            Some('D')
        }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        let day = self.utc_time.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    /// `None` for unfinished, void or undated matches.
    pub fn to_paired_event(&self) -> Option<PairedEvent> {
        self.outcome()?;
        let (home_goals, away_goals) = self.score()?;
        let mut event = PairedEvent::new(
            self.match_id.clone(),
            self.date()?,
            self.home_team.clone(),
            self.away_team.clone(),
            u32::try_from(home_goals).ok()?,
            u32::try_from(away_goals).ok()?,
        );
        event.home_stats = self.home_stats.clone();
        event.away_stats = self.away_stats.clone();
        Some(event)
    }
}

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR).join("matches.sqlite"));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(
        PathBuf::from(home)
            .join(".cache")
            .join(CACHE_DIR)
            .join("matches.sqlite"),
    )
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS matches (
            match_id TEXT PRIMARY KEY,
            season TEXT NOT NULL,
            league_id INTEGER NOT NULL,
            round INTEGER NULL,
            utc_time TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            finished INTEGER NOT NULL,
            cancelled INTEGER NOT NULL,
            awarded INTEGER NOT NULL,
            score_str TEXT NULL,
            outcome TEXT NULL,
            home_stats TEXT NOT NULL,
            away_stats TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league_id);
        CREATE INDEX IF NOT EXISTS idx_matches_utc_time ON matches(utc_time);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Inserts or replaces every match in one transaction.
pub fn upsert_matches(conn: &mut Connection, matches: &[StoredMatch]) -> Result<usize> {
    let tx = conn.transaction().context("begin upsert transaction")?;
    for m in matches {
        upsert_match(&tx, m)?;
    }
    tx.commit().context("commit upsert transaction")?;
    Ok(matches.len())
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &StoredMatch) -> Result<()> {
    let home_stats = serde_json::to_string(&m.home_stats).context("encode home stats")?;
    let away_stats = serde_json::to_string(&m.away_stats).context("encode away stats")?;
    tx.execute(
        r#"
        INSERT INTO matches (
            match_id, season, league_id, round, utc_time,
            home_team, away_team, home_goals, away_goals,
            finished, cancelled, awarded, score_str, outcome,
            home_stats, away_stats, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5,
            ?6, ?7, ?8, ?9,
            ?10, ?11, ?12, ?13, ?14,
            ?15, ?16, ?17
        )
        ON CONFLICT(match_id) DO UPDATE SET
            season = excluded.season,
            league_id = excluded.league_id,
            round = excluded.round,
            utc_time = excluded.utc_time,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            finished = excluded.finished,
            cancelled = excluded.cancelled,
            awarded = excluded.awarded,
            score_str = excluded.score_str,
            outcome = excluded.outcome,
            home_stats = excluded.home_stats,
            away_stats = excluded.away_stats,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id,
            m.season,
            m.league_id as i64,
            m.round,
            m.utc_time,
            m.home_team,
            m.away_team,
            m.home_goals,
            m.away_goals,
            bool_to_i64(m.finished),
            bool_to_i64(m.cancelled),
            bool_to_i64(m.awarded),
            m.score_str,
            m.outcome().map(|c| c.to_string()),
            home_stats,
            away_stats,
            Utc::now().to_rfc3339(),
        ],
    )
    .with_context(|| format!("upsert match {}", m.match_id))?;
    Ok(())
}

/// Finished, non-void matches in kickoff order, optionally for one league.
pub fn load_finished_matches(conn: &Connection, league_id: Option<u32>) -> Result<Vec<StoredMatch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                match_id, season, league_id, round, utc_time,
                home_team, away_team, home_goals, away_goals,
                finished, cancelled, awarded, score_str,
                home_stats, away_stats
            FROM matches
            WHERE (?1 IS NULL OR league_id = ?1)
              AND finished = 1
              AND cancelled = 0
              AND awarded = 0
            ORDER BY utc_time ASC, match_id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map(params![league_id.map(i64::from)], |row| {
            Ok((
                StoredMatch {
                    match_id: row.get(0)?,
                    season: row.get(1)?,
                    league_id: row.get::<_, u32>(2)?,
                    round: row.get(3)?,
                    utc_time: row.get(4)?,
                    home_team: row.get(5)?,
                    away_team: row.get(6)?,
                    home_goals: row.get(7)?,
                    away_goals: row.get(8)?,
                    finished: row.get::<_, i64>(9)? != 0,
                    cancelled: row.get::<_, i64>(10)? != 0,
                    awarded: row.get::<_, i64>(11)? != 0,
                    score_str: row.get(12)?,
                    home_stats: BTreeMap::new(),
                    away_stats: BTreeMap::new(),
                },
                row.get::<_, String>(13)?,
                row.get::<_, String>(14)?,
            ))
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        let (mut m, home_stats, away_stats) = row.context("decode match row")?;
        m.home_stats = serde_json::from_str(&home_stats)
            .with_context(|| format!("decode home stats of {}", m.match_id))?;
        m.away_stats = serde_json::from_str(&away_stats)
            .with_context(|| format!("decode away stats of {}", m.match_id))?;
        out.push(m);
    }
    Ok(out)
}

pub fn load_event_log(conn: &Connection, league_id: Option<u32>) -> Result<EventLog> {
    let stored = load_finished_matches(conn, league_id)?;
    let events = stored
        .iter()
        .filter_map(StoredMatch::to_paired_event)
        .collect::<Vec<_>>();
    let skipped = stored.len() - events.len();
    if skipped > 0 {
        warn!("{skipped} stored matches have no usable score or date; skipped");
    }
    info!("loaded {} matches from sqlite", events.len());
    EventLog::from_paired(&events).context("build event log")
}

fn bool_to_i64(v: bool) -> i64 {
    if v { 1 } else { 0 }
}

fn parse_score_pair(raw: &str) -> Option<(i32, i32)> {
    let mut nums = raw
        .split(|ch: char| !ch.is_ascii_digit())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i32>().ok());
    let home = nums.next()?;
    let away = nums.next()?;
    Some((home, away))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> StoredMatch {
        let date = NaiveDate::from_ymd_opt(2023, 8, 12).unwrap();
        let ev = PairedEvent::new("m1", date, "Arsenal", "Forest", 2, 1).with_stat("corners", 8.0, 2.0);
        StoredMatch::from_paired(&ev, "2023/2024", 47)
    }

    #[test]
    fn parse_score_pair_works() {
        assert_eq!(parse_score_pair("2-1"), Some((2, 1)));
        assert_eq!(parse_score_pair("FT 0 : 0"), Some((0, 0)));
        assert_eq!(parse_score_pair("ab"), None);
    }

    #[test]
    fn score_string_backs_up_missing_goals() {
        let mut m = stored();
        m.home_goals = None;
        m.score_str = Some("3 - 3".into());
        assert_eq!(m.outcome(), Some('D'));
        assert_eq!(m.to_paired_event().unwrap().home_goals, 3);
    }

    #[test]
    fn void_matches_are_not_events() {
        let mut m = stored();
        m.awarded = true;
        assert!(m.to_paired_event().is_none());
        let mut m = stored();
        m.utc_time = "garbage".into();
        assert!(m.to_paired_event().is_none());
    }
}
