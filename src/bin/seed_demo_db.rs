use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Datelike;
use env_logger::Env;

use form_engine::fake_log::FakeLeague;
use form_engine::match_store::{self, StoredMatch};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let db_path = parse_arg("db")
        .map(PathBuf::from)
        .or_else(match_store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let defaults = FakeLeague::default();
    let league = FakeLeague {
        teams: parse_num("teams").unwrap_or(defaults.teams).clamp(2, 40),
        seasons: parse_num("seasons").unwrap_or(defaults.seasons).clamp(1, 10),
        seed: parse_num("seed").map(|s| s as u64).unwrap_or(defaults.seed),
        start: defaults.start,
    };
    let league_id = parse_num("league").map(|id| id as u32).unwrap_or(1);

    let stored = league
        .generate()
        .iter()
        .map(|event| {
            // Seasons run August to May.
            let year = if event.date.month() >= 7 {
                event.date.year()
            } else {
                event.date.year() - 1
            };
            StoredMatch::from_paired(event, &format!("{year}/{}", year + 1), league_id)
        })
        .collect::<Vec<_>>();

    let mut conn = match_store::open_db(&db_path)?;
    let upserted = match_store::upsert_matches(&mut conn, &stored)?;

    println!("Demo league seeded");
    println!("DB: {}", db_path.display());
    println!("League: {league_id}");
    println!("Teams: {} Seasons: {}", league.teams, league.seasons);
    println!("Matches upserted: {upserted}");
    Ok(())
}

fn parse_num(name: &str) -> Option<usize> {
    parse_arg(name).and_then(|raw| raw.parse::<usize>().ok())
}

/// `--name=value` or `--name value`.
fn parse_arg(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let flag = format!("--{name}");
    let prefix = format!("--{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if *arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}
