use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use env_logger::Env;

use form_engine::{Engine, EngineConfig, FeatureSchema, MatchupRequest, Venue, match_store};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(Env::default().default_filter_or("warn")).init();

    let team = parse_arg("team").ok_or_else(|| anyhow!("--team is required"))?;
    let opponent = parse_arg("opponent").ok_or_else(|| anyhow!("--opponent is required"))?;
    let venue = match parse_arg("venue") {
        Some(raw) => Venue::parse(&raw).ok_or_else(|| anyhow!("--venue must be home or away"))?,
        None => Venue::Home,
    };
    let schema_path =
        PathBuf::from(parse_arg("schema").unwrap_or_else(|| "feature_schema.json".to_string()));
    let db_path = parse_arg("db")
        .map(PathBuf::from)
        .or_else(match_store::default_db_path)
        .context("unable to resolve sqlite path")?;
    let league_id = parse_arg("league")
        .map(|raw| raw.parse::<u32>())
        .transpose()
        .context("--league must be a numeric league id")?;
    let config = match parse_arg("config") {
        Some(path) => EngineConfig::load(&PathBuf::from(&path))
            .with_context(|| format!("load engine config {path}"))?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();

    let mut request = MatchupRequest::new(team, opponent, venue);
    if let Some(raw) = parse_arg("date") {
        let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .with_context(|| format!("--date {raw} is not YYYY-MM-DD"))?;
        request = request.on(date);
    }

    let schema = FeatureSchema::load(&schema_path)
        .with_context(|| format!("load schema {}", schema_path.display()))?;
    let conn = match_store::open_db(&db_path)?;
    let log = match_store::load_event_log(&conn, league_id)?;

    let vector = Engine::new(config)
        .infer(&log, &schema, &request)
        .context("build inference vector")?;
    println!("{}", serde_json::to_string_pretty(&vector)?);
    Ok(())
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
