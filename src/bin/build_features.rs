use std::path::PathBuf;

use anyhow::{Context, Result};
use env_logger::Env;

use form_engine::{Engine, EngineConfig, export, match_store};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

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
    let schema_out =
        PathBuf::from(parse_arg("schema-out").unwrap_or_else(|| "feature_schema.json".to_string()));

    let conn = match_store::open_db(&db_path)?;
    let log = match_store::load_event_log(&conn, league_id)?;

    let engine = Engine::new(config);
    let set = engine.train(&log).context("build training table")?;
    set.schema
        .save(&schema_out)
        .with_context(|| format!("write schema {}", schema_out.display()))?;

    println!("Feature build complete");
    println!("DB: {}", db_path.display());
    println!("Entities: {}", log.timelines().len());
    println!("Rows: {}", set.rows.len());
    println!("Features: {}", set.schema.len());
    println!("Schema: {} ({})", schema_out.display(), set.schema.fingerprint);

    if let Some(xlsx) = parse_arg("xlsx-out") {
        let path = PathBuf::from(xlsx);
        let report = export::write_training_xlsx(&path, &set)?;
        println!(
            "Workbook: {} ({} rows x {} features)",
            path.display(),
            report.rows,
            report.features
        );
    }
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
