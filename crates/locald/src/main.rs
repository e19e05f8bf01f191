//! proctor-replay: run recorded proctoring sessions through the engine
//!
//! Usage: proctor-replay <signals.jsonl> [--config <file>] [--data-root <dir>] [--log sqlite|jsonl]
//!
//! Violations are logged under the data root (`proctor.db` or
//! `violations.jsonl`); the final per-session scores are printed as JSON.

use proctor_locald::{
    run_replay, EngineConfig, JsonlViolationLog, ProctorEngine,
    SqliteViolationLog, TracingNotifier, ViolationLog,
};
use std::fs;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;

fn arg_value(args: &[String], long: &str, short: &str) -> Option<String> {
    args.iter()
        .position(|a| a == long || a == short)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proctor_locald=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let Some(input) = args.get(1).filter(|a| !a.starts_with('-')).map(PathBuf::from) else {
        eprintln!(
            "usage: {} <signals.jsonl> [--config <file>] [--data-root <dir>] [--log sqlite|jsonl]",
            args.first().map(String::as_str).unwrap_or("proctor-replay")
        );
        std::process::exit(2);
    };

    // Config from CLI args or environment
    let config = match arg_value(&args, "--config", "-c")
        .or_else(|| std::env::var("PROCTOR_CONFIG").ok())
    {
        Some(path) => match EngineConfig::from_file(PathBuf::from(&path).as_path()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            }
        },
        None => EngineConfig::default(),
    };

    let data_root = arg_value(&args, "--data-root", "-d")
        .or_else(|| std::env::var("PROCTOR_DATA_ROOT").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("proctor-data"));
    if let Err(e) = fs::create_dir_all(&data_root) {
        eprintln!("ERROR: Failed to create data root {}: {}", data_root.display(), e);
        std::process::exit(1);
    }
    tracing::info!(data_root = %data_root.display(), input = %input.display(), "replay starting");

    let log: Arc<dyn ViolationLog> = match arg_value(&args, "--log", "-l").as_deref() {
        Some("jsonl") => Arc::new(JsonlViolationLog::new(&data_root)),
        Some("sqlite") | None => match SqliteViolationLog::open(&data_root.join("proctor.db")) {
            Ok(log) => Arc::new(log),
            Err(e) => {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            }
        },
        Some(other) => {
            eprintln!("ERROR: unknown log backend: {}", other);
            std::process::exit(2);
        }
    };

    let engine = match ProctorEngine::builder(config)
        .violation_log(log)
        .notifier(Arc::new(TracingNotifier))
        .build()
    {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let file = match fs::File::open(&input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("ERROR: Failed to open {}: {}", input.display(), e);
            std::process::exit(1);
        }
    };

    let summary = run_replay(&engine, BufReader::new(file)).await;
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}
