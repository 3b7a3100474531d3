//! # bibmirror-sync
//!
//! Command-line entry point: loads configuration, registers the configured
//! libraries, runs one sync pass, and prints the report.
//!
//! ```text
//! bibmirror-sync [--config PATH] [--library ID | --due] [--reset ID]
//! ```
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show every API request attempt
//! - Default: INFO level

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use bibmirror_db::{Database, DbConfig};
use bibmirror_sync::{ApiClient, MirrorConfig, SyncError, SyncOrchestrator, SyncResult};

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    library: Option<String>,
    reset: Option<String>,
    due: bool,
}

impl Args {
    fn parse() -> SyncResult<Self> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" => args.config = Some(PathBuf::from(value(&mut iter, "--config")?)),
                "--library" => args.library = Some(value(&mut iter, "--library")?),
                "--reset" => args.reset = Some(value(&mut iter, "--reset")?),
                "--due" => args.due = true,
                other => {
                    return Err(SyncError::InvalidConfig(format!("Unknown argument: {other}")));
                }
            }
        }

        if args.due && args.library.is_some() {
            return Err(SyncError::InvalidConfig(
                "--due and --library are mutually exclusive".into(),
            ));
        }
        Ok(args)
    }
}

fn value(iter: &mut impl Iterator<Item = String>, flag: &str) -> SyncResult<String> {
    iter.next()
        .ok_or_else(|| SyncError::InvalidConfig(format!("{flag} requires a value")))
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(args: Args) -> SyncResult<bool> {
    let config = MirrorConfig::load(args.config)?;

    if let Some(dir) = config.database.path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }

    let db = Database::new(DbConfig::new(config.database.path.clone())).await?;
    info!(path = %config.database.path.display(), "Database ready");

    let client = ApiClient::from_settings(&config.api)?;
    let orchestrator = SyncOrchestrator::new(Arc::new(db), client, config.sync.clone());

    let registered = orchestrator.register_libraries(&config.libraries).await?;
    info!(count = registered.len(), "Libraries registered");

    if let Some(id) = &args.reset {
        orchestrator.reset(id).await?;
        info!(library_id = %id, "Version cursor cleared");
    }

    let report = if args.due {
        orchestrator.sync_due(Utc::now()).await
    } else {
        orchestrator.sync(args.library.as_deref()).await
    };

    print!("{report}");
    Ok(report.is_success())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let outcome = match Args::parse() {
        Ok(args) => run(args).await,
        Err(e) => Err(e),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!(error = %e, "bibmirror-sync failed");
            ExitCode::from(2)
        }
    }
}
