//! Photo retention job.
//!
//! Deletes photos older than the retention window (14 days by default) from
//! object storage and then from the database. Meant to be run by an external
//! scheduler such as cron or a systemd timer.
//!
//! ## Usage
//!
//! ```bash
//! tripfriend-retention run             # Remote objects, then records
//! tripfriend-retention purge-remote    # Remote objects only
//! tripfriend-retention purge-records   # Records whose objects are gone
//! ```
//!
//! ## systemd timer
//!
//! ```ini
//! [Service]
//! Type=oneshot
//! ExecStart=/usr/local/bin/tripfriend-retention run
//!
//! [Timer]
//! OnCalendar=daily
//! ```

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use tripfriend::config::Config;
use tripfriend::db::Database;
use tripfriend::logging;
use tripfriend::retention::RetentionJob;
use tripfriend::storage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    PurgeRemote,
    PurgeRecords,
    Run,
}

struct Args {
    command: Command,
    config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = parse_args();

    logging::init("tripfriend-retention", logging::LOG_ENV, None)?;

    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let db = Database::open(&config.database).with_context(|| {
        format!("Failed to open database at {}", config.database.sqlite_path.display())
    })?;
    db.initialize().context("Failed to initialize database schema")?;

    let store = storage::create_store(&config.storage).context("Failed to set up object storage")?;
    info!(backend = store.backend_name(), command = ?args.command, "Retention job starting");

    let job = RetentionJob::from_config(&db, store, &config.retention);
    let output = match args.command {
        Command::PurgeRemote => {
            let report = job
                .delete_remote_objects()
                .context("Failed to delete remote objects")?;
            serde_json::to_string_pretty(&report)?
        }
        Command::PurgeRecords => {
            let deleted = job
                .delete_expired_records()
                .context("Failed to delete expired records")?;
            serde_json::to_string_pretty(&serde_json::json!({ "records_deleted": deleted }))?
        }
        Command::Run => {
            let report = job
                .run(chrono::Utc::now())
                .context("Retention run failed")?;
            serde_json::to_string_pretty(&report)?
        }
    };
    println!("{}", output);

    info!("Retention job finished");
    Ok(())
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut command = None;
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "purge-remote" => command = Some(Command::PurgeRemote),
            "purge-records" => command = Some(Command::PurgeRecords),
            "run" => command = Some(Command::Run),
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("--config requires a path");
                    std::process::exit(1);
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("tripfriend-retention {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    Args {
        command: command.unwrap_or(Command::Run),
        config_path,
    }
}

fn print_help() {
    println!(
        r#"tripfriend-retention - Purge expired trip photos

USAGE:
    tripfriend-retention [COMMAND] [OPTIONS]

COMMANDS:
    run                 Delete remote objects, then expired records (default)
    purge-remote        Delete remote objects for expired photos
    purge-records       Delete expired photo records whose objects are gone

OPTIONS:
    --config, -c PATH   Path to config file
    --help, -h          Show this help message
    --version, -V       Show version

ENVIRONMENT:
    TRIPFRIEND_CONFIG        Config file path
    TRIPFRIEND_LOG           Log filter (e.g. debug, tripfriend::retention=trace)
    AWS_STORAGE_BUCKET_NAME  S3 bucket; selects the S3 backend
    AWS_ACCESS_KEY_ID        S3 access key
    AWS_SECRET_ACCESS_KEY    S3 secret key
"#
    );
}
