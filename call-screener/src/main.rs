//! Call Screener - Main entry point
//!
//! Runs the screening engine over a scripted device, and manages the keyword
//! list and blocked-call history.
//!
//! # Usage
//!
//! ```bash
//! # Screen calls from a JSON-lines device script
//! call-screener run --script calls.jsonl
//!
//! # Manage keywords
//! call-screener keywords add "spam likely" telemarketer
//! call-screener keywords list
//!
//! # Inspect blocked calls
//! call-screener blocked list
//! call-screener blocked check +1234567890
//! ```

use call_screener::coordinator::BlockSink;
use call_screener::replay::{self, ReplayDevice};
use call_screener::{Config, DiagnosticsReport, Platform, ScreeningService};
use screening_store::blocked::BLOCKED_NAMESPACE;
use screening_store::keywords::KEYWORDS_NAMESPACE;
use screening_store::{BlockLog, KeywordStore, SqliteSetStore, StorageError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::BufReader;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_API_LEVEL: u32 = 34;

/// Shape of the scripted device used by `run` and `status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DeviceOptions {
    api_level: u32,
    policy_access: bool,
}

impl Default for DeviceOptions {
    fn default() -> Self {
        Self {
            api_level: DEFAULT_API_LEVEL,
            policy_access: true,
        }
    }
}

impl DeviceOptions {
    fn build(&self) -> ReplayDevice {
        let device = ReplayDevice::new(self.api_level);
        if self.policy_access {
            device
        } else {
            device.without_policy_access()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Run {
        script: Option<PathBuf>,
        device: DeviceOptions,
    },
    KeywordsAdd(Vec<String>),
    KeywordsRemove(Vec<String>),
    KeywordsList,
    BlockedList,
    BlockedCount,
    BlockedClear,
    BlockedCheck(String),
    Status(DeviceOptions),
    ConfigInit,
}

#[derive(Debug, Clone)]
struct CliArgs {
    config_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    command: Command,
}

fn print_help() {
    println!(
        r#"Call Screener v{}

USAGE:
    call-screener [OPTIONS] <COMMAND>

COMMANDS:
    run [--script FILE]         Screen calls from JSON-lines device events
                                (stdin when no script is given)
    keywords add <KEYWORD>...   Add blocked keywords
    keywords remove <KEYWORD>...
                                Remove blocked keywords
    keywords list               List blocked keywords
    blocked list                Show blocked calls, most recent first
    blocked count               Number of blocked calls
    blocked clear               Clear the blocked call history
    blocked check <NUMBER>      Whether a number has been blocked
    status                      Self-check report
    config init                 Write the default configuration file

DEVICE OPTIONS (run, status):
    --api-level <N>             Platform API level (default {})
    --no-policy-access          Deny ringer policy access

OPTIONS:
    -c, --config <FILE>         Configuration file
    --db <FILE>                 Database file
    -h, --help                  Print help
    -v, --version               Print version

Set RUST_LOG to override the configured log level."#,
        env!("CARGO_PKG_VERSION"),
        DEFAULT_API_LEVEL
    );
}

fn usage_error(message: &str) -> ! {
    eprintln!("{}", message);
    eprintln!("Use --help for usage information.");
    std::process::exit(1);
}

/// Parse command line arguments
fn parse_args() -> CliArgs {
    parse_args_from(std::env::args().skip(1).collect())
}

fn parse_args_from(args: Vec<String>) -> CliArgs {
    let mut config_path = None;
    let mut db_path = None;
    let mut positional = Vec::new();
    let mut script = None;
    let mut device = DeviceOptions::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("Call Screener v{}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                i += 1;
                match args.get(i) {
                    Some(path) => config_path = Some(PathBuf::from(path)),
                    None => usage_error("--config requires a file"),
                }
            }
            "--db" => {
                i += 1;
                match args.get(i) {
                    Some(path) => db_path = Some(PathBuf::from(path)),
                    None => usage_error("--db requires a file"),
                }
            }
            "--script" => {
                i += 1;
                match args.get(i) {
                    Some(path) => script = Some(PathBuf::from(path)),
                    None => usage_error("--script requires a file"),
                }
            }
            "--api-level" => {
                i += 1;
                match args.get(i).and_then(|level| level.parse().ok()) {
                    Some(level) => device.api_level = level,
                    None => usage_error("--api-level requires a number"),
                }
            }
            "--no-policy-access" => {
                device.policy_access = false;
            }
            other if other.starts_with('-') && other.len() > 1 => {
                usage_error(&format!("Unknown argument: {}", other));
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let words: Vec<&str> = positional.iter().map(String::as_str).collect();
    let command = match words.as_slice() {
        ["run"] => Command::Run { script, device },
        ["keywords", "add", rest @ ..] if !rest.is_empty() => {
            Command::KeywordsAdd(rest.iter().map(|s| s.to_string()).collect())
        }
        ["keywords", "remove", rest @ ..] if !rest.is_empty() => {
            Command::KeywordsRemove(rest.iter().map(|s| s.to_string()).collect())
        }
        ["keywords", "list"] | ["keywords"] => Command::KeywordsList,
        ["blocked", "list"] | ["blocked"] => Command::BlockedList,
        ["blocked", "count"] => Command::BlockedCount,
        ["blocked", "clear"] => Command::BlockedClear,
        ["blocked", "check", number] => Command::BlockedCheck(number.to_string()),
        ["status"] => Command::Status(device),
        ["config", "init"] => Command::ConfigInit,
        [] => usage_error("Missing command"),
        _ => usage_error(&format!("Unknown command: {}", words.join(" "))),
    };

    CliArgs {
        config_path,
        db_path,
        command,
    }
}

fn open_keywords(db_path: &Path) -> Result<KeywordStore, StorageError> {
    KeywordStore::open(Box::new(SqliteSetStore::open(db_path, KEYWORDS_NAMESPACE)?))
}

fn open_block_log(db_path: &Path) -> Result<BlockLog, StorageError> {
    Ok(BlockLog::new(Box::new(SqliteSetStore::open(
        db_path,
        BLOCKED_NAMESPACE,
    )?)))
}

async fn run_daemon(
    config: &Config,
    db_path: &Path,
    script: Option<PathBuf>,
    device: DeviceOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let keywords = Arc::new(Mutex::new(open_keywords(db_path)?));
    let block_log: Arc<dyn BlockSink> = Arc::new(Mutex::new(open_block_log(db_path)?));

    let device = Arc::new(device.build());
    let platform = Platform {
        ringer: device.clone(),
        call_control: device.clone(),
        screen: device.clone(),
    };
    let service = ScreeningService::new(config, platform, keywords, block_log);

    info!("Starting call screener (database {:?})", db_path);

    let result = match script {
        Some(path) => {
            let file = tokio::fs::File::open(&path).await?;
            tokio::select! {
                result = replay::replay(&service, &device, BufReader::new(file)) => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            }
        }
        None => {
            tokio::select! {
                result = replay::replay(&service, &device, BufReader::new(tokio::io::stdin())) => Some(result),
                _ = tokio::signal::ctrl_c() => None,
            }
        }
    };

    match result {
        Some(Ok(summary)) => {
            println!(
                "Processed {} steps ({} calls, {} ended, {} skipped lines)",
                summary.steps,
                summary.calls,
                device.ended_calls(),
                summary.skipped_lines
            );
        }
        Some(Err(e)) => {
            error!("Replay failed: {}", e);
            return Err(e.into());
        }
        None => println!("\nShutting down..."),
    }

    println!("{}", serde_json::to_string_pretty(&service.status())?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = parse_args();

    let config_path = args
        .config_path
        .clone()
        .unwrap_or_else(Config::default_config_path);
    let config = Config::load_from_path(config_path.clone());

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.general.log_level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration loaded from {:?}", config_path);

    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| config.storage.resolved_db_path());

    match args.command {
        Command::ConfigInit => {
            if config_path.exists() {
                println!("Configuration already exists at {}", config_path.display());
            } else {
                Config::default().save_to_path(config_path.clone())?;
                println!("Wrote default configuration to {}", config_path.display());
            }
        }
        Command::Run { script, device } => {
            if !config.general.enabled {
                info!("Screening is disabled in configuration, exiting");
                return Ok(());
            }
            run_daemon(&config, &db_path, script, device).await?;
        }
        Command::KeywordsAdd(keywords) => {
            let mut store = open_keywords(&db_path)?;
            for keyword in keywords {
                if store.add(&keyword)? {
                    println!("Added '{}'", keyword.trim().to_lowercase());
                } else {
                    println!("Skipped '{}' (blank or already present)", keyword);
                }
            }
        }
        Command::KeywordsRemove(keywords) => {
            let mut store = open_keywords(&db_path)?;
            for keyword in keywords {
                if store.remove(&keyword)? {
                    println!("Removed '{}'", keyword.trim().to_lowercase());
                } else {
                    println!("'{}' is not a blocked keyword", keyword);
                }
            }
        }
        Command::KeywordsList => {
            let store = open_keywords(&db_path)?;
            let keywords = store.list();
            if keywords.is_empty() {
                println!("No blocked keywords");
            }
            for keyword in keywords {
                println!("{}", keyword);
            }
        }
        Command::BlockedList => {
            let log = open_block_log(&db_path)?;
            let records = log.list()?;
            if records.is_empty() {
                println!("No blocked calls");
            }
            for record in records {
                let when = record
                    .blocked_at()
                    .map(|at| {
                        at.with_timezone(&chrono::Local)
                            .format("%Y-%m-%d %H:%M:%S")
                            .to_string()
                    })
                    .unwrap_or_else(|| record.timestamp.to_string());
                println!(
                    "{}  {}  {}  {}",
                    when, record.phone_number, record.caller_info, record.reason
                );
            }
        }
        Command::BlockedCount => {
            println!("{}", open_block_log(&db_path)?.count()?);
        }
        Command::BlockedClear => {
            open_block_log(&db_path)?.clear()?;
            println!("Blocked call history cleared");
        }
        Command::BlockedCheck(number) => {
            let log = open_block_log(&db_path)?;
            let records = log.for_number(&number)?;
            if records.is_empty() {
                println!("{}: not blocked", number);
            } else {
                println!("{}: blocked {} time(s)", number, records.len());
            }
        }
        Command::Status(device) => {
            let device = Arc::new(device.build());
            let keywords = open_keywords(&db_path)?;
            let log = open_block_log(&db_path)?;
            let report = DiagnosticsReport::collect(device.as_ref(), device.clone(), &keywords, &log)?;
            print!("{}", report.render());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_screener::RingerDevice;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_status_takes_device_options() {
        let cli = parse_args_from(args(&["status", "--api-level", "26", "--no-policy-access"]));
        let device = match cli.command {
            Command::Status(device) => device,
            other => panic!("unexpected command: {:?}", other),
        };
        assert_eq!(
            device,
            DeviceOptions {
                api_level: 26,
                policy_access: false
            }
        );

        let built = Arc::new(device.build());
        let keywords = KeywordStore::open(Box::new(screening_store::MemorySetStore::new())).unwrap();
        let log = BlockLog::new(Box::new(screening_store::MemorySetStore::new()));
        let report = DiagnosticsReport::collect(built.as_ref(), built.clone(), &keywords, &log).unwrap();
        assert!(!report.policy_access);
        assert_eq!(report.terminator, "legacy-telephony");
        assert!(report.render().contains("✗ Missing"));
        assert!(report.render().contains("legacy-telephony (API level 26)"));
    }

    #[test]
    fn test_status_defaults() {
        let cli = parse_args_from(args(&["--db", "/tmp/screener.db", "status"]));
        assert_eq!(cli.command, Command::Status(DeviceOptions::default()));
        assert_eq!(cli.db_path, Some(PathBuf::from("/tmp/screener.db")));
        assert!(DeviceOptions::default().build().has_policy_access());
    }

    #[test]
    fn test_config_init() {
        let cli = parse_args_from(args(&["-c", "/tmp/screener.toml", "config", "init"]));
        assert_eq!(cli.command, Command::ConfigInit);
        assert_eq!(cli.config_path, Some(PathBuf::from("/tmp/screener.toml")));
    }

    #[test]
    fn test_run_options() {
        let cli = parse_args_from(args(&["run", "--script", "calls.jsonl", "--api-level", "30"]));
        assert_eq!(
            cli.command,
            Command::Run {
                script: Some(PathBuf::from("calls.jsonl")),
                device: DeviceOptions {
                    api_level: 30,
                    policy_access: true
                },
            }
        );
    }
}
