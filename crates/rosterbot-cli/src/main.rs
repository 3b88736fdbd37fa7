//! rosterbot - operator CLI for the roster promotion and scoring engine.
//!
//! Runs the bot's commands against the live roster sheet (when
//! `SHEETS_ACCESS_TOKEN` is set) or against the local roster snapshot,
//! printing chat output to the console.

mod console;
mod snapshot;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use rosterbot_core::{
    Commands, EngineConfig, Invocation, Member, RankLadder, Reply, SheetsClient, TabularStore,
};

use console::ConsoleChat;
use snapshot::{SnapshotCache, SnapshotStore};

// ============================================================================
// Constants
// ============================================================================

/// Bearer token for the Sheets API; absent means offline snapshot mode
const TOKEN_ENV: &str = "SHEETS_ACCESS_TOKEN";

const USAGE: &str = "\
Usage: rosterbot <command>

Commands:
  ladder                 Print the rank ladder
  promote                Run promotions
  audit <file>           Score a battle log file
  stats <member-id>      Show one member's rank and record
  import <members.json>  Import server members into the roster";

/// Initialize the tracing subscriber: stderr plus a daily log file.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "rosterbot.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

enum Backend {
    Sheets(SheetsClient),
    Snapshot(SnapshotStore),
}

impl Backend {
    fn store(&self) -> &dyn TabularStore {
        match self {
            Backend::Sheets(client) => client,
            Backend::Snapshot(store) => store,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = EngineConfig::load()?;
    let cache_dir = config
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    let log_dir = cache_dir.join("logs");
    let _guard = init_tracing(std::fs::create_dir_all(&log_dir).ok().map(|_| log_dir.as_path()));
    info!(command = %args[1], "rosterbot starting");

    let cache = SnapshotCache::new(cache_dir)?;
    let backend = match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            Backend::Sheets(SheetsClient::new(token.trim().to_string(), &config.sheet)?)
        }
        _ => {
            let (store, age) = SnapshotStore::open(cache, &config.sheet.ladder_range)?;
            eprintln!("Using roster snapshot from {}", age);
            Backend::Snapshot(store)
        }
    };

    let result = run(&args[1..], &config, &backend).await;

    if let Backend::Snapshot(store) = &backend {
        if store.write_count() > 0 {
            store.flush()?;
        }
    }
    result
}

async fn run(args: &[String], config: &EngineConfig, backend: &Backend) -> Result<()> {
    let store = backend.store();
    let command = args[0].as_str();
    let arg = args.get(1).map(String::as_str);

    match (command, arg) {
        ("ladder", _) => print_ladder(store, config).await,
        ("promote", None) => {
            let chat = ConsoleChat::new(cached_members(backend)?);
            let reply = Commands::new(store, &chat, config)
                .run_promotions(&operator(config))
                .await;
            print_reply(&reply);
            save_members(backend, &chat)
        }
        ("audit", Some(file)) => {
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read audit file: {}", file))?;
            let chat = ConsoleChat::new(cached_members(backend)?);
            let reply = Commands::new(store, &chat, config)
                .audit(&operator(config), &raw)
                .await;
            print_reply(&reply);
            Ok(())
        }
        ("stats", Some(member_id)) => {
            let chat = ConsoleChat::new(Vec::new());
            let reply = Commands::new(store, &chat, config)
                .stats(&operator(config), member_id)
                .await;
            print_reply(&reply);
            Ok(())
        }
        ("import", Some(file)) => {
            let contents = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read member list: {}", file))?;
            let members: Vec<Member> = serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse member list: {}", file))?;
            let chat = ConsoleChat::new(members);
            let reply = Commands::new(store, &chat, config)
                .import_members(&operator(config), |status| eprintln!("{}", status))
                .await;
            print_reply(&reply);
            save_members(backend, &chat)
        }
        _ => {
            eprintln!("{}", USAGE);
            anyhow::bail!("Unknown command or missing argument: {}", args.join(" "))
        }
    }
}

/// The operator holds every permission the commands check.
fn operator(config: &EngineConfig) -> Invocation {
    Invocation {
        invoker: Member {
            id: "operator".to_string(),
            username: "operator".to_string(),
            nickname: None,
            roles: vec![config.roles.admin.clone(), config.roles.high_command.clone()],
            bot: false,
        },
        channel_name: config.channels.enlistment.clone(),
    }
}

fn cached_members(backend: &Backend) -> Result<Vec<Member>> {
    match backend {
        Backend::Snapshot(store) => Ok(store
            .cache()
            .load_members()?
            .map(|cached| cached.data)
            .unwrap_or_default()),
        Backend::Sheets(_) => Ok(Vec::new()),
    }
}

fn save_members(backend: &Backend, chat: &ConsoleChat) -> Result<()> {
    if let Backend::Snapshot(store) = backend {
        store.cache().save_members(&chat.members())?;
    }
    Ok(())
}

async fn print_ladder(store: &dyn TabularStore, config: &EngineConfig) -> Result<()> {
    let ladder = RankLadder::load(store, &config.sheet.ladder_range).await?;
    for (i, rank) in ladder.ranks().iter().enumerate() {
        let requirement = match ladder.requirement(rank) {
            Some(rosterbot_core::Requirement::Points(p)) => p.to_string(),
            Some(rosterbot_core::Requirement::ManualOnly) => "manual only".to_string(),
            None => String::new(),
        };
        println!("{:>3}. {:<24} {}", i + 1, rank, requirement);
    }
    Ok(())
}

fn print_reply(reply: &Reply) {
    println!("{}", reply.content);
}
