//! `moneycontrol` command-line entry point.
//!
//! # Responsibility
//! - Parse commands and route them to `ItemService`.
//! - Own process-level setup: configuration, logging, store connection.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use log::info;
use moneycontrol_core::db::open_db;
use moneycontrol_core::{
    init_logging, AppConfig, ItemListQuery, ItemRepository, ItemService, SortOrder,
    SqliteItemRepository,
};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "moneycontrol", version, about = "Keep a list of timestamped items")]
struct Cli {
    /// Item store file; overrides MONEYCONTROL_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add an item stamped with the current time, or with --at.
    Add {
        /// RFC 3339 instant, e.g. 2025-01-01T00:00:00Z.
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<Utc>>,
    },
    /// List items ordered by timestamp.
    List {
        /// Newest first.
        #[arg(long)]
        desc: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long, default_value_t = 0)]
        offset: u32,
        /// Inclusive lower bound.
        #[arg(long, value_parser = parse_instant)]
        from: Option<DateTime<Utc>>,
        /// Exclusive upper bound.
        #[arg(long, value_parser = parse_instant)]
        until: Option<DateTime<Utc>>,
    },
    /// Replace the timestamp of an item.
    Set {
        id: Uuid,
        #[arg(value_parser = parse_instant)]
        timestamp: DateTime<Utc>,
    },
    /// Delete one or more items; all or nothing.
    Delete {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Print version, store location and item count.
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::from_env();
    if let Some(db) = cli.db {
        config.db_path = db;
    }

    // Logging is best-effort; the command still runs without it.
    if let Err(err) = init_logging(&config.log_level, &config.log_dir.to_string_lossy()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let conn = open_db(&config.db_path).with_context(|| {
        format!(
            "failed to open item store at `{}`",
            config.db_path.display()
        )
    })?;
    let repo = SqliteItemRepository::try_new(&conn).context("item store schema check failed")?;
    let mut service = ItemService::new(repo);

    run(cli.command, &mut service, &config)
}

fn run<R: ItemRepository>(
    command: Command,
    service: &mut ItemService<R>,
    config: &AppConfig,
) -> Result<()> {
    match command {
        Command::Add { at } => {
            let id = match at {
                Some(timestamp) => service.add_item_at(timestamp),
                None => service.add_item_now(),
            }
            .context("failed to add item")?;
            info!("event=cli_add module=cli status=ok item_id={id}");
            println!("{id}");
        }
        Command::List {
            desc,
            limit,
            offset,
            from,
            until,
        } => {
            let query = ItemListQuery {
                from,
                until,
                order: if desc {
                    SortOrder::Descending
                } else {
                    SortOrder::Ascending
                },
                limit,
                offset,
            };
            for record in service.query_items(&query).context("failed to list items")? {
                println!("{}\t{}", record.id, format_instant(record.timestamp()));
            }
        }
        Command::Set { id, timestamp } => {
            service
                .retime_item(id, timestamp)
                .with_context(|| format!("failed to update item {id}"))?;
            info!("event=cli_set module=cli status=ok item_id={id}");
        }
        Command::Delete { ids } => {
            let summary = service
                .delete_items(&ids)
                .context("failed to delete items")?;
            info!(
                "event=cli_delete module=cli status=ok deleted={}",
                summary.deleted
            );
        }
        Command::Status => {
            let count = service
                .count_items(&ItemListQuery::default())
                .context("failed to count items")?;
            println!("core_version={}", moneycontrol_core::core_version());
            println!("db_path={}", config.db_path.display());
            println!("items={count}");
        }
    }

    Ok(())
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|err| format!("expected an RFC 3339 instant: {err}"))
}

fn format_instant(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
