use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use dotenvy::dotenv;
use std::env;
use tracing::info;
use tracing_appender::rolling;

mod config;
mod db;
mod error;
mod model;
mod store;
mod sync;

use config::Config;
use db::init_db;
use store::mysql::{MySqlAttendanceStore, MySqlEmployeeDirectory};
use sync::reconcile::{Reconciler, ReconcilerOptions};
use sync::source::{MySqlPunchSource, PunchSource};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Attendance reconciler starting...");

    let pool = init_db(&config.database_url).await;

    // Live mirror first, then archives: dedup keeps the first-seen record,
    // so source order is part of the contract.
    let mut sources: Vec<Box<dyn PunchSource>> = vec![Box::new(MySqlPunchSource::new(
        pool.clone(),
        config.punch_table.clone(),
        config.tz_offset_minutes,
    ))];
    for table in &config.archive_punch_tables {
        sources.push(Box::new(MySqlPunchSource::new(
            pool.clone(),
            table.clone(),
            config.tz_offset_minutes,
        )));
    }

    let reconciler = Reconciler::new(
        MySqlEmployeeDirectory::new(pool.clone()),
        MySqlAttendanceStore::new(
            pool.clone(),
            config.punch_table.clone(),
            config.tz_offset_minutes,
        ),
        sources,
        ReconcilerOptions::from(&config),
    );

    let args: Vec<String> = env::args().skip(1).collect();
    let summary = match args.first().map(String::as_str) {
        Some("sync") => {
            let tenant_id = parse_tenant(args.get(1))?;
            reconciler.sync_incremental(tenant_id).await?
        }
        Some("reconcile") => {
            let tenant_id = parse_tenant(args.get(1))?;
            let start = parse_date(args.get(2).context("start date required (YYYY-MM-DD)")?)?;
            let end = parse_date(args.get(3).context("end date required (YYYY-MM-DD)")?)?;
            let ids: Vec<u64> = args[4..]
                .iter()
                .map(|a| a.parse())
                .collect::<Result<_, _>>()
                .context("employee ids must be numeric")?;
            let subset = if ids.is_empty() {
                None
            } else {
                Some(ids.as_slice())
            };
            reconciler.reconcile(tenant_id, start, end, subset).await?
        }
        _ => bail!(
            "usage: attendance-reconciler sync <tenant_id> | reconcile <tenant_id> <start> <end> [employee_id...]"
        ),
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_tenant(arg: Option<&String>) -> Result<u64> {
    arg.context("tenant id required")?
        .parse()
        .context("tenant id must be numeric")
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date: {}", s))
}
