use dotenvy::dotenv;
use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,

    /// Bounded parallelism for per-employee reconciliation work.
    pub worker_count: usize,
    /// Minutes past the allowed-in time before a day is classified Late.
    pub late_threshold_minutes: i64,
    /// Site wall-clock offset from UTC, minutes. Devices stamp punches in
    /// site-local time; 330 is the legacy deployments' IST default.
    pub tz_offset_minutes: i32,

    /// Live hardware-log mirror table.
    pub punch_table: String,
    /// Archival/partitioned tables; may not exist for every period.
    pub archive_punch_tables: Vec<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),

            worker_count: env::var("WORKER_COUNT")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap(),
            late_threshold_minutes: env::var("LATE_THRESHOLD_MIN")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap(),
            tz_offset_minutes: env::var("TZ_OFFSET_MIN")
                .unwrap_or_else(|_| "330".to_string()) // IST
                .parse()
                .unwrap(),

            punch_table: env::var("PUNCH_TABLE").unwrap_or_else(|_| "raw_device_logs".to_string()),
            archive_punch_tables: env::var("ARCHIVE_PUNCH_TABLES")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }
}
