use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::domain::order::TransitionPolicy;
use crate::notifications::DebounceSettings;

/// Order lifecycle service with real-time fan-out to connected viewers.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// HTTP port
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// PostgreSQL connection string; orders are kept in memory when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// `permissive` accepts any target status, `forward-only` rejects moving back
    #[arg(long, env = "TRANSITION_POLICY", default_value_t = TransitionPolicy::Permissive)]
    pub transition_policy: TransitionPolicy,

    /// Events buffered per subscriber before the oldest are dropped
    #[arg(long, env = "BROADCAST_CAPACITY", default_value_t = 256)]
    pub broadcast_capacity: usize,

    #[arg(long, env = "HIGHLIGHT_WINDOW_SECS", default_value_t = 5)]
    pub highlight_window_secs: u64,

    #[arg(long, env = "COOLDOWN_MILLIS", default_value_t = 1000)]
    pub cooldown_millis: u64,

    /// Directory holding one alert preference file per viewer session
    #[arg(long, env = "PREFERENCES_DIR", default_value = ".alert-preferences")]
    pub preferences_dir: PathBuf,

    /// Attach a log-backed viewer session that announces new orders
    #[arg(long, env = "CONSOLE_ALERTS", default_value_t = false)]
    pub console_alerts: bool,

    /// JSON array of catalog items loaded at start-up
    #[arg(long, env = "SEED_CATALOG")]
    pub seed_catalog: Option<PathBuf>,

    #[arg(long, env = "HEALTH_INTERVAL_SECS", default_value_t = 10)]
    pub health_interval_secs: u64,
}

impl Config {
    pub fn debounce(&self) -> DebounceSettings {
        DebounceSettings {
            highlight_window: Duration::from_secs(self.highlight_window_secs),
            cooldown: Duration::from_millis(self.cooldown_millis),
        }
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs.max(1))
    }
}
