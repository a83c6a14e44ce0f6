use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3 * 60 * 60;

// Per-kind penalty weights applied by the sweep.
pub const DEFAULT_TASK_PENALTY: i64 = 2;
pub const DEFAULT_HABIT_PENALTY: i64 = 3;
pub const DEFAULT_ROUTINE_PENALTY: i64 = 5;

/// Top-level config (aura.toml + AURA_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuraConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub penalty: PenaltyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Bearer token required on `/jobs` and `/players` routes. `None` leaves
    /// them open, which is only sensible when bound to loopback.
    #[serde(default)]
    pub operator_token: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            operator_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Which key-value backend holds players and their tracked items.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StoreBackend {
    /// SQLite `kv` table in `database.path`.
    #[default]
    Sqlite,
    /// Process-local map. Nothing survives a restart.
    Memory,
    /// Redis at `store.redis_url` (requires the `redis` cargo feature).
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub redis_url: Option<String>,
}

/// Aura deducted per overdue item, by kind.
///
/// The same weight applies to every item of a kind; the item's own `aura`
/// field does not scale it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PenaltyConfig {
    #[serde(default = "default_task_penalty")]
    pub task: i64,
    #[serde(default = "default_habit_penalty")]
    pub habit: i64,
    #[serde(default = "default_routine_penalty")]
    pub routine: i64,
}

impl PenaltyConfig {
    /// A negative weight would turn the sweep into a reward.
    pub fn validate(&self) -> crate::error::Result<()> {
        let weights = [
            ("task", self.task),
            ("habit", self.habit),
            ("routine", self.routine),
        ];
        for (kind, weight) in weights {
            if weight < 0 {
                return Err(crate::error::AuraError::Config(format!(
                    "penalty.{kind} must not be negative (got {weight})"
                )));
            }
        }
        Ok(())
    }
}

impl Default for PenaltyConfig {
    fn default() -> Self {
        Self {
            task: DEFAULT_TASK_PENALTY,
            habit: DEFAULT_HABIT_PENALTY,
            routine: DEFAULT_ROUTINE_PENALTY,
        }
    }
}

/// When the sweep fires. Mirrors the scheduler's schedule variants that make
/// sense for a recurring job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleConfig {
    Interval { every_secs: u64 },
    Daily { hour: u8, minute: u8 },
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig::Interval {
            every_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Set to false to run the gateway without the background sweep
    /// (manual triggers still work).
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default)]
    pub sweep: ScheduleConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sweep: ScheduleConfig::default(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_task_penalty() -> i64 {
    DEFAULT_TASK_PENALTY
}
fn default_habit_penalty() -> i64 {
    DEFAULT_HABIT_PENALTY
}
fn default_routine_penalty() -> i64 {
    DEFAULT_ROUTINE_PENALTY
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.aura/aura.db", home)
}

impl AuraConfig {
    /// Load config from a TOML file with AURA_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g. `AURA_PENALTY__ROUTINE=8`
    /// or `AURA_GATEWAY__OPERATOR_TOKEN=...`, so single underscores inside
    /// field names survive.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: Self = Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::AuraError::Config(e.to_string()))?;
        config.penalty.validate()?;
        Ok(config)
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("AURA_").split("__"))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.aura/aura.toml", home)
}
