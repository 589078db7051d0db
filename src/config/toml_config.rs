use crate::adapters::cache::{DEFAULT_MAX_ENTRIES, DEFAULT_SWEEP_INTERVAL, DEFAULT_TTL};
use crate::adapters::notify::DEFAULT_QUEUE_CAPACITY;
use crate::utils::error::{RegistryError, Result};
use crate::utils::validation::{validate_path, validate_positive_number, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern compiles"));

pub const IN_MEMORY_DATABASE: &str = ":memory:";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:` for a throwaway store.
    pub path: String,
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "course_registry.db".to_string(),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    pub max_entries: usize,
    /// How often expired lists are swept in the background.
    pub sweep_interval_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_TTL.as_secs(),
            max_entries: DEFAULT_MAX_ENTRIES,
            sweep_interval_seconds: DEFAULT_SWEEP_INTERVAL.as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Deliver on a background task instead of inline.
    pub queued: bool,
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queued: true,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub verbose: bool,
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(|e| RegistryError::Config {
            message: format!("cannot read {}: {}", path.as_ref().display(), e),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| RegistryError::Config {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the variable's value. Unset variables are left as written.
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR_RE
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_seconds)
    }

    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.cache.sweep_interval_seconds)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.database.busy_timeout_ms)
    }

    pub fn is_in_memory(&self) -> bool {
        self.database.path == IN_MEMORY_DATABASE
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_path("database.path", &self.database.path)?;
        validate_positive_number("cache.max_entries", self.cache.max_entries, 1)?;
        validate_positive_number(
            "cache.sweep_interval_seconds",
            self.cache.sweep_interval_seconds as usize,
            1,
        )?;
        if self.notifications.queued {
            validate_positive_number(
                "notifications.queue_capacity",
                self.notifications.queue_capacity,
                1,
            )?;
        }
        Ok(())
    }
}
