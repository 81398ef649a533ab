use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub encyclopedia: EncyclopediaConfig,

    /// Directory for rolling log files. Logs go to journald or stderr when unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// File the settings were read from, if one existed.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,

    /// Settings that were rejected while loading. Loading happens before
    /// logging is set up, so the caller reports these afterwards.
    #[serde(skip)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Secret used to sign session cookies. A random one is generated when unset,
    /// which logs everyone out on restart.
    #[serde(default)]
    pub session_secret: Option<String>,

    #[serde(default = "default_session_max_age_hours")]
    pub session_max_age_hours: u32,

    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_session_max_age_hours() -> u32 {
    24 * 7
}

fn default_max_upload_bytes() -> usize {
    16 * 1024 * 1024 // 16MB
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            session_secret: None,
            session_max_age_hours: default_session_max_age_hours(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory holding the database file.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Database name; the file is `<name>.db` inside `data_dir`.
    #[serde(default = "default_db_name")]
    pub name: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("naturelog")
}

fn default_db_name() -> String {
    "naturelog".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            name: default_db_name(),
        }
    }
}

impl DatabaseConfig {
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.db", self.name))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// PBKDF2 rounds for newly hashed passwords. Existing hashes keep the
    /// count they were created with.
    #[serde(default = "default_password_iterations")]
    pub password_iterations: u32,
}

fn default_password_iterations() -> u32 {
    600_000
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            password_iterations: default_password_iterations(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncyclopediaConfig {
    /// Base URL of the summary endpoint; the species title is appended.
    #[serde(default = "default_encyclopedia_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_encyclopedia_timeout_secs")]
    pub timeout_secs: u64,

    /// Cached summaries older than this are fetched again.
    #[serde(default = "default_encyclopedia_ttl_days")]
    pub ttl_days: i64,
}

fn default_encyclopedia_endpoint() -> String {
    "https://en.wikipedia.org/api/rest_v1/page/summary".to_string()
}

fn default_encyclopedia_timeout_secs() -> u64 {
    5
}

fn default_encyclopedia_ttl_days() -> i64 {
    30
}

/// Upper bound for `ttl_days`, a century.
const MAX_TTL_DAYS: i64 = 36_500;

impl Default for EncyclopediaConfig {
    fn default() -> Self {
        Self {
            endpoint: default_encyclopedia_endpoint(),
            timeout_secs: default_encyclopedia_timeout_secs(),
            ttl_days: default_encyclopedia_ttl_days(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            security: SecurityConfig::default(),
            encyclopedia: EncyclopediaConfig::default(),
            log_dir: None,
            loaded_from: None,
            warnings: Vec::new(),
        }
    }
}

impl Config {
    /// Load from the default location (or `NATURELOG_CONFIG`), then apply
    /// environment overrides. A missing file means defaults.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("NATURELOG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| Self::config_path());
        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            let mut config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))?;
            config.loaded_from = Some(path.to_path_buf());
            config
        } else {
            Config::default()
        };

        let mut warnings = config.apply_env();
        warnings.extend(config.validate());
        config.warnings = warnings;
        Ok(config)
    }

    /// Environment variables take precedence over the file. Returns a
    /// message for each variable that was set but could not be used.
    pub fn apply_env(&mut self) -> Vec<String> {
        let mut rejected = Vec::new();
        if let Some(dir) = env_var("NATURELOG_DATA_DIR") {
            self.database.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = env_var("NATURELOG_DB_NAME") {
            self.database.name = name;
        }
        if let Some(secret) = env_var("NATURELOG_SESSION_SECRET") {
            self.server.session_secret = Some(secret);
        }
        if let Some(port) = env_parse("NATURELOG_PORT", &mut rejected) {
            self.server.port = port;
        }
        if let Some(max) = env_parse("NATURELOG_MAX_UPLOAD_BYTES", &mut rejected) {
            self.server.max_upload_bytes = max;
        }
        if let Some(dir) = env_var("NATURELOG_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
        rejected
    }

    /// Reset out-of-range values to their defaults, returning a message
    /// for each one.
    pub fn validate(&mut self) -> Vec<String> {
        let mut rejected = Vec::new();
        if !(1..=MAX_TTL_DAYS).contains(&self.encyclopedia.ttl_days) {
            rejected.push(format!(
                "encyclopedia.ttl_days must be between 1 and {MAX_TTL_DAYS}, got {}; using {}",
                self.encyclopedia.ttl_days,
                default_encyclopedia_ttl_days()
            ));
            self.encyclopedia.ttl_days = default_encyclopedia_ttl_days();
        }
        rejected
    }

    /// Emit what happened while loading. Call once logging is initialized.
    pub fn log_load_report(&self) {
        match &self.loaded_from {
            Some(path) => info!("Loaded config from {:?}", path),
            None => info!("No config file found, using defaults"),
        }
        for warning in &self.warnings {
            warn!("{warning}");
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("naturelog")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, rejected: &mut Vec<String>) -> Option<T>
where
    T::Err: Display,
{
    let raw = env_var(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            rejected.push(format!("Invalid {key} value {raw:?}: {e}, ignoring"));
            None
        }
    }
}
