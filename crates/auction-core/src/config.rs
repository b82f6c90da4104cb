// Configuration loading and parsing (config/auction.toml).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// The stock configuration shipped in `defaults/auction.toml`.
pub const DEFAULT_CONFIG: &str = include_str!("../../../defaults/auction.toml");

const CONFIG_FILE: &str = "auction.toml";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub db_path: String,
    pub storage: StorageConfig,
    pub broadcast: BroadcastConfig,
    pub rules: BidRules,
    pub console: ConsoleConfig,
}

// ---------------------------------------------------------------------------
// auction.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire auction.toml file.
#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    server: ServerConfig,
    database: DatabaseSection,
    storage: StorageConfig,
    broadcast: BroadcastConfig,
    auction: BidRules,
    console: ConsoleConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub public_url: String,
    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub uploads_dir: String,
    pub public_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BroadcastConfig {
    pub host: String,
    pub port: u16,
}

impl BroadcastConfig {
    /// WebSocket URL projectors connect to.
    pub fn url(&self) -> String {
        format!("ws://{}:{}{}", self.host, self.port, crate::hub::CHANNEL_PATH)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsoleConfig {
    pub api_url: String,
}

/// Bidding rules for a live auction session.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BidRules {
    /// Length of the bidding window, reset on every accepted bid.
    pub countdown_secs: u32,
    /// Step applied when a team takes the lead, and the margin every bidder
    /// must be able to afford on top of the current bid.
    pub min_increment: i64,
    /// Fixed one-key raises for the current leader.
    pub quick_increments: Vec<i64>,
    pub custom_increment: CustomIncrement,
}

/// Range of the operator's adjustable raise.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CustomIncrement {
    pub min: i64,
    pub max: i64,
    pub step: i64,
}

impl CustomIncrement {
    pub fn contains(&self, amount: i64) -> bool {
        amount >= self.min && amount <= self.max && (amount - self.min) % self.step == 0
    }

    /// Clamp `amount` into range, snapped down to the step grid.
    pub fn clamp(&self, amount: i64) -> i64 {
        let bounded = amount.clamp(self.min, self.max);
        bounded - (bounded - self.min) % self.step
    }
}

impl Default for BidRules {
    fn default() -> Self {
        BidRules {
            countdown_secs: 60,
            min_increment: 100_000,
            quick_increments: vec![200_000, 500_000, 1_000_000],
            custom_increment: CustomIncrement {
                min: 100_000,
                max: 5_000_000,
                step: 100_000,
            },
        }
    }
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Parse a configuration document. `path` is only used for error messages.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = Config {
        server: file.server,
        db_path: file.database.path,
        storage: file.storage,
        broadcast: file.broadcast,
        rules: file.auction,
        console: file.console,
    };

    validate(&config)?;
    Ok(config)
}

/// Load and validate `config/auction.toml` relative to `base_dir`.
///
/// Does not create missing files; prefer `load_config()` which does.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    parse_config(&text, &path)
}

/// Ensure `config/auction.toml` exists, copying it from `defaults/` or, when
/// there is no defaults directory, writing the built-in default. Returns the
/// files that were created.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let config_dir = base_dir.join("config");
    let target = config_dir.join(CONFIG_FILE);
    if target.exists() {
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let source = base_dir.join("defaults").join(CONFIG_FILE);
    let content = if source.is_file() {
        std::fs::read_to_string(&source).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read {}: {e}", source.display()),
        })?
    } else {
        DEFAULT_CONFIG.to_string()
    };

    match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
    {
        Ok(mut dest) => {
            std::io::Write::write_all(&mut dest, content.as_bytes()).map_err(|e| {
                ConfigError::DefaultsCopyError {
                    message: format!("failed to write {}: {e}", target.display()),
                }
            })?;
            Ok(vec![target])
        }
        // Another process created it between the check and the open.
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(vec![]),
        Err(e) => Err(ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", target.display()),
        }),
    }
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures the config file exists before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db_path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }

    let rules = &config.rules;
    if rules.countdown_secs == 0 {
        return Err(invalid("auction.countdown_secs", "must be greater than 0"));
    }
    if rules.min_increment <= 0 {
        return Err(invalid(
            "auction.min_increment",
            format!("must be > 0, got {}", rules.min_increment),
        ));
    }
    if let Some(bad) = rules.quick_increments.iter().find(|&&i| i < rules.min_increment) {
        return Err(invalid(
            "auction.quick_increments",
            format!("{bad} is below the minimum increment {}", rules.min_increment),
        ));
    }

    let custom = &rules.custom_increment;
    if custom.step <= 0 {
        return Err(invalid("auction.custom_increment.step", "must be > 0"));
    }
    if custom.min < rules.min_increment || custom.max < custom.min {
        return Err(invalid(
            "auction.custom_increment",
            format!(
                "range {}..={} must start at or above the minimum increment {}",
                custom.min, custom.max, rules.min_increment
            ),
        ));
    }

    if config.broadcast.port == 0 {
        return Err(invalid("broadcast.port", "must be a fixed port"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("auction_config_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn default_config_parses() {
        let config = parse_config(DEFAULT_CONFIG, Path::new("defaults/auction.toml")).unwrap();
        assert_eq!(config.server.bind.port(), 3000);
        assert_eq!(config.server.public_url, "http://localhost:3000");
        assert!(config.server.enable_cors);
        assert_eq!(config.db_path, "data/auction.db");
        assert_eq!(config.storage.uploads_dir, "uploads");
        assert_eq!(config.broadcast.port, 9002);
        assert_eq!(config.rules, BidRules::default());
        assert_eq!(config.console.api_url, "http://localhost:3000/api");
    }

    #[test]
    fn broadcast_url_uses_channel_path() {
        let config = parse_config(DEFAULT_CONFIG, Path::new("x")).unwrap();
        assert_eq!(config.broadcast.url(), "ws://127.0.0.1:9002/auction_sync");
    }

    #[test]
    fn ensure_config_files_writes_builtin_default_once() {
        let dir = scratch_dir("builtin");
        let created = ensure_config_files(&dir).unwrap();
        assert_eq!(created, vec![dir.join("config/auction.toml")]);

        // Second call leaves the existing file alone.
        assert!(ensure_config_files(&dir).unwrap().is_empty());
        let config = load_config_from(&dir).unwrap();
        assert_eq!(config.rules.countdown_secs, 60);
    }

    #[test]
    fn ensure_config_files_prefers_defaults_dir() {
        let dir = scratch_dir("defaults_dir");
        fs::create_dir_all(dir.join("defaults")).unwrap();
        let custom = DEFAULT_CONFIG.replace("countdown_secs = 60", "countdown_secs = 30");
        fs::write(dir.join("defaults/auction.toml"), custom).unwrap();

        ensure_config_files(&dir).unwrap();
        let config = load_config_from(&dir).unwrap();
        assert_eq!(config.rules.countdown_secs, 30);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = scratch_dir("missing");
        match load_config_from(&dir) {
            Err(ConfigError::FileNotFound { path }) => {
                assert!(path.ends_with("config/auction.toml"));
            }
            other => panic!("expected FileNotFound, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_names_the_file() {
        let err = parse_config("[server", Path::new("broken.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn zero_countdown_rejected() {
        let text = DEFAULT_CONFIG.replace("countdown_secs = 60", "countdown_secs = 0");
        match parse_config(&text, Path::new("x")) {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "auction.countdown_secs");
            }
            other => panic!("expected ValidationError, got {other:?}"),
        }
    }

    #[test]
    fn quick_increment_below_minimum_rejected() {
        let text = DEFAULT_CONFIG.replace(
            "quick_increments = [200000, 500000, 1000000]",
            "quick_increments = [50000]",
        );
        let err = parse_config(&text, Path::new("x")).unwrap_err();
        assert!(err.to_string().contains("auction.quick_increments"));
    }

    #[test]
    fn custom_increment_snapping() {
        let custom = BidRules::default().custom_increment;
        assert!(custom.contains(300_000));
        assert!(!custom.contains(350_000));
        assert!(!custom.contains(6_000_000));
        assert_eq!(custom.clamp(350_000), 300_000);
        assert_eq!(custom.clamp(10), 100_000);
        assert_eq!(custom.clamp(9_000_000), 5_000_000);
    }
}
