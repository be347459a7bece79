//! Production configuration system
//!
//! Provides centralized configuration management with:
//! - Environment variable support
//! - Config file loading (optional)
//! - Runtime defaults
//! - Validation and type safety

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::fs;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Largest tail window accepted for a single read
const MAX_TAIL_BYTES: u64 = 1024 * 1024;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// File locations
    pub paths: PathsConfig,

    /// Transcript scanning configuration
    pub detection: DetectionConfig,

    /// Engine timers and channel sizing
    pub live: LiveConfig,

    /// External usage hook
    pub hook: HookConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub claude_home: PathBuf,
    /// Transcript directory, watched recursively
    pub projects_dir: PathBuf,
    /// Usage summary written by the collector hook
    pub status_file: PathBuf,
    /// Limit history owned by this crate
    pub limits_file: PathBuf,
    pub log_directory: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub transcript_extension: String,
    pub rate_limit_tail_bytes: u64,
    pub reset_tail_bytes: u64,
    /// Reset estimate used when a limit message names no reset time
    pub fallback_reset_hours: i64,
    /// Minimum gap between a limit and the response that counts as recovery
    pub reset_debounce_secs: i64,
    /// A rate-limit line contains one of these (case-insensitive)
    pub rate_limit_markers: Vec<String>,
    /// ...and one of these (case-insensitive)
    pub error_markers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub poll_interval_secs: u64,
    pub countdown_tick_ms: u64,
    pub refill_duration_ms: u64,
    pub refill_steps_per_sec: u64,
    pub ready_dwell_ms: u64,
    /// Buffer size for the engine's message channel
    pub channel_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HookConfig {
    pub enabled: bool,
    pub program: String,
    pub args: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "WARN".to_string(),
            format: "pretty".to_string(),
            output: "console".to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self::rooted_at(
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".claude"),
        )
    }
}

impl PathsConfig {
    /// Derive every path from a Claude home directory
    pub fn rooted_at(claude_home: PathBuf) -> Self {
        Self {
            projects_dir: claude_home.join("projects"),
            status_file: claude_home.join("token_status.json"),
            limits_file: claude_home.join("token_limits.json"),
            log_directory: claude_home.join("logs"),
            claude_home,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            transcript_extension: "jsonl".to_string(),
            rate_limit_tail_bytes: 8 * 1024,
            reset_tail_bytes: 4 * 1024,
            fallback_reset_hours: 5,
            reset_debounce_secs: 5,
            rate_limit_markers: vec![
                "rate_limit".to_string(),
                "usage limit".to_string(),
                "limit reached".to_string(),
            ],
            error_markers: vec!["isApiErrorMessage".to_string(), "\"error\"".to_string()],
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 3,
            countdown_tick_ms: 1000,
            refill_duration_ms: 1500,
            refill_steps_per_sec: 20,
            ready_dwell_ms: 2000,
            channel_buffer: 256,
        }
    }
}

impl Default for HookConfig {
    fn default() -> Self {
        let script = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".claude")
            .join("scripts")
            .join("token_tracker.py");
        Self {
            enabled: true,
            program: "python3".to_string(),
            args: vec![script.to_string_lossy().into_owned()],
        }
    }
}

impl Config {
    /// Load configuration from environment, file, and defaults
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        // Try to load from config file if it exists
        let config_paths = [
            PathBuf::from("claude-tokens.toml"),
            PathBuf::from(".claude-tokens.toml"),
            dirs::config_dir()
                .map(|d| d.join("claude-tokens").join("config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.is_file() {
                info!(config_file = %path.display(), "Loading configuration from file");
                config = Self::load_from_file(path)?;
                break;
            }
        }

        // Override with environment variables
        config.apply_env_overrides()?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML file
    #[cfg(feature = "basic")]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    #[cfg(not(feature = "basic"))]
    pub fn load_from_file(path: &Path) -> Result<Self> {
        warn!(config_file = %path.display(), "Config file support disabled, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        // Logging overrides
        if let Ok(val) = env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        if let Ok(val) = env::var("LOG_OUTPUT") {
            self.logging.output = val;
        }

        // Path overrides; CLAUDE_HOME re-roots everything, specific ones win
        if let Ok(val) = env::var("CLAUDE_HOME") {
            self.paths = PathsConfig::rooted_at(PathBuf::from(val));
        }
        if let Ok(val) = env::var("CLAUDE_TOKENS_PROJECTS_DIR") {
            self.paths.projects_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_TOKENS_STATUS_FILE") {
            self.paths.status_file = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_TOKENS_LIMITS_FILE") {
            self.paths.limits_file = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CLAUDE_TOKENS_LOG_DIR") {
            self.paths.log_directory = PathBuf::from(val);
        }

        // Timing overrides
        if let Ok(val) = env::var("CLAUDE_TOKENS_POLL_INTERVAL_SECS") {
            self.live.poll_interval_secs = val.parse()
                .context("Invalid CLAUDE_TOKENS_POLL_INTERVAL_SECS")?;
        }
        if let Ok(val) = env::var("CLAUDE_TOKENS_FALLBACK_RESET_HOURS") {
            self.detection.fallback_reset_hours = val.parse()
                .context("Invalid CLAUDE_TOKENS_FALLBACK_RESET_HOURS")?;
        }
        if let Ok(val) = env::var("CLAUDE_TOKENS_RESET_DEBOUNCE_SECS") {
            self.detection.reset_debounce_secs = val.parse()
                .context("Invalid CLAUDE_TOKENS_RESET_DEBOUNCE_SECS")?;
        }

        // Hook overrides
        if let Ok(val) = env::var("CLAUDE_TOKENS_HOOK_ENABLED") {
            self.hook.enabled = val.parse()
                .context("Invalid CLAUDE_TOKENS_HOOK_ENABLED")?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        for (name, bytes) in [
            ("rate_limit_tail_bytes", detection.rate_limit_tail_bytes),
            ("reset_tail_bytes", detection.reset_tail_bytes),
        ] {
            if bytes == 0 || bytes > MAX_TAIL_BYTES {
                return Err(anyhow::anyhow!(
                    "{} must be between 1 and {} bytes, got {}",
                    name,
                    MAX_TAIL_BYTES,
                    bytes
                ));
            }
        }

        if detection.transcript_extension.trim_start_matches('.').is_empty() {
            return Err(anyhow::anyhow!("Transcript extension cannot be empty"));
        }

        if detection.rate_limit_markers.is_empty() || detection.error_markers.is_empty() {
            return Err(anyhow::anyhow!("Rate-limit and error marker lists cannot be empty"));
        }

        if detection.fallback_reset_hours <= 0 {
            return Err(anyhow::anyhow!("Fallback reset hours must be greater than 0"));
        }

        if detection.reset_debounce_secs < 0 {
            return Err(anyhow::anyhow!("Reset debounce cannot be negative"));
        }

        // Validate timers
        if self.live.poll_interval_secs == 0 {
            return Err(anyhow::anyhow!("Poll interval must be greater than 0"));
        }

        if self.live.countdown_tick_ms == 0 {
            return Err(anyhow::anyhow!("Countdown tick must be greater than 0"));
        }

        if self.live.refill_duration_ms == 0 || self.live.refill_steps_per_sec == 0 {
            return Err(anyhow::anyhow!("Refill duration and step rate must be greater than 0"));
        }

        if self.live.channel_buffer == 0 {
            return Err(anyhow::anyhow!("Channel buffer must be greater than 0"));
        }

        if self.hook.enabled && self.hook.program.trim().is_empty() {
            return Err(anyhow::anyhow!("Hook is enabled but no program is configured"));
        }

        if !self.paths.projects_dir.exists() {
            warn!(
                projects_dir = %self.paths.projects_dir.display(),
                "Transcript directory does not exist yet"
            );
        }

        Ok(())
    }

    /// Create the log directory when file logging is requested
    pub fn ensure_log_directory(&self) -> Result<()> {
        if matches!(self.logging.output.as_str(), "file" | "both")
            && !self.paths.log_directory.exists()
        {
            fs::create_dir_all(&self.paths.log_directory)
                .context("Failed to create log directory")?;
        }
        Ok(())
    }

    /// Save current configuration to file
    #[cfg(feature = "basic")]
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!(path = %path.display(), "Configuration saved to file");

        Ok(())
    }
}

/// Global configuration instance
static CONFIG: OnceLock<Config> = OnceLock::new();

/// Install the configuration used by [`get_config`]. Returns false if one was
/// already installed.
pub fn init_config(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

/// Get the global configuration instance, loading it on first use
pub fn get_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        Config::load().unwrap_or_else(|e| {
            eprintln!("Invalid configuration ({:#}), using defaults", e);
            Config::default()
        })
    })
}
