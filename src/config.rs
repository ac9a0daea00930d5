use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::media::MediaStrategy;

/// Remote HibiAPI daemon used when nothing else is configured.
pub const DEFAULT_REMOTE: &str = "https://api.obfs.dev/api/tieba";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Where a finished thread document goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// `<output_dir>/<sanitized title>.html`
    File,
    /// Standard output; media directories are still written under `output_dir`.
    Stdout,
}

/// Run configuration, read-only once the pipeline starts.
#[derive(Debug, Clone)]
pub struct Config {
    // Remote daemon
    pub remote: String,
    pub request_timeout: Duration,

    // Transport
    pub retry_interval: Duration,
    /// Attempts per request; `0` means retry forever.
    pub max_attempts: u32,

    // Content
    pub media: MediaStrategy,
    pub fetch_subposts: bool,
    pub overwrite_media: bool,

    // Output
    pub output_dir: PathBuf,
    pub output: OutputTarget,

    // Console
    pub quiet: bool,
    pub verbose: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Remote daemon
            remote: env_or_default("TIEBA_REMOTE", DEFAULT_REMOTE),
            request_timeout: Duration::from_secs(parse_env_u64("TIEBA_TIMEOUT_SECS", 30)?),

            // Transport
            retry_interval: Duration::from_millis(parse_env_u64("TIEBA_RETRY_INTERVAL_MS", 0)?),
            max_attempts: parse_env_u32("TIEBA_MAX_ATTEMPTS", 3)?,

            // Content
            media: parse_media_strategy(&env_or_default("TIEBA_MEDIA", "local"))?,
            fetch_subposts: !parse_env_bool("TIEBA_NO_SUBPOSTS", false)?,
            overwrite_media: parse_env_bool("TIEBA_OVERWRITE_MEDIA", false)?,

            // Output
            output_dir: PathBuf::from(env_or_default("TIEBA_OUTPUT_DIR", ".")),
            output: OutputTarget::File,

            // Console
            quiet: false,
            verbose: false,
        })
    }

    /// Configuration pointing at a mock remote, with no retry delay.
    #[must_use]
    pub fn for_testing(remote: &str) -> Self {
        Self {
            remote: remote.to_string(),
            request_timeout: Duration::from_secs(5),
            retry_interval: Duration::ZERO,
            max_attempts: 3,
            media: MediaStrategy::Skip,
            fetch_subposts: true,
            overwrite_media: false,
            output_dir: PathBuf::from("."),
            output: OutputTarget::File,
            quiet: true,
            verbose: false,
        }
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "TIEBA_REMOTE".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        match url::Url::parse(&self.remote) {
            Ok(u) if matches!(u.scheme(), "http" | "https") => {}
            Ok(u) => {
                return Err(ConfigError::InvalidValue {
                    name: "TIEBA_REMOTE".to_string(),
                    message: format!("unsupported scheme '{}'", u.scheme()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    name: "TIEBA_REMOTE".to_string(),
                    message: e.to_string(),
                })
            }
        }
        if self.quiet && self.verbose {
            return Err(ConfigError::InvalidValue {
                name: "quiet/verbose".to_string(),
                message: "cannot be both quiet and verbose".to_string(),
            });
        }
        Ok(())
    }
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}

fn parse_media_strategy(value: &str) -> Result<MediaStrategy, ConfigError> {
    match value.to_lowercase().as_str() {
        "skip" | "none" => Ok(MediaStrategy::Skip),
        "embed" => Ok(MediaStrategy::Embed),
        "local" => Ok(MediaStrategy::LocalDownload),
        _ => Err(ConfigError::InvalidValue {
            name: "TIEBA_MEDIA".to_string(),
            message: format!("must be 'skip', 'embed' or 'local', got '{value}'"),
        }),
    }
}
