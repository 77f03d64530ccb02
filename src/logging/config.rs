use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding [`LoggingConfig::level`].
pub const ENV_LOG_LEVEL: &str = "RDBSTREAM_LOG";
/// Environment variable overriding [`LoggingConfig::format`].
pub const ENV_LOG_FORMAT: &str = "RDBSTREAM_LOG_FORMAT";

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Output format of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    #[default]
    Compact,
    /// One JSON object per line.
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoggingConfigError {
    #[error("unknown log level {0:?} (expected one of trace, debug, info, warn, error, off)")]
    InvalidLevel(String),
    #[error("unknown log format {0:?} (expected pretty, compact or json)")]
    InvalidFormat(String),
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for every target.
    pub level: String,
    pub format: LogFormat,
    /// Colored output.
    pub ansi: bool,
    /// Include the event target (module path).
    pub with_target: bool,
    /// Extra `EnvFilter` directives, e.g. `rdbstream::rdb::loader=trace`.
    pub directives: Vec<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Compact,
            ansi: true,
            with_target: false,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Applies `RDBSTREAM_LOG` and `RDBSTREAM_LOG_FORMAT`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an
    /// explicit variable lookup. An unparsable format is ignored.
    pub fn apply_overrides_from<F>(
        &mut self,
        lookup: F,
    ) where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.level = level.trim().to_ascii_lowercase();
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            if let Ok(format) = format.parse() {
                self.format = format;
            }
        }
    }

    pub fn validate(&self) -> Result<(), LoggingConfigError> {
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(LoggingConfigError::InvalidLevel(self.level.clone()));
        }
        Ok(())
    }

    /// `EnvFilter` directive string: the default level followed by the extra
    /// directives.
    pub fn build_filter_directive(&self) -> String {
        std::iter::once(self.level.as_str())
            .chain(self.directives.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Level derived from the CLI's `-v`/`-q` counters: each `-v` lowers the
    /// threshold one step starting from `warn`, `-q` silences everything.
    pub fn with_verbosity(
        mut self,
        verbose: u8,
        quiet: bool,
    ) -> Self {
        if quiet {
            self.level = "off".to_string();
        } else if verbose > 0 {
            self.level = match verbose {
                1 => "info",
                2 => "debug",
                _ => "trace",
            }
            .to_string();
        }
        self
    }
}

impl FromStr for LogFormat {
    type Err = LoggingConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(LoggingConfigError::InvalidFormat(other.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        };
        f.write_str(s)
    }
}
