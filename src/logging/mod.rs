pub mod config;
mod filters;

pub use config::{LogFormat, LoggingConfig, LoggingConfigError};
use tracing_subscriber::fmt;

/// Installs the global `tracing` subscriber. Output goes to stderr so that
/// stdout stays free for command output.
pub fn init_logging(
    mut config: LoggingConfig
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    config.apply_env_overrides();
    config.validate()?;

    let filter = filters::build_filter_from_config(&config);
    match config.format {
        LogFormat::Pretty => fmt()
            .pretty()
            .with_env_filter(filter)
            .with_ansi(config.ansi)
            .with_target(config.with_target)
            .with_writer(std::io::stderr)
            .try_init()?,
        LogFormat::Compact => fmt()
            .compact()
            .with_env_filter(filter)
            .with_ansi(config.ansi)
            .with_target(config.with_target)
            .with_writer(std::io::stderr)
            .try_init()?,
        LogFormat::Json => fmt()
            .json()
            .with_env_filter(filter)
            .with_target(config.with_target)
            .with_writer(std::io::stderr)
            .try_init()?,
    }

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.level,
        format = %config.format,
        "logging initialized"
    );
    Ok(())
}
