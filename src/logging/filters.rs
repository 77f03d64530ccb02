use tracing_subscriber::EnvFilter;

use crate::logging::config::LoggingConfig;

/// `RUST_LOG` wins when set; otherwise the directive built from the config.
pub fn build_filter_from_config(config: &LoggingConfig) -> EnvFilter {
    match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => filter_from_directive(&config.build_filter_directive()),
    }
}

/// Parses `directive`, falling back to `warn` when `EnvFilter` rejects it.
pub(crate) fn filter_from_directive(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter directive {directive:?}: {e}; falling back to 'warn'");
        EnvFilter::new("warn")
    })
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tracing_subscriber::{filter::LevelFilter, fmt, prelude::*, registry::Registry};

    use super::*;

    /// In-memory writer for capturing formatted output.
    struct VecMakeWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for VecMakeWriter {
        type Writer = VecWriterGuard;

        fn make_writer(&'a self) -> Self::Writer {
            VecWriterGuard(self.0.clone())
        }
    }

    struct VecWriterGuard(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for VecWriterGuard {
        fn write(
            &mut self,
            buf: &[u8],
        ) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// A target with an unknown level is a parse error, not a target name.
    #[test]
    fn test_invalid_directive_is_rejected_by_envfilter() {
        assert!(EnvFilter::try_new("rdbstream=notalevel").is_err());
    }

    #[test]
    fn test_invalid_directive_falls_back_to_warn() {
        let cfg = LoggingConfig {
            level: "trace".to_string(),
            directives: vec!["rdbstream=notalevel".to_string()],
            ..LoggingConfig::default()
        };
        let filter = filter_from_directive(&cfg.build_filter_directive());
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_valid_directive_is_kept() {
        let filter = filter_from_directive("info,rdbstream::rdb::loader=trace");
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_build_filter_from_config_does_not_panic() {
        let cfg = LoggingConfig {
            level: "info".to_string(),
            directives: vec!["rdbstream=notalevel".to_string()],
            ..LoggingConfig::default()
        };
        let _filter = build_filter_from_config(&cfg);
    }

    /// A `warn` directive drops info events and keeps warnings.
    #[test]
    fn test_envfilter_filters_levels() {
        let filter = EnvFilter::try_new("warn").unwrap();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let layer = fmt::layer()
            .with_writer(VecMakeWriter(buffer.clone()))
            .with_filter(filter);
        let subscriber = Registry::default().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("filtered info message");
            tracing::warn!("visible warn message");
        });

        let out = buffer.lock().unwrap();
        let s = String::from_utf8_lossy(&out);
        assert!(s.contains("visible warn message"));
        assert!(!s.contains("filtered info message"));
    }
}
