use std::path::Path;

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::{
    logging::LoggingConfig,
    rdb::options::{DEFAULT_MAX_COLLECTION_LEN, DEFAULT_MAX_STRING_LEN},
    DecoderOptions,
};

/// Prefix of environment variables, e.g. `RDBSTREAM_DECODER__VERIFY_CHECKSUM`.
pub const ENV_PREFIX: &str = "RDBSTREAM";

/// Settings of the command line tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub decoder: DecoderOptions,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads defaults, then the optional file, then `RDBSTREAM_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(
        path: Option<&Path>,
        env: Environment,
    ) -> Result<Self, ConfigError> {
        let defaults = LoggingConfig::default();
        let mut builder = Config::builder()
            .set_default("decoder.verify_checksum", true)?
            .set_default("decoder.max_string_len", DEFAULT_MAX_STRING_LEN as u64)?
            .set_default(
                "decoder.max_collection_len",
                DEFAULT_MAX_COLLECTION_LEN as u64,
            )?
            .set_default("logging.level", defaults.level)?
            .set_default("logging.format", defaults.format.to_string())?
            .set_default("logging.ansi", defaults.ansi)?
            .set_default("logging.with_target", defaults.with_target)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder
            .add_source(env.prefix_separator("_").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}
