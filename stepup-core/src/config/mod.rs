//! Layered configuration loading.
//!
//! Sources, lowest precedence first:
//! 1. An optional file named `<file_stem>.{toml,yaml,json}` in the working directory.
//! 2. Environment variables with `<PREFIX>__` and `__` as the nesting separator,
//!    e.g. `STEPUP__OTP_SERVICE__URL`.
//!
//! A `.env` file is loaded into the process environment first if present.

use crate::error::AppError;
use config::{Config as Cfg, Environment, File};
use serde::de::DeserializeOwned;

pub fn load<T: DeserializeOwned>(file_stem: &str, env_prefix: &str) -> Result<T, AppError> {
    dotenvy::dotenv().ok();

    let config = Cfg::builder()
        .add_source(File::with_name(file_stem).required(false))
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    Ok(config.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default)]
        name: Option<String>,
    }

    fn default_port() -> u16 {
        8080
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let sample: Sample = load("definitely-not-a-config-file", "CORE_CONFIG_TEST_UNSET").unwrap();
        assert_eq!(sample.port, 8080);
        assert!(sample.name.is_none());
    }
}
