// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::init_tracing;
pub use settings::{BacktestSettings, Config, EngineSettings, LogFormat, LoggingSettings, Simulation};

/// Loads the application configuration from `config.toml` and the environment.
///
/// Sources, lowest precedence first: built-in defaults, the optional
/// `config.toml` in the working directory, and `BOTFLEET__SECTION__KEY`
/// environment variables.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from("config")
}

/// Same as [`load_config`] with an explicit file stem or path.
pub fn load_config_from(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(
            config::Environment::with_prefix("BOTFLEET")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::debug!("Configuration loaded from '{}': {:?}", path, config);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.signal_capacity, 100);
        assert_eq!(config.engine.default_lot_size, dec!(100));
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[engine]
signal_capacity = 50
evaluation_interval = "2s"
auto_execute = false

[backtest]
initial_capital = 2500
"#
        )
        .unwrap();

        let config = load_config_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.engine.signal_capacity, 50);
        assert_eq!(config.engine.evaluation_interval, Duration::from_secs(2));
        assert!(!config.engine.auto_execute);
        assert_eq!(config.backtest.initial_capital, dec!(2500));
        // Untouched keys keep their defaults.
        assert_eq!(config.backtest.equity_samples, 100);
    }

    #[test]
    fn invalid_ratio_is_rejected() {
        let mut config = Config::default();
        config.engine.auto_execute_ratio = 1.5;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.engine.signal_capacity = 0;
        assert!(config.validate().is_err());
    }
}
