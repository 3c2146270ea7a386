mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings};

/// Default location of the optional configuration file (any extension the
/// `config` crate understands).
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Prefix of environment overrides, e.g. `MINIBROKER_RPC__PORT=9000`.
pub const ENV_PREFIX: &str = "MINIBROKER";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads `path` (optional) and `MINIBROKER_*` environment variables, then
/// fills anything still missing from `Settings::default()`.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__"),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}
