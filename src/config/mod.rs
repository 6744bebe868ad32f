mod settings;

use config::{Config, ConfigError, Environment, File};

pub use settings::{
    AuthSettings, ChannelSettings, HeartbeatSettings, LoggingSettings, PartialSettings,
    ReconnectSettings, ServerSettings, Settings,
};

/// Loads settings from `config/default.*` and `REALTIME__*` environment variables.
/// Anything not provided by either source keeps its default value.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("REALTIME")
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("channels.default")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge(Settings::default()))
}

#[cfg(test)]
mod tests;
