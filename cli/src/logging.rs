//! Logging configuration

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::config::LoggingSettings;

/// Pick the level and output format
///
/// Command-line flags win over the `[logging]` section of the config file,
/// which wins over the defaults.
pub fn resolve(
    level: Option<&str>,
    json: bool,
    settings: Option<&LoggingSettings>,
) -> (String, bool) {
    let defaults = LoggingSettings::default();
    let settings = settings.unwrap_or(&defaults);
    let level = level.unwrap_or(&settings.level).to_string();
    (level, json || settings.format == "json")
}

/// Initialize logging with the specified level
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn init(level: &str, json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow::anyhow!("Invalid log level {:?}: {}", level, e))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    // The engine runs on its own named thread
    if json {
        subscriber
            .with(fmt::layer().json().with_thread_names(true).with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to init logging: {}", e))?;
    }

    Ok(())
}
