//! Log output setup.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingSettings;
use crate::error::{ConfigError, Result};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Calling this more
/// than once is harmless: a subscriber that is already installed is kept.
///
/// # Errors
///
/// Returns a validation error if the configured level is not a valid filter.
pub fn init_logging(settings: &LoggingSettings) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&settings.level)?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}

fn build_filter(level: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(level).map_err(|e| {
        ConfigError::validation(format!("Invalid log level '{level}': {e}"), "logging.level").into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_level_is_rejected() {
        assert!(build_filter("info").is_ok());
        assert!(build_filter("halldyll_deploy_sync=debug,warn").is_ok());
        assert!(build_filter("halldyll_deploy_sync=verbose").is_err());
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let settings = LoggingSettings {
            level: String::from("debug"),
            json: false,
        };
        assert!(init_logging(&settings).is_ok());
        assert!(init_logging(&settings).is_ok());
    }
}
