use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::ConfigurationError;

/// Where and how verbosely to log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// Filter directive, e.g. `info` or `pkmodel=debug`
    pub level: String,
    /// Optional log file, truncated on setup
    pub file: Option<String>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Setup logging for the library
///
/// Log messages are written to stdout, and additionally to `settings.file`
/// when one is given. The subscriber is global, so only the first call in a
/// process succeeds; later calls return [`ConfigurationError::Logging`].
pub fn setup_log(settings: &LogSettings) -> Result<(), ConfigurationError> {
    let log_level = settings.level.to_lowercase();
    let env_filter = EnvFilter::try_new(&log_level)
        .map_err(|err| ConfigurationError::invalid("log.level", &log_level, err.to_string()))?;

    let subscriber = Registry::default().with(env_filter);

    let file_layer = match &settings.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .map_err(|source| ConfigurationError::Io {
                    path: path.clone(),
                    source,
                })?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_timer(CompactTimestamp),
            )
        }
        None => None,
    };

    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_timer(CompactTimestamp);

    subscriber
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|err| ConfigurationError::Logging(err.to_string()))?;
    tracing::debug!("Logging is configured with level: {}", log_level);
    Ok(())
}

#[derive(Clone)]
struct CompactTimestamp;

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_info_on_stdout() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, "info");
        assert!(settings.file.is_none());
    }

    #[test]
    fn invalid_filter_is_rejected() {
        let settings = LogSettings {
            level: "pkmodel=loud".to_string(),
            file: None,
        };
        assert!(matches!(
            setup_log(&settings),
            Err(ConfigurationError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: LogSettings = serde_json::from_str(r#"{"file": "run.log"}"#).unwrap();
        assert_eq!(settings.level, "info");
        assert_eq!(settings.file.as_deref(), Some("run.log"));
    }
}
