use std::sync::Once;

use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

static INIT: Once = Once::new();

/// Log targets whose progress chatter is noise at this layer. Routed to a
/// discarded sink instead of captured streams, so the filtering composes
/// under concurrent use.
const COLLABORATOR_TARGETS: [&str; 3] = ["hf_hub", "tokenizers", "ureq"];

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level
    pub level: Level,
    /// Whether to include source code locations
    pub source_location: bool,
    /// Whether to log spans
    pub log_spans: bool,
    /// Discard collaborator progress diagnostics
    pub quiet_collaborators: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            source_location: true,
            log_spans: false,
            quiet_collaborators: true,
        }
    }
}

/// Initialize the logging system. Only the first call installs the global
/// subscriber; later calls are no-ops.
pub fn setup_logging(config: LogConfig) -> Result<(), String> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = setup_logging_internal(config);
    });

    result
}

fn setup_logging_internal(config: LogConfig) -> Result<(), String> {
    let filter = build_filter(&config);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(if config.log_spans {
            FmtSpan::FULL
        } else {
            FmtSpan::NONE
        })
        .try_init()
        .map_err(|e| format!("Failed to set global subscriber: {}", e))
}

/// Level filter, with collaborator targets discarded when quieted.
fn build_filter(config: &LogConfig) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env().add_directive(config.level.into());
    if config.quiet_collaborators {
        for target in COLLABORATOR_TARGETS {
            if let Ok(directive) = format!("{target}=off").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }
    filter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_initialization_is_idempotent() {
        assert!(setup_logging(LogConfig::default()).is_ok());
        assert!(setup_logging(LogConfig::default()).is_ok());
    }

    #[test]
    fn test_quieting_discards_collaborator_targets() {
        let filter = build_filter(&LogConfig::default());
        let rendered = filter.to_string().to_lowercase();
        assert!(rendered.contains("hf_hub=off"));
        assert!(rendered.contains("tokenizers=off"));
    }

    #[test]
    fn test_verbose_mode_keeps_collaborator_targets() {
        let config = LogConfig {
            quiet_collaborators: false,
            ..Default::default()
        };
        let rendered = build_filter(&config).to_string().to_lowercase();
        assert!(!rendered.contains("hf_hub=off"));
    }
}
