use std::error::Error as StdError;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Error taxonomy for the integration layer.
///
/// Three families, matching how failures are handled: configuration problems
/// fail immediately and are never retried; a missing capability is reported
/// once, at construction, with a hint; collaborator failures propagate with
/// their source chain intact, untranslated.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A required entry or option is missing, or a value falls outside the
    /// recognized set.
    #[error("configuration error for {parameter}: {message}")]
    Configuration {
        /// Option or section the failure refers to
        parameter: String,
        /// What was wrong with it
        message: String,
    },

    /// A capability this layer depends on is not compiled in.
    #[error("missing dependency `{dependency}`: {hint}")]
    DependencyMissing {
        /// Name of the absent capability
        dependency: &'static str,
        /// Actionable build instruction
        hint: &'static str,
    },

    /// A failure surfaced by the model hub, the generation backend, or the
    /// guardrails session. Not retried, not recovered.
    #[error("{stage} failed")]
    Upstream {
        /// Which collaborator step failed
        stage: &'static str,
        /// The untouched underlying error
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl BridgeError {
    pub(crate) fn configuration(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    pub(crate) fn upstream(
        stage: &'static str,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self::Upstream {
            stage,
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = BridgeError::configuration("device", "invalid device: tpu");
        assert_eq!(
            error.to_string(),
            "configuration error for device: invalid device: tpu"
        );
    }

    #[test]
    fn test_dependency_hint_display() {
        let error = BridgeError::DependencyMissing {
            dependency: "rails",
            hint: "rebuild with the `rails` feature enabled",
        };
        let rendered = error.to_string();
        assert!(rendered.contains("rails"));
        assert!(rendered.contains("rebuild"));
    }

    #[test]
    fn test_upstream_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such checkpoint");
        let error = BridgeError::upstream("checkpoint listing", io);
        let source = StdError::source(&error).expect("source preserved");
        assert_eq!(source.to_string(), "no such checkpoint");
    }
}
