//! Error types for funcctl operations.
//!
//! This module defines the canonical error type used throughout funcctl.
//! All subsystems return `Result<T, FuncError>` for error handling.

use std::env;
use std::io;
use thiserror::Error;

/// Canonical error type for all funcctl operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
/// Many variants auto-convert from standard library errors via `#[from]`.
#[derive(Error, Debug)]
pub enum FuncError {
    /// I/O error (auto-converts from `std::io::Error`)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `func.yaml` failed to parse; the message names the file and is rewritten to
    /// read "is not valid" instead of the parser's implementation-specific phrasing.
    #[error("{0}")]
    Yaml(String),

    /// Environment variable error (auto-converts from `std::env::VarError`)
    #[error("environment variable error: {0}")]
    EnvVar(#[from] env::VarError),

    /// A Function failed validation; message enumerates every field-level problem,
    /// grouped by field.
    #[error("validation failed:\n{0}")]
    Validation(String),

    /// Operation requires an initialized Function at Root.
    #[error("not initialized: {0}")]
    NotInitialized(String),

    /// Deploy/push invoked without a build artifact.
    #[error("not built: {0}")]
    NotBuilt(String),

    /// Create invoked on a non-empty / pre-initialized directory.
    #[error("already initialized: {0}")]
    AlreadyInitialized(String),

    /// Repository/Runtime/Template not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Registry required but absent.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// Underlying builder/pusher/deployer/HTTP/git failure, surfaced verbatim.
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Context cancellation.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl FuncError {
    /// Wrap an external collaborator failure, preserving its message verbatim while
    /// attaching the calling context (path, name) the core is responsible for.
    pub fn transport(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        FuncError::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Rewrap a `serde_yaml` parse failure so it names the file and avoids leaking
    /// implementation-specific phrasing into the error surface.
    pub fn yaml_parse(path: &std::path::Path, source: serde_yaml::Error) -> Self {
        FuncError::Yaml(format!("{} is not valid: {}", path.display(), source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display() {
        let err = FuncError::Validation("name: must be a DNS label".to_string());
        assert_eq!(
            format!("{}", err),
            "validation failed:\nname: must be a DNS label"
        );
    }

    #[test]
    fn not_found_error_display() {
        let err = FuncError::NotFound("template go/http".to_string());
        assert_eq!(format!("{}", err), "not found: template go/http");
    }

    #[test]
    fn yaml_parse_names_the_file_and_avoids_raw_phrasing() {
        let path = std::path::Path::new("/tmp/func.yaml");
        let raw = serde_yaml::from_str::<serde_yaml::Value>(": :").unwrap_err();
        let err = FuncError::yaml_parse(path, raw);
        let msg = format!("{}", err);
        assert!(msg.starts_with("/tmp/func.yaml is not valid"));
    }

    #[test]
    fn not_built_error_display() {
        let err = FuncError::NotBuilt("/proj".to_string());
        assert_eq!(format!("{}", err), "not built: /proj");
    }
}
