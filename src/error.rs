//! Rich diagnostic error types for the flowgraph pipeline.
//!
//! Only contract violations surface as errors. Recoverable per-record
//! problems (unrecognized formats, missing text, out-of-bounds actions) are
//! collected as [`crate::diagnostics::Diagnostics`] instead.

use miette::Diagnostic;
use thiserror::Error;

pub use crate::flow::FlowError;
pub use crate::topic::TopicError;

/// Top-level error type for flowgraph.
///
/// Each variant wraps a subsystem-specific error, preserving the full
/// diagnostic chain (error codes, help text) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum FlowgraphError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Flow(#[from] FlowError),
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file: {path}")]
    #[diagnostic(
        code(flowgraph::config::read),
        help("Ensure the config file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(flowgraph::config::parse),
        help("Check the TOML syntax. Unknown keys are ignored, but values must have the right type.")
    )]
    Parse { path: String, message: String },

    #[error("invalid action length bounds: min {min} > max {max}")]
    #[diagnostic(
        code(flowgraph::config::length_bounds),
        help("`min_action_len` must not exceed `max_action_len`. Defaults are 10 and 500.")
    )]
    LengthBounds { min: usize, max: usize },

    #[error("purchase_window must be at least 1")]
    #[diagnostic(
        code(flowgraph::config::purchase_window),
        help("The window counts tokens after the purchase verb. Use 1 for adjacent-only matching.")
    )]
    PurchaseWindow,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Topics(#[from] TopicError),
}

/// Convenience alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Convenience alias for top-level operations.
pub type FlowgraphResult<T> = std::result::Result<T, FlowgraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_bounds_display() {
        let err = ConfigError::LengthBounds { min: 600, max: 500 };
        assert!(err.to_string().contains("600"));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn flow_error_wraps_transparently() {
        let err: FlowgraphError = FlowError::UnknownAction {
            action_id: "post-1#0".into(),
        }
        .into();
        assert!(err.to_string().contains("post-1#0"));
    }

    #[test]
    fn topic_error_through_config() {
        let err: ConfigError = TopicError::ReservedName.into();
        let top: FlowgraphError = err.into();
        assert!(top.to_string().contains("general"));
    }
}
