//! Error taxonomy for the coordinator UI.
//!
//! Protocol errors (wrong method, missing parameter) and not-found lookups are
//! answered directly with an HTTP status and never surface as a [`UiError`].
//! What remains here are failures of the machinery itself: template expansion,
//! payload export, startup and configuration.

use std::net::SocketAddr;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, UiError>;

#[derive(Debug, thiserror::Error)]
pub enum UiError {
    /// A page asked for a template identifier the renderer cannot resolve.
    #[error("unknown template `{0}`")]
    UnknownTemplate(String),

    /// A document was handed to a template other than the one it was built
    /// for.
    #[error("document `{document}` cannot be expanded against template `{template}`")]
    TemplateMismatch { document: String, template: String },

    /// The template exists but failed to expand.
    #[error("failed to expand template `{template}`: {source}")]
    Template {
        template: String,
        #[source]
        source: minijinja::Error,
    },

    /// A snapshot could not be converted to a structured payload.
    #[error("failed to export payload: {0}")]
    Export(#[from] serde_json::Error),

    /// The listening socket could not be acquired.
    #[error("failed to start HTTP UI on {addr}: {source}")]
    Startup {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UiError {
    pub(crate) fn startup(addr: impl Into<String>, source: std::io::Error) -> Self {
        UiError::Startup {
            addr: addr.into(),
            source,
        }
    }

    pub(crate) fn startup_at(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::startup(addr.to_string(), source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startup_error_mentions_address() {
        let err = UiError::startup(
            "127.0.0.1:8080",
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        );
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:8080"));
        assert!(msg.contains("address in use"));
    }

    #[test]
    fn test_template_mismatch_display() {
        let err = UiError::TemplateMismatch {
            document: "jobs_list".into(),
            template: "main".into(),
        };
        assert_eq!(
            err.to_string(),
            "document `jobs_list` cannot be expanded against template `main`"
        );
    }

    #[test]
    fn test_unknown_template_display() {
        let err = UiError::UnknownTemplate("nope".into());
        assert_eq!(err.to_string(), "unknown template `nope`");
    }
}
