//! Error types for atomic-handinput.
//!
//! Every variant is raised while wiring the pipeline together.  Frame
//! processing itself never fails: bad per-frame data degrades to an
//! untracked hand.

use std::path::PathBuf;

/// All errors that can occur while building the hand-input pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // ── Configuration ──────────────────────────────────────
    #[error("malformed configuration: {0}")]
    ConfigParse(String),

    #[error("unknown configuration key :{0}")]
    UnknownKey(String),

    #[error("invalid value for :{key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Wiring ─────────────────────────────────────────────
    #[error("device joint set is missing required joint {0}")]
    MissingJoint(&'static str),

    #[error("wiring fault: {0}")]
    Wiring(String),

    // ── Replay ─────────────────────────────────────────────
    #[error("malformed frame script at frame {index}: {details}")]
    Script { index: usize, details: String },
}

impl Error {
    pub(crate) fn invalid(key: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for results carrying [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
