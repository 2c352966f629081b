//! Error types for loading, model construction and verification.
//!
//! Map-authoring defects are never errors: they are collected as issues and
//! findings on the [`Report`](crate::report::Report). The types here cover the
//! cases where no report can be produced at all.

use std::path::PathBuf;
use thiserror::Error;

/// Precondition failures while building a [`MapModel`](crate::model::MapModel).
///
/// Raised only when the parsed level lacks the basic shape every other check
/// depends on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedModelError {
    /// The maze declares no `Character`.
    #[error("maze has no Character element")]
    MissingCharacter,

    /// The maze declares more than one `Character`.
    #[error("maze declares {0} Character elements, expected exactly one")]
    MultipleCharacters(usize),

    /// The maze declares no rooms.
    #[error("maze has no Room elements")]
    NoRooms,

    /// `Character.initialroom` does not name a declared room.
    #[error("initial room {0} does not exist")]
    UnknownInitialRoom(i64),
}

/// Errors raised while reading a level file into a model.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported level file extension: {0}")]
    UnsupportedFormat(String),

    #[error("xml syntax error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("yaml syntax error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json syntax error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document has no <{0}> element")]
    MissingElement(&'static str),

    #[error("unexpected element <{element}> inside <{parent}>")]
    UnexpectedElement { element: String, parent: String },

    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },

    #[error("<{element}> attribute '{attribute}' has invalid value '{value}'")]
    InvalidAttribute {
        element: String,
        attribute: &'static str,
        value: String,
    },

    /// `Key.keyid` does not match `\d+(;\d+)*`.
    #[error("key {block_id}: keyid '{value}' is not a ';'-separated list of non-negative integers")]
    InvalidKeyId { block_id: i64, value: String },

    /// `WindArea.compass-direction` is outside `[0, 7]`.
    #[error("wind area {block_id}: compass-direction {value} is outside 0..=7")]
    CompassOutOfRange { block_id: i64, value: i64 },

    #[error(transparent)]
    Model(#[from] MalformedModelError),
}

/// Errors raised while reading a [`VerifierConfig`](crate::config::VerifierConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Faults of the verifier itself, as opposed to faults of the level.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Propagation did not reach a fixed point within the pass cap.
    #[error("internal invariant violated: reachability did not stabilise within {cap} passes")]
    InternalInvariant { cap: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = MalformedModelError::UnknownInitialRoom(42);
        assert!(err.to_string().contains("42"));

        let err = LoadError::InvalidKeyId {
            block_id: 9,
            value: "1;;2".to_string(),
        };
        assert!(err.to_string().contains("1;;2"));

        let err = VerifyError::InternalInvariant { cap: 5 };
        assert!(err.to_string().contains('5'));
    }

    #[test]
    fn model_error_converts_into_load_error() {
        let err: LoadError = MalformedModelError::NoRooms.into();
        assert!(matches!(err, LoadError::Model(MalformedModelError::NoRooms)));
    }
}
