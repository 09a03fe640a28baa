use mongodb::{
    bson,
    error::{ErrorKind, WriteFailure},
};
use std::fmt::Display;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The link of the client → database → collection chain that could not be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Undefined {
    Client,
    Database,
    Collection,
}

impl Display for Undefined {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Client => "client",
            Self::Database => "database",
            Self::Collection => "collection",
        })
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("undefined {0}")]
    Configuration(Undefined),

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    #[error("E11000 duplicate key error collection: {collection} dup key: {key}")]
    DuplicateKey { collection: String, key: String },

    #[error("cursor already used")]
    CursorUsed,

    #[error("no such item for cursor instance: index {0}")]
    IndexOutOfRange(i64),

    #[error("only entities can be projected through a view")]
    NotViewable,

    #[error("unknown view `{0}`")]
    UnknownView(String),

    #[error("unsupported operator `{0}`")]
    UnsupportedOperator(String),

    #[error("invalid connection uri `{0}`")]
    InvalidUri(String),

    #[error(transparent)]
    Serialization(#[from] bson::ser::Error),

    #[error(transparent)]
    Deserialization(#[from] bson::de::Error),

    #[error("failed to start the blocking runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl Error {
    /// Whether the store rejected a write because of a unique index collision.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            Self::DuplicateKey { .. } => true,
            Self::Driver(error) => matches!(
                error.kind.as_ref(),
                ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == 11000
            ),
            _ => false,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    pub fn undefined(&self) -> Option<Undefined> {
        match self {
            Self::Configuration(link) => Some(*link),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_names_the_missing_link() {
        let error = Error::Configuration(Undefined::Database);

        assert_eq!(error.to_string(), "undefined database");
        assert_eq!(error.undefined(), Some(Undefined::Database));
        assert!(error.is_configuration());
        assert!(!error.is_duplicate_key());
    }

    #[test]
    fn memory_duplicate_key_is_detected() {
        let error = Error::DuplicateKey {
            collection: "db.foo".into(),
            key: "{ _id: 1 }".into(),
        };

        assert!(error.is_duplicate_key());
    }
}
