//! Kind-specific content checks applied before a write reaches the store.

use crate::ident::Kind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
}

/// JSON entries must parse as a JSON document (any top-level value).
/// Scripts are stored as given.
pub fn validate(kind: Kind, body: &[u8]) -> Result<(), ValidationError> {
    match kind {
        Kind::Script => Ok(()),
        Kind::Json => serde_json::from_slice::<serde::de::IgnoredAny>(body)
            .map(|_| ())
            .map_err(|e| ValidationError { message: e.to_string() }),
    }
}
