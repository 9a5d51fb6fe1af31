//! Entry identifiers and storage key codec
//! ---------------------------------------
//! Single source of truth for mapping (kind, folder, name) onto the flat key
//! space of the content store. Nothing outside this module builds or splits
//! raw keys.
//!
//! Key layout: `{kind}:{folder}:{name}`, e.g. `json:demo:users`.

use std::fmt;

/// Reserved separator between key components.
pub const SEPARATOR: char = ':';

/// Top-level category of stored content. Each kind has its own namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Script,
    Json,
}

impl Kind {
    pub const ALL: [Kind; 2] = [Kind::Script, Kind::Json];

    /// Key prefix and HTTP path segment for this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            Kind::Script => "scripts",
            Kind::Json => "json",
        }
    }

    pub fn from_prefix(s: &str) -> Option<Kind> {
        Kind::ALL.into_iter().find(|k| k.prefix() == s)
    }

    /// Human label used in response messages ("Script saved", "JSON saved").
    pub fn label(self) -> &'static str {
        match self {
            Kind::Script => "Script",
            Kind::Json => "JSON",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentError {
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("malformed storage key: {0}")]
    MalformedKey(String),
}

/// Identity of a single entry. Construct with [`EntryId::new`] to get the
/// separator checks; [`decode`] may yield names that carry the separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryId {
    pub kind: Kind,
    pub folder: String,
    pub name: String,
}

impl EntryId {
    pub fn new(kind: Kind, folder: impl Into<String>, name: impl Into<String>) -> Result<Self, IdentError> {
        let folder = folder.into();
        let name = name.into();
        check_component("folder", &folder)?;
        check_component("name", &name)?;
        Ok(Self { kind, folder, name })
    }
}

fn check_component(what: &str, value: &str) -> Result<(), IdentError> {
    if value.is_empty() {
        return Err(IdentError::InvalidIdentifier(format!("{} must not be empty", what)));
    }
    if value.contains(SEPARATOR) {
        return Err(IdentError::InvalidIdentifier(format!(
            "{} '{}' must not contain '{}'", what, value, SEPARATOR
        )));
    }
    Ok(())
}

/// Encode an entry id into its storage key.
pub fn encode(id: &EntryId) -> String {
    format!("{}{}{}{}{}", id.kind.prefix(), SEPARATOR, id.folder, SEPARATOR, id.name)
}

/// Validate and encode in one step.
pub fn encode_parts(kind: Kind, folder: &str, name: &str) -> Result<String, IdentError> {
    EntryId::new(kind, folder, name).map(|id| encode(&id))
}

/// Decode a storage key. Splits on the first two separators only, so any
/// further separators stay inside the name.
pub fn decode(key: &str) -> Result<EntryId, IdentError> {
    let mut parts = key.splitn(3, SEPARATOR);
    let (Some(prefix), Some(folder), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(IdentError::MalformedKey(key.to_string()));
    };
    let kind = Kind::from_prefix(prefix).ok_or_else(|| IdentError::MalformedKey(key.to_string()))?;
    if folder.is_empty() || name.is_empty() {
        return Err(IdentError::MalformedKey(key.to_string()));
    }
    Ok(EntryId { kind, folder: folder.to_string(), name: name.to_string() })
}

/// Listing prefix covering every key of one kind.
pub fn kind_prefix(kind: Kind) -> String {
    format!("{}{}", kind.prefix(), SEPARATOR)
}
