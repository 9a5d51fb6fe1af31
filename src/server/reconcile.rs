//! Listing reconciliation
//! ----------------------
//! The backend's key listing may still contain keys that were deleted after
//! its snapshot was taken. Every listed key is therefore confirmed with a
//! point read before it is reported; only confirmed entries reach callers.

use std::collections::HashSet;

use futures_util::stream::{self, StreamExt};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::ident::{self, EntryId, Kind};
use crate::storage::{ContentStore, StoreResult};

/// Folder -> names for one kind. Folders keep first-seen order, names keep
/// confirmation order. Serializes as a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderListing {
    folders: Vec<(String, Vec<String>)>,
}

impl FolderListing {
    pub fn push(&mut self, folder: &str, name: &str) {
        match self.folders.iter_mut().find(|(f, _)| f == folder) {
            Some((_, names)) => names.push(name.to_string()),
            None => self.folders.push((folder.to_string(), vec![name.to_string()])),
        }
    }

    pub fn names(&self, folder: &str) -> Option<&[String]> {
        self.folders.iter().find(|(f, _)| f == folder).map(|(_, n)| n.as_slice())
    }

    pub fn folders(&self) -> impl Iterator<Item = &str> {
        self.folders.iter().map(|(f, _)| f.as_str())
    }

    pub fn is_empty(&self) -> bool { self.folders.is_empty() }

    /// Total number of entries across folders.
    pub fn entry_count(&self) -> usize {
        self.folders.iter().map(|(_, n)| n.len()).sum()
    }
}

impl Serialize for FolderListing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.folders.len()))?;
        for (folder, names) in &self.folders {
            map.serialize_entry(folder, names)?;
        }
        map.end()
    }
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Listing {
    pub folders: FolderListing,
    /// Candidates whose confirmation read failed; excluded from `folders`.
    pub failed: usize,
    /// Listed keys that did not decode or belong to another kind.
    pub discarded: usize,
    /// Candidates the point read reported absent.
    pub phantoms: usize,
}

impl Listing {
    pub fn is_partial(&self) -> bool { self.failed > 0 }
}

/// Reconcile a raw key listing against point reads. At most `concurrency`
/// reads are in flight; the call returns once every read has finished.
pub async fn reconcile(store: &dyn ContentStore, kind: Kind, raw_keys: Vec<String>, concurrency: usize) -> Listing {
    let mut out = Listing::default();
    let mut seen: HashSet<String> = HashSet::new();
    let mut candidates: Vec<(String, EntryId)> = Vec::new();
    for key in raw_keys {
        match ident::decode(&key) {
            Ok(id) if id.kind == kind => {
                if seen.insert(key.clone()) { candidates.push((key, id)); }
            }
            Ok(_) => out.discarded += 1,
            Err(e) => {
                tracing::debug!(target: "reconcile", "skipping listed key: {}", e);
                out.discarded += 1;
            }
        }
    }

    let checked: Vec<(String, EntryId, StoreResult<bool>)> = stream::iter(candidates)
        .map(move |(key, id)| async move {
            let live = store.get(&key).await.map(|v| v.is_some());
            (key, id, live)
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    for (key, id, live) in checked {
        match live {
            Ok(true) => out.folders.push(&id.folder, &id.name),
            Ok(false) => out.phantoms += 1,
            Err(e) => {
                tracing::warn!(target: "reconcile", key = %key, "excluding entry, confirmation read failed: {}", e);
                out.failed += 1;
            }
        }
    }
    out
}

/// List and reconcile every entry of `kind`. Only a failure of the listing
/// call itself is an error.
pub async fn list_folders(store: &dyn ContentStore, kind: Kind, concurrency: usize) -> StoreResult<Listing> {
    let raw = store.list_keys(&ident::kind_prefix(kind)).await?;
    let listed = raw.len();
    let listing = reconcile(store, kind, raw, concurrency).await;
    tracing::debug!(
        target: "reconcile",
        kind = %kind, listed, confirmed = listing.folders.entry_count(),
        phantoms = listing.phantoms, failed = listing.failed, discarded = listing.discarded,
        "listing reconciled"
    );
    Ok(listing)
}
