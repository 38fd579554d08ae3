use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use super::blob::Blob;

/// Locally scoped URL that lets the playback device read a blob in-process
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct LocalRef(String);

impl LocalRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Creates and revokes local references to blobs
pub trait LocalReferences: Send + Sync {
    fn create(&self, blob: &Blob) -> LocalRef;

    fn revoke(&self, reference: &LocalRef);
}

/// A live local reference, revoked exactly once when released or dropped
pub struct PlaybackRef {
    reference: LocalRef,
    references: Arc<dyn LocalReferences>,
    released: bool,
}

impl PlaybackRef {
    pub fn acquire(references: Arc<dyn LocalReferences>, blob: &Blob) -> Self {
        let reference = references.create(blob);
        debug!("Created local reference {} for {}", reference, blob.name());
        Self {
            reference,
            references,
            released: false,
        }
    }

    pub fn reference(&self) -> &LocalRef {
        &self.reference
    }

    pub fn release(mut self) {
        self.revoke();
    }

    fn revoke(&mut self) {
        if !self.released {
            self.released = true;
            self.references.revoke(&self.reference);
            debug!("Revoked local reference {}", self.reference);
        }
    }
}

impl Drop for PlaybackRef {
    fn drop(&mut self) {
        self.revoke();
    }
}

impl fmt::Debug for PlaybackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackRef")
            .field("reference", &self.reference)
            .field("released", &self.released)
            .finish()
    }
}

/// In-memory `blob:` URL registry
///
/// Keeps the bytes of every live reference so they can be served back
/// (see `GET /blobs/:reference`) until revoked.
#[derive(Default)]
pub struct ObjectUrlRegistry {
    entries: Mutex<HashMap<LocalRef, Blob>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, reference: &LocalRef) -> Option<Blob> {
        self.lock().get(reference).cloned()
    }

    /// Number of references not yet revoked
    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<LocalRef, Blob>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LocalReferences for ObjectUrlRegistry {
    fn create(&self, blob: &Blob) -> LocalRef {
        let reference = LocalRef::new(format!("blob:{}", uuid::Uuid::new_v4()));
        self.lock().insert(reference.clone(), blob.clone());
        reference
    }

    fn revoke(&self, reference: &LocalRef) {
        if self.lock().remove(reference).is_none() {
            warn!("Revoking unknown local reference {}", reference);
        }
    }
}
