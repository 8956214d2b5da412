// Push-style access to a remote book collection

pub mod polling;

use std::fmt;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::models::{BookRecord, Category};

pub use polling::PollingCollection;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    Transport,
    Permission,
    NotFound,
    Decode,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RemoteErrorKind::Transport => "transport",
            RemoteErrorKind::Permission => "permission",
            RemoteErrorKind::NotFound => "not found",
            RemoteErrorKind::Decode => "decode",
        };
        f.write_str(s)
    }
}

/// Opaque failure reported by the backing store. Never carries partial data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(RemoteErrorKind::Transport, message)
    }
}

pub type SnapshotResult = Result<Vec<BookRecord>, RemoteError>;

/// Listener invoked with the full result set (or an error) each time the
/// collection changes, including once for the initial load.
pub type SnapshotCallback = Box<dyn Fn(SnapshotResult) + Send + Sync + 'static>;

/// Handle to a live subscription. Disposing it (or dropping it) releases the
/// underlying listener; disposing more than once is a no-op.
pub struct ListenerRegistration {
    disposed: AtomicBool,
    remove: Mutex<Option<Box<dyn FnOnce() + Send + 'static>>>,
}

impl ListenerRegistration {
    pub fn new(remove: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposed: AtomicBool::new(false),
            remove: Mutex::new(Some(Box::new(remove))),
        }
    }

    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let remove = self
            .remove
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(remove) = remove {
            remove();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ListenerRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRegistration")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A remote collection of books that can be observed per category.
///
/// Implementations must report remote failures through the callback and
/// never panic on them.
pub trait RemoteCollection: Send + Sync {
    fn observe(&self, category: Category, callback: SnapshotCallback) -> ListenerRegistration;
}

/// One-shot read of a whole collection, used by [`PollingCollection`].
#[async_trait::async_trait]
pub trait CollectionReader: Send + Sync {
    async fn read_books(&self, collection_path: &str) -> SnapshotResult;
}
