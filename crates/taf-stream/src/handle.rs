//! Shared-ownership handles over streaming loaders.
//!
//! A handle keeps its loader alive through an `Arc`. A process-wide
//! registry holds `Weak` back-references keyed by a monotonically
//! increasing handle id, so tooling can enumerate live loaders without
//! extending their lifetime.

use std::path::Path;
use std::sync::{Arc, LazyLock, Weak};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::loader::StreamingLoader;
use crate::Result;

struct HandleRegistry {
    next_id: u64,
    handles: FxHashMap<u64, Weak<StreamingLoader>>,
}

static REGISTRY: LazyLock<Mutex<HandleRegistry>> = LazyLock::new(|| {
    Mutex::new(HandleRegistry {
        next_id: 1,
        handles: FxHashMap::default(),
    })
});

/// A reference-counted handle to an open [`StreamingLoader`].
///
/// Dropping the last handle (and any other strong references) releases
/// the underlying file. Handles unregister themselves on drop.
#[derive(Debug)]
pub struct StreamingHandle {
    loader: Arc<StreamingLoader>,
    id: u64,
}

impl StreamingHandle {
    /// Open a loader for `path` and register it.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loader = Arc::new(StreamingLoader::new());
        loader.open(path)?;

        let mut registry = REGISTRY.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handles.insert(id, Arc::downgrade(&loader));

        Ok(Self { loader, id })
    }

    /// The registry id of this handle.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Access the shared loader.
    pub fn loader(&self) -> &Arc<StreamingLoader> {
        &self.loader
    }
}

impl std::ops::Deref for StreamingHandle {
    type Target = StreamingLoader;

    fn deref(&self) -> &Self::Target {
        &self.loader
    }
}

impl Drop for StreamingHandle {
    fn drop(&mut self) {
        REGISTRY.lock().handles.remove(&self.id);
    }
}

/// Number of registered handles whose loader is still alive.
pub fn active_handle_count() -> usize {
    REGISTRY
        .lock()
        .handles
        .values()
        .filter(|weak| weak.strong_count() > 0)
        .count()
}

/// Snapshot the live loaders by handle id.
///
/// Upgrading happens per entry and the strong references are returned to
/// the caller; the registry itself never holds one.
pub fn active_loaders() -> Vec<(u64, Arc<StreamingLoader>)> {
    REGISTRY
        .lock()
        .handles
        .iter()
        .filter_map(|(&id, weak)| weak.upgrade().map(|loader| (id, loader)))
        .collect()
}
