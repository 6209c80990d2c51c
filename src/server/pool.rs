use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex, PoisonError, TryLockError,
};

use anyhow::Result;
use tracing::debug;

use crate::mbtiles::MbTiles;

/// Read-only connections opened per served store.
pub(crate) const READ_POOL_SIZE: usize = 4;

/// A fixed set of read-only store connections handed out round-robin.
///
/// A read takes the first idle connection starting at the cursor and only
/// waits when every connection is busy.
#[derive(Debug)]
pub(crate) struct ReadPool {
    connections: Vec<Mutex<MbTiles>>,
    cursor: AtomicUsize,
}

impl ReadPool {
    /// Pool `first` together with `size - 1` more connections to the same file.
    pub(crate) fn new(first: MbTiles, size: usize) -> Result<Self> {
        let mut connections = Vec::with_capacity(size.max(1));
        let path = first.path().to_path_buf();
        connections.push(Mutex::new(first));
        while connections.len() < size {
            connections.push(Mutex::new(MbTiles::open(&path)?));
        }
        debug!(path = %path.display(), connections = connections.len(), "opened read pool");
        Ok(Self { connections, cursor: AtomicUsize::new(0) })
    }

    #[inline] pub(crate) fn len(&self) -> usize { self.connections.len() }

    /// Run `read` against one pooled connection.
    pub(crate) fn read<T>(&self, read: impl FnOnce(&MbTiles) -> Result<T>) -> Result<T> {
        let len = self.connections.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;

        for offset in 0..len {
            match self.connections[(start + offset) % len].try_lock() {
                Ok(store) => return read(&store),
                Err(TryLockError::Poisoned(poisoned)) => return read(&poisoned.into_inner()),
                Err(TryLockError::WouldBlock) => continue,
            }
        }

        let store = self.connections[start].lock().unwrap_or_else(PoisonError::into_inner);
        read(&store)
    }
}
