//! Append-only packet store
//!
//! The store is the one piece of shared mutable state in the service. Any
//! number of readers take snapshots or pages; writes go through
//! [`PacketStore::append`], [`PacketStore::replace`] and
//! [`PacketStore::clear`], each a single critical section, so a reader sees a
//! record fully or not at all.
//!
//! The capture worker appends through a [`StoreWriter`]. Every `clear`,
//! `replace` or explicit [`PacketStore::revoke_writers`] bumps an epoch, and a
//! writer from an older epoch can no longer append.

use packetlens_core::{Error, PacketRecord, Result};
use parking_lot::RwLock;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<PacketRecord>,
    epoch: u64,
}

impl Inner {
    fn push(&mut self, mut record: PacketRecord) -> u64 {
        let number = self.records.len() as u64 + 1;
        record.number = number;
        self.records.push(record);
        number
    }
}

/// Ordered, append-only buffer of packet records
#[derive(Debug, Clone, Default)]
pub struct PacketStore {
    inner: Arc<RwLock<Inner>>,
}

impl PacketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, assigning it the next sequence number
    pub fn append(&self, record: PacketRecord) -> u64 {
        self.inner.write().push(record)
    }

    /// Consistent copy of every record, ordered by number
    pub fn snapshot(&self) -> Vec<PacketRecord> {
        self.inner.read().records.clone()
    }

    /// Contiguous slice by position.
    ///
    /// A negative offset is an error; an offset past the end yields an empty
    /// page.
    pub fn page(&self, offset: i64, limit: usize) -> Result<Vec<PacketRecord>> {
        if offset < 0 {
            return Err(Error::OutOfRange(offset));
        }
        let inner = self.inner.read();
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(inner
            .records
            .iter()
            .skip(start)
            .take(limit)
            .cloned()
            .collect())
    }

    /// Look up a record by its sequence number
    pub fn get(&self, number: u64) -> Option<PacketRecord> {
        let index = usize::try_from(number.checked_sub(1)?).ok()?;
        self.inner.read().records.get(index).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record; numbering restarts at 1
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.records = Vec::new();
        inner.epoch += 1;
    }

    /// Install a new sequence, renumbered from 1, in one step
    pub fn replace(&self, records: Vec<PacketRecord>) -> usize {
        let mut fresh = Inner::default();
        for record in records {
            fresh.push(record);
        }
        let count = fresh.records.len();

        let mut inner = self.inner.write();
        fresh.epoch = inner.epoch + 1;
        *inner = fresh;
        count
    }

    /// Get a writer bound to the current epoch
    pub fn writer(&self) -> StoreWriter {
        StoreWriter {
            store: self.clone(),
            epoch: self.inner.read().epoch,
        }
    }

    /// Invalidate every outstanding writer
    pub fn revoke_writers(&self) {
        self.inner.write().epoch += 1;
    }
}

/// Append handle owned by a capture worker
#[derive(Debug, Clone)]
pub struct StoreWriter {
    store: PacketStore,
    epoch: u64,
}

impl StoreWriter {
    /// Append a record, unless this writer has been revoked.
    ///
    /// Returns the assigned number, or `None` if the record was discarded.
    pub fn append(&self, record: PacketRecord) -> Option<u64> {
        let mut inner = self.store.inner.write();
        if inner.epoch != self.epoch {
            return None;
        }
        Some(inner.push(record))
    }

    /// Whether appends through this writer are still accepted
    pub fn is_valid(&self) -> bool {
        self.store.inner.read().epoch == self.epoch
    }
}
