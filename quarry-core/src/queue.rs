use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use metrics::counter;
use rocksdb::{Direction, IteratorMode, WriteBatch};
use tracing::info;

use crate::error::QueueError;
use crate::keys::{queue_prefix, queue_prefix_end, EntryKey};
use crate::kv::{decode_count, decode_sequence, encode_delta, encode_sequence, KvStore};
use crate::metrics_consts::{
    ENTRIES_CLEARED_COUNTER, ENTRIES_POPPED_COUNTER, ENTRIES_PUSHED_COUNTER,
};
use crate::store::{ENTRIES_CF, SEQUENCES_CF, SIZES_CF};
use crate::types::Bytes;

/// Handle to one named queue: a persistent priority/FIFO multiset of opaque
/// payloads, stored as entry keys under the queue's prefix.
///
/// A pushed entry is either fully visible (poppable, iterable, counted) or
/// not committed at all - entry writes and counter updates travel in one
/// atomic batch. Handles are created by [`Store::get_queue`](crate::Store::get_queue)
/// and are safe to share across threads.
pub struct Queue {
    name: String,
    prefix: Vec<u8>,
    kv: Arc<KvStore>,
    /// Last issued sequence number. Strictly increasing per push, never
    /// reset by pop or clear; the committed high-water mark lives in the
    /// sequences column family and seeds this on handle creation.
    last_sequence: AtomicU64,
    /// Push takes the shared side; pop and clear take the exclusive side,
    /// which serializes their scan-then-delete window and makes the clear
    /// boundary exclusive of racing pushes.
    op_lock: RwLock<()>,
}

impl Queue {
    pub(crate) fn open(kv: Arc<KvStore>, name: String) -> Result<Self, QueueError> {
        let committed = kv
            .get(SEQUENCES_CF, name.as_bytes())?
            .map(|bytes| decode_sequence(&bytes))
            .unwrap_or(0);

        Ok(Self {
            prefix: queue_prefix(&name),
            name,
            kv,
            last_sequence: AtomicU64::new(committed),
            op_lock: RwLock::new(()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a payload at the given priority. Higher priority is served
    /// first; entries with equal priority are served in push order.
    pub fn push(&self, priority: u8, payload: &[u8]) -> Result<(), QueueError> {
        let _shared = self.op_lock.read().unwrap_or_else(PoisonError::into_inner);

        let sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let key: Vec<u8> = EntryKey::new(self.name.clone(), priority, sequence).into();

        let mut batch = WriteBatch::default();
        batch.put_cf(self.kv.cf(ENTRIES_CF)?, &key, payload);
        batch.merge_cf(self.kv.cf(SIZES_CF)?, self.name.as_bytes(), encode_delta(1));
        batch.merge_cf(
            self.kv.cf(SEQUENCES_CF)?,
            self.name.as_bytes(),
            encode_sequence(sequence),
        );
        self.kv.write(batch)?;

        counter!(ENTRIES_PUSHED_COUNTER, "queue" => self.name.clone()).increment(1);
        Ok(())
    }

    /// Remove and return the highest-priority, earliest-pushed payload.
    /// Returns `Ok(None)` on an empty queue - absence is not an error.
    pub fn pop(&self) -> Result<Option<Bytes>, QueueError> {
        let _exclusive = self.op_lock.write().unwrap_or_else(PoisonError::into_inner);

        let entries = self.kv.cf(ENTRIES_CF)?;
        let mut iter = self
            .kv
            .db
            .iterator_cf(entries, IteratorMode::From(&self.prefix, Direction::Forward));

        let Some(first) = iter.next() else {
            return Ok(None);
        };
        let (key, payload) = first.map_err(QueueError::store("scan"))?;
        if !key.starts_with(&self.prefix) {
            return Ok(None);
        }

        let mut batch = WriteBatch::default();
        batch.delete_cf(entries, &key);
        batch.merge_cf(
            self.kv.cf(SIZES_CF)?,
            self.name.as_bytes(),
            encode_delta(-1),
        );
        self.kv.write(batch)?;

        counter!(ENTRIES_POPPED_COUNTER, "queue" => self.name.clone()).increment(1);
        Ok(Some(payload.into_vec()))
    }

    /// The payload pop would return next, without removing it.
    pub fn peek(&self) -> Result<Option<Bytes>, QueueError> {
        let entries = self.kv.cf(ENTRIES_CF)?;
        let mut iter = self
            .kv
            .db
            .iterator_cf(entries, IteratorMode::From(&self.prefix, Direction::Forward));

        match iter.next() {
            Some(item) => {
                let (key, payload) = item.map_err(QueueError::store("scan"))?;
                if key.starts_with(&self.prefix) {
                    Ok(Some(payload.into_vec()))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Exact entry count, maintained transactionally with the entry set.
    pub fn size(&self) -> Result<u64, QueueError> {
        Ok(self
            .kv
            .get(SIZES_CF, self.name.as_bytes())?
            .map(|bytes| decode_count(&bytes))
            .unwrap_or(0))
    }

    /// Remove every entry currently in the queue and reset its size to 0.
    /// Returns the number removed. Sequence numbers are not reset.
    pub fn clear(&self) -> Result<u64, QueueError> {
        let _exclusive = self.op_lock.write().unwrap_or_else(PoisonError::into_inner);

        let entries = self.kv.cf(ENTRIES_CF)?;
        let mut removed: u64 = 0;
        for item in self
            .kv
            .db
            .iterator_cf(entries, IteratorMode::From(&self.prefix, Direction::Forward))
        {
            let (key, _) = item.map_err(QueueError::store("scan"))?;
            if !key.starts_with(&self.prefix) {
                break;
            }
            removed += 1;
        }

        if removed == 0 {
            return Ok(0);
        }

        let mut batch = WriteBatch::default();
        batch.delete_range_cf(entries, self.prefix.clone(), queue_prefix_end(&self.name));
        batch.put_cf(
            self.kv.cf(SIZES_CF)?,
            self.name.as_bytes(),
            encode_delta(0),
        );
        self.kv.write(batch)?;

        counter!(ENTRIES_CLEARED_COUNTER, "queue" => self.name.clone()).increment(removed);
        info!(queue = %self.name, removed, "cleared queue");
        Ok(removed)
    }

    /// Visit every entry of a snapshot of the queue in pop order, with a
    /// zero-based index. A visitor error stops iteration and propagates.
    pub fn each<F, E>(&self, visit: F) -> Result<(), E>
    where
        F: FnMut(usize, &[u8], &[u8]) -> Result<(), E>,
        E: From<QueueError>,
    {
        self.scan_window(0, usize::MAX, visit)
    }

    /// Like [`each`](Queue::each), bounded to the window `[start, start+count)`
    /// of the same order. The index passed to the visitor is the position
    /// within the page. A window past the end yields a short or empty result.
    pub fn page<F, E>(&self, start: usize, count: usize, visit: F) -> Result<(), E>
    where
        F: FnMut(usize, &[u8], &[u8]) -> Result<(), E>,
        E: From<QueueError>,
    {
        self.scan_window(start, count, visit)
    }

    fn scan_window<F, E>(&self, start: usize, count: usize, mut visit: F) -> Result<(), E>
    where
        F: FnMut(usize, &[u8], &[u8]) -> Result<(), E>,
        E: From<QueueError>,
    {
        if count == 0 {
            return Ok(());
        }

        let entries = self.kv.cf(ENTRIES_CF).map_err(E::from)?;
        // Snapshot semantics: mutations racing with the traversal are
        // neither revisited nor skipped, they simply aren't part of it
        let snapshot = self.kv.db.snapshot();
        let iter =
            snapshot.iterator_cf(entries, IteratorMode::From(&self.prefix, Direction::Forward));

        let mut position = 0usize;
        let mut index = 0usize;
        for item in iter {
            let (key, payload) = item.map_err(|e| E::from(QueueError::store("scan")(e)))?;
            if !key.starts_with(&self.prefix) {
                break;
            }
            if position < start {
                position += 1;
                continue;
            }
            visit(index, &key, &payload)?;
            index += 1;
            if index == count {
                break;
            }
        }
        Ok(())
    }
}
