use std::path::Path;

use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, MergeOperands, Options, WriteBatch, DB};
use tracing::debug;

use crate::error::QueueError;

/// Thin wrapper around the RocksDB handle shared by every queue in a store.
///
/// Column families and their merge operators are chosen by the caller at
/// open time; this type only maps RocksDB errors into [`QueueError`] and
/// keeps handle lookup in one place.
pub(crate) struct KvStore {
    pub(crate) db: DB,
}

impl KvStore {
    pub fn open(
        path: &Path,
        create_if_missing: bool,
        cf_descriptors: Vec<ColumnFamilyDescriptor>,
    ) -> Result<Self, QueueError> {
        let mut opts = Options::default();
        opts.create_if_missing(create_if_missing);
        opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(QueueError::store("open"))?;
        debug!(path = %path.display(), "opened rocksdb");
        Ok(Self { db })
    }

    pub fn cf(&self, name: &'static str) -> Result<&ColumnFamily, QueueError> {
        self.db
            .cf_handle(name)
            .ok_or(QueueError::MissingColumnFamily(name))
    }

    pub fn get(&self, cf: &'static str, key: &[u8]) -> Result<Option<Vec<u8>>, QueueError> {
        self.db
            .get_cf(self.cf(cf)?, key)
            .map_err(QueueError::store("get"))
    }

    /// Apply a batch as one atomic unit. Readers observe all of it or none.
    pub fn write(&self, batch: WriteBatch) -> Result<(), QueueError> {
        self.db.write(batch).map_err(QueueError::store("write"))
    }

    pub fn flush_cf(&self, cf: &'static str) -> Result<(), QueueError> {
        self.db
            .flush_cf(self.cf(cf)?)
            .map_err(QueueError::store("flush"))
    }
}

// Counter values are signed 64-bit little-endian so that decrements can ride
// the same associative merge as increments. Sequence high-water marks are
// unsigned 64-bit big-endian, matching their encoding inside entry keys.

pub(crate) fn encode_delta(delta: i64) -> [u8; 8] {
    delta.to_le_bytes()
}

pub(crate) fn decode_count(bytes: &[u8]) -> u64 {
    let value = bytes.try_into().map(i64::from_le_bytes).unwrap_or(0);
    value.max(0) as u64
}

pub(crate) fn encode_sequence(sequence: u64) -> [u8; 8] {
    sequence.to_be_bytes()
}

pub(crate) fn decode_sequence(bytes: &[u8]) -> u64 {
    bytes.try_into().map(u64::from_be_bytes).unwrap_or(0)
}

/// Associative merge operator summing signed deltas, used for size counters.
pub(crate) fn adding_merge(
    _key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let mut total = existing
        .map(|bytes| bytes.try_into().map(i64::from_le_bytes).unwrap_or(0))
        .unwrap_or(0);
    for operand in operands {
        total += operand.try_into().map(i64::from_le_bytes).unwrap_or(0);
    }
    Some(total.to_le_bytes().to_vec())
}

/// Associative merge operator keeping the largest value, used for sequence
/// high-water marks. Pushes may commit out of issuance order, so a plain
/// overwrite could move the mark backwards; max never does.
pub(crate) fn max_merge(
    _key: &[u8],
    existing: Option<&[u8]>,
    operands: &MergeOperands,
) -> Option<Vec<u8>> {
    let mut high = existing.map(decode_sequence).unwrap_or(0);
    for operand in operands {
        high = high.max(decode_sequence(operand));
    }
    Some(high.to_be_bytes().to_vec())
}
