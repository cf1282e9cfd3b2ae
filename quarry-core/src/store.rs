use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use rocksdb::{ColumnFamilyDescriptor, IteratorMode, Options};
use tracing::{info, warn};

use crate::config::StoreConfig;
use crate::error::QueueError;
use crate::kv::{self, KvStore};
use crate::names::validate_queue_name;
use crate::queue::Queue;

// Column families. Entry keys map to payloads; the two counter families are
// keyed by queue name and resolved through their merge operators.
pub(crate) const ENTRIES_CF: &str = "entries";
pub(crate) const SIZES_CF: &str = "sizes";
pub(crate) const SEQUENCES_CF: &str = "sequences";

/// Registry mapping validated queue names to [`Queue`] handles, owner of the
/// backing database.
///
/// Queues exist lazily: a queue is just the set of entries under its name
/// prefix, so `get_queue` never registers anything and re-fetching a name
/// returns a handle over the same underlying entries. The registry keeps one
/// handle per name so that all callers share one sequence allocator.
pub struct Store {
    kv: Arc<KvStore>,
    queues: RwLock<HashMap<String, Arc<Queue>>>,
}

impl Store {
    pub fn open(config: StoreConfig) -> Result<Self, QueueError> {
        let mut sizes_opts = Options::default();
        sizes_opts.set_merge_operator_associative("signed_add", kv::adding_merge);
        let mut sequences_opts = Options::default();
        sequences_opts.set_merge_operator_associative("u64_max", kv::max_merge);

        let kv = KvStore::open(
            &config.path,
            config.create_if_missing.unwrap_or(true),
            vec![
                ColumnFamilyDescriptor::new(ENTRIES_CF, Options::default()),
                ColumnFamilyDescriptor::new(SIZES_CF, sizes_opts),
                ColumnFamilyDescriptor::new(SEQUENCES_CF, sequences_opts),
            ],
        )?;

        info!(path = %config.path.display(), "opened queue store");
        Ok(Self {
            kv: Arc::new(kv),
            queues: RwLock::new(HashMap::new()),
        })
    }

    /// Validate `name` and return its queue handle, creating the handle on
    /// first use. Fails only with [`QueueError::InvalidName`] here; storage
    /// errors surface from operations on the handle.
    pub fn get_queue(&self, name: &str) -> Result<Arc<Queue>, QueueError> {
        validate_queue_name(name)?;

        if let Some(queue) = self
            .queues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(queue.clone());
        }

        let mut queues = self.queues.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have created the handle while we waited
        if let Some(queue) = queues.get(name) {
            return Ok(queue.clone());
        }

        let queue = Arc::new(Queue::open(self.kv.clone(), name.to_string())?);
        queues.insert(name.to_string(), queue.clone());
        Ok(queue)
    }

    /// Names of every queue that has ever accepted a push, whether or not it
    /// currently holds entries.
    pub fn queue_names(&self) -> Result<Vec<String>, QueueError> {
        let sizes = self.kv.cf(SIZES_CF)?;
        let mut names = Vec::new();
        for item in self.kv.db.iterator_cf(sizes, IteratorMode::Start) {
            let (key, _) = item.map_err(QueueError::store("scan"))?;
            match String::from_utf8(key.into_vec()) {
                Ok(name) => names.push(name),
                Err(err) => warn!(?err, "skipping non-UTF-8 queue name in sizes family"),
            }
        }
        Ok(names)
    }

    /// Force memtables to disk.
    pub fn flush(&self) -> Result<(), QueueError> {
        for cf in [ENTRIES_CF, SIZES_CF, SEQUENCES_CF] {
            self.kv.flush_cf(cf)?;
        }
        Ok(())
    }

    /// Flush and release the backing database.
    ///
    /// Dropping the store has the same effect; `close` exists so callers can
    /// observe flush failures on their exit paths. Queue handles still held
    /// elsewhere keep the database alive until they are dropped too.
    pub fn close(self) -> Result<(), QueueError> {
        self.flush()?;
        info!("closed queue store");
        Ok(())
    }
}
