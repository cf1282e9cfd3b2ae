mod metrics_consts;

// We do this pattern (privately use a module, then re-export parts of it) so we can
// refactor/rename or generally futz around with the internals without breaking the public API

// Types
mod types;
pub use types::Bytes;

// Errors
mod error;
// Errors are distinguishable by kind, so callers can decide whether to retry (Store)
// or fail fast (InvalidName)
pub use error::QueueError;

// Name validation
mod names;
pub use names::validate_queue_name;

// Key codec - the single source of truth for entry ordering
mod keys;
pub use keys::queue_prefix;
pub use keys::EntryKey;

// RocksDB wrapper
mod kv;

// Queue handles
mod queue;
pub use queue::Queue;

// Registry
mod store;
pub use store::Store;

// Config
mod config;
pub use config::StoreConfig;
