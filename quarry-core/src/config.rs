use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// A store config object, designed to be passable across API boundaries
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    /// Directory holding the backing database.
    pub path: PathBuf,
    /// Create the database if it does not exist yet. Default to true.
    pub create_if_missing: Option<bool>,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            create_if_missing: None,
        }
    }
}
