use crate::error::QueueError;

/// Validate a queue name: non-empty, every character in `[A-Za-z0-9_.-]`.
///
/// Pure function, no I/O. There is no length maximum here; the backing
/// store's key-size limits bound it implicitly.
pub fn validate_queue_name(name: &str) -> Result<(), QueueError> {
    if name.is_empty() {
        return Err(QueueError::InvalidName(name.to_string()));
    }

    if name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
    {
        Ok(())
    } else {
        Err(QueueError::InvalidName(name.to_string()))
    }
}
