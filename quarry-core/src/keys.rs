use crate::error::QueueError;

/// Separator between the queue name and the ordering suffix. Queue names are
/// restricted to `[A-Za-z0-9_.-]`, so NUL can never appear inside one.
const SEPARATOR: u8 = 0;

/// Byte length of the ordering suffix: one inverted priority byte plus an
/// eight-byte big-endian sequence.
const SUFFIX_LEN: usize = 1 + 8;

/// Composite ordering key for one queue entry.
///
/// Encoded format: `[name bytes][0x00][0xFF - priority][8 bytes sequence BE]`.
/// Ascending byte order over encoded keys equals (queue name, priority
/// descending, sequence ascending), so the backing store's native key sort
/// yields entries in pop order. Pop, each and page all scan through this
/// codec rather than re-deriving order elsewhere.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct EntryKey {
    pub queue: String,
    pub priority: u8,
    pub sequence: u64,
}

impl EntryKey {
    pub fn new(queue: String, priority: u8, sequence: u64) -> Self {
        Self {
            queue,
            priority,
            sequence,
        }
    }
}

impl From<&EntryKey> for Vec<u8> {
    fn from(key: &EntryKey) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(key.queue.len() + 1 + SUFFIX_LEN);
        bytes.extend_from_slice(key.queue.as_bytes());
        bytes.push(SEPARATOR);
        // Inverted so that a larger priority produces a smaller byte, i.e.
        // sorts earlier in an ascending scan
        bytes.push(0xFF - key.priority);
        bytes.extend_from_slice(&key.sequence.to_be_bytes());
        bytes
    }
}

impl From<EntryKey> for Vec<u8> {
    fn from(key: EntryKey) -> Vec<u8> {
        (&key).into()
    }
}

impl TryFrom<&[u8]> for EntryKey {
    type Error = QueueError;

    fn try_from(bytes: &[u8]) -> Result<Self, QueueError> {
        let sep = bytes
            .iter()
            .position(|&b| b == SEPARATOR)
            .ok_or_else(|| QueueError::CorruptKey(format!("no separator in {bytes:?}")))?;

        let suffix = &bytes[sep + 1..];
        if suffix.len() != SUFFIX_LEN {
            return Err(QueueError::CorruptKey(format!(
                "expected {SUFFIX_LEN}-byte suffix, got {} bytes",
                suffix.len()
            )));
        }

        let queue = std::str::from_utf8(&bytes[..sep])
            .map_err(|_| QueueError::CorruptKey(format!("non-UTF-8 queue name in {bytes:?}")))?
            .to_string();
        let priority = 0xFF - suffix[0];
        let sequence_bytes: [u8; 8] = suffix[1..]
            .try_into()
            .map_err(|_| QueueError::CorruptKey(format!("short sequence in {bytes:?}")))?;

        Ok(Self {
            queue,
            priority,
            sequence: u64::from_be_bytes(sequence_bytes),
        })
    }
}

/// The scan prefix that scopes one queue's entries: `[name bytes][0x00]`.
///
/// Because names cannot contain the separator, the prefix for `"a"` never
/// matches keys belonging to `"ab"`.
pub fn queue_prefix(name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(name.len() + 1);
    bytes.extend_from_slice(name.as_bytes());
    bytes.push(SEPARATOR);
    bytes
}

/// Exclusive upper bound for a queue's key range, used for range deletes.
/// The separator is the smallest byte, so bumping it to 0x01 produces the
/// first key past every entry of the queue.
pub(crate) fn queue_prefix_end(name: &str) -> Vec<u8> {
    let mut bytes = queue_prefix(name);
    *bytes.last_mut().expect("prefix is never empty") = SEPARATOR + 1;
    bytes
}
