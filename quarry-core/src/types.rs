// Job payloads are opaque to this layer - producers and consumers agree on the
// contents, the engine only orders and counts them.
pub type Bytes = Vec<u8>;
