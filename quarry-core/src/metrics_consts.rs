//! Metric name constants, labelled with `queue` unless noted.

pub const ENTRIES_PUSHED_COUNTER: &str = "quarry_entries_pushed_total";
pub const ENTRIES_POPPED_COUNTER: &str = "quarry_entries_popped_total";
pub const ENTRIES_CLEARED_COUNTER: &str = "quarry_entries_cleared_total";
