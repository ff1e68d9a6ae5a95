//! Storage helpers
//!
//! - Time-boxed lookup cache with an injectable clock

pub mod cache;

pub use cache::{CacheStats, Clock, ManualClock, SystemClock, TtlCache, DEFAULT_TTL_SECS};
