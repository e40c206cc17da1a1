//! Cache module for storing API responses to disk
//!
//! `CacheManager` persists payloads as timestamped JSON files, one per key.
//! `ResponseCache` layers the TTL decision and per-key fetch serialization on top.

mod manager;
mod response;

pub use manager::{CacheManager, CachedData};
pub use response::{cache_key, ResponseCache};
