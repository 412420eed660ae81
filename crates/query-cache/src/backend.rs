//! Cache backend abstraction
//!
//! A backend is a thread-safe key-value store for one region. Values are the
//! encoded bytes of a cached result; the backend never looks inside them.

use crate::error::CacheResult;
use std::fmt::Debug;
use std::time::Duration;

/// Key-value store serving one cache region.
///
/// Implementations must be safe for concurrent use and are expected to apply
/// their own timeouts. Callers never retry a failed call.
pub trait CacheBackend: Send + Sync + Debug {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// A zero `timeout` means the entry does not expire.
    fn set(&self, key: &str, value: Vec<u8>, timeout: Duration) -> CacheResult<()>;

    /// Remove `key`, returning whether an entry was present
    fn delete(&self, key: &str) -> CacheResult<bool>;
}
