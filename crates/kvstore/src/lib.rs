//! # kvstore
//!
//! Blocking access to the key-value store that holds node intent.
//!
//! The [`KvStore`] trait is the whole boundary: `get`, `list` and `put` over
//! JSON values. Two backends ship with the crate:
//!
//! - [`ConsulKv`] for a Consul agent's HTTP API
//! - [`MemoryKv`] for tests
//!
//! ## Example
//!
//! ```no_run
//! use kvstore::{ConsulKv, KvStore};
//! use std::time::Duration;
//!
//! let kv = ConsulKv::new("http://127.0.0.1:8500", None, Duration::from_secs(5));
//! for (app, value) in kv.list("nodes/web-1/")? {
//!     println!("{app}: {value}");
//! }
//! # Ok::<(), kvstore::Error>(())
//! ```

#![warn(missing_docs)]

pub mod consul;
pub mod error;
pub mod memory;

pub use consul::ConsulKv;
pub use error::{Error, Result};
pub use memory::MemoryKv;

use serde_json::Value;
use std::collections::BTreeMap;

/// Key-value store holding structured (JSON) values.
///
/// Absence is not an error: `get` returns `None` for a missing key and
/// `list` returns an empty map for a missing prefix.
pub trait KvStore: Send + Sync {
    /// Read one value.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// List the direct children of `prefix`, keyed relative to it.
    fn list(&self, prefix: &str) -> Result<BTreeMap<String, Value>>;

    /// Write one value.
    fn put(&self, key: &str, value: &Value) -> Result<()>;
}

/// Ensure a listing prefix ends with exactly one separator.
pub(crate) fn normalize_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("nodes/testhost"), "nodes/testhost/");
        assert_eq!(normalize_prefix("nodes/testhost/"), "nodes/testhost/");
        assert_eq!(normalize_prefix("nodes/testhost//"), "nodes/testhost/");
    }
}
