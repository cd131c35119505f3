//! Persistent content-hash cache.
//!
//! This crate provides the local cache that remembers, per object key, the
//! content hash last known to be stored remotely. The cache is not the source
//! of truth - the bucket is. If the cache file is deleted (or corrupted), the
//! next run simply probes the bucket again and rebuilds it.
//!
//! # On-disk Format
//! A single JSON object mapping object keys to hex content hashes:
//!
//! ```json
//! {
//!   "assets/app.js": "6a0c...",
//!   "index.html": "af13..."
//! }
//! ```
//!
//! The file is always rewritten whole, through a temporary sibling file that
//! is renamed into place.

pub mod error;
mod store;

pub use crate::store::HashCache;
