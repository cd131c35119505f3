pub mod backend;
pub mod error;
mod hash;
mod models;
mod path;

pub use crate::backend::{FileInfoStream, StorageBackend};
pub use crate::hash::ContentHash;
pub use crate::models::{FileInfo, RemoteMeta, UploadOptions, Uploaded};
pub use crate::path::{to_key, validate as validate_path};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;
