//! Decide, per file, whether publishing is needed, and publish it.
//!
//! Files produced by a build arrive as [`FileRecord`]s. Each one is
//! [fingerprinted](fingerprint), checked against the local [hash
//! cache](shipr_cache::HashCache), and only if the cache can't vouch for it is
//! the remote probed. Records come out of [`Publisher::publish`] carrying an
//! [`UploadOutcome`] that says what happened to them:
//!
//! | Disposition | Backend calls       | Meaning                                  |
//! |-------------|---------------------|------------------------------------------|
//! | `cache`     | none                | the cache already knew this content      |
//! | `skip`      | probe               | the remote already holds this content    |
//! | `update`    | probe, upload       | the remote held something else           |
//! | `create`    | probe, upload       | the remote held nothing                  |
//! | `delete`    | (optionally) delete | the record was flagged for deletion      |

pub mod error;
mod content_type;
mod decide;
mod encode;
mod fingerprint;
mod probe;
mod publisher;
mod record;
mod report;
mod upload;

pub use crate::content_type::{DEFAULT_CONTENT_TYPE, content_type};
pub use crate::decide::{Decision, Policy, decide, is_cached};
pub use crate::encode::Encoder;
pub use crate::fingerprint::fingerprint;
pub use crate::probe::{RemoteState, probe};
pub use crate::publisher::{DEFAULT_TIMEOUT, PublishEvent, PublishOptions, Publisher};
pub use crate::record::{Contents, Disposition, FileRecord, UploadOutcome};
pub use crate::report::{Reporter, Summary};
pub use crate::upload::UploadExecutor;
