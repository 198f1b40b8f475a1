//! Syncspace: GitHub Repository Import
//!
//! Walks a GitHub repository and materializes it as a collaborative workspace
//! document: a CRDT document with one text container per file, plus a
//! structural file-tree snapshot, both published to a Shared Document Store
//! room keyed by the workspace id.

pub mod concurrency;
pub mod config;
pub mod document;
pub mod error;
pub mod import;
pub mod logging;
pub mod source;
pub mod store;
pub mod tooling;
pub mod tree;
pub mod types;

pub use concurrency::CancelToken;
pub use error::{ImportError, SourceError, StoreError};
pub use import::{ImportOutcome, ImportReport, ImportRequest, Importer};
pub use types::WorkspaceId;
