//! Document Model
//!
//! The File Tree Document: a CRDT document with one text container per file,
//! plus the structural snapshot published alongside it.

pub mod builder;
pub mod reader;
pub mod snapshot;

pub use builder::{BuiltDocument, DocumentBuilder};
pub use reader::DocumentReader;
pub use snapshot::{FileTreeSnapshot, NodeMetadata, RepoMeta, RoomStorage};
