use std::sync::Arc;
use syncspace::config::ImportConfig;
use syncspace::document::{DocumentReader, RoomStorage};
use syncspace::source::memory::MemorySource;
use syncspace::store::{DocumentStore, MemoryDocumentStore};
use syncspace::{ImportRequest, Importer, WorkspaceId};

pub const WORKSPACE: &str = "ws-demo";

/// Import tuning with millisecond backoff so retry tests stay fast.
pub fn fast_config() -> ImportConfig {
    ImportConfig {
        backoff_base_ms: 1,
        backoff_max_ms: 8,
        ..ImportConfig::default()
    }
}

/// The acme/demo repository: README.md, src/index.ts and an empty docs/.
pub fn demo_source() -> Arc<MemorySource> {
    let source = MemorySource::new("main");
    source
        .add_file("README.md", "# Demo\n")
        .add_file("src/index.ts", "console.log(1)")
        .add_directory("docs");
    Arc::new(source)
}

pub fn demo_request() -> ImportRequest {
    ImportRequest::new(WORKSPACE, "acme", "demo", "main")
}

pub fn importer(source: Arc<MemorySource>, store: Arc<MemoryDocumentStore>) -> Importer {
    Importer::new(source, store, fast_config())
}

pub fn room() -> WorkspaceId {
    WorkspaceId::from(WORKSPACE)
}

pub async fn published(store: &MemoryDocumentStore) -> (RoomStorage, DocumentReader) {
    let document = store.get_document(&room()).await.unwrap();
    let reader = document.reader().unwrap();
    (document.storage, reader)
}
