use crate::support::{demo_request, fast_config, room, WORKSPACE};
use std::sync::Arc;
use std::time::Duration;
use syncspace::import::ImportState;
use syncspace::source::memory::{MemorySource, SourceOp};
use syncspace::store::MemoryDocumentStore;
use syncspace::{CancelToken, ImportError, ImportRequest, Importer};

fn slow_source() -> Arc<MemorySource> {
    let source = MemorySource::new("main").with_latency(Duration::from_millis(20));
    for i in 0..8 {
        source.add_file(&format!("src/mod_{}/lib.rs", i), "pub fn f() {}");
    }
    Arc::new(source)
}

#[tokio::test]
async fn concurrent_import_of_same_workspace_is_rejected() {
    let store = Arc::new(MemoryDocumentStore::new());
    let importer = Importer::new(slow_source(), store.clone(), fast_config());
    let request = demo_request();
    let cancel = CancelToken::new();

    let (first, second) = tokio::join!(
        importer.import(&request, &cancel),
        importer.import(&request, &cancel)
    );

    let outcomes = [first, second];
    let conflicts = outcomes
        .iter()
        .filter(|r| matches!(r, Err(ImportError::ConcurrentImportConflict(_))))
        .count();
    assert_eq!(conflicts, 1);
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(store.update_count(&room()), 1);
}

#[tokio::test]
async fn different_workspaces_import_concurrently() {
    let store = Arc::new(MemoryDocumentStore::new());
    let importer = Importer::new(slow_source(), store.clone(), fast_config());
    let other = ImportRequest::new("ws-other", "acme", "demo", "main");
    let cancel = CancelToken::new();
    let request = demo_request();

    let (first, second) = tokio::join!(
        importer.import(&request, &cancel),
        importer.import(&other, &cancel)
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
async fn lock_is_released_after_an_import() {
    let store = Arc::new(MemoryDocumentStore::new());
    let importer = Importer::new(slow_source(), store, fast_config());

    for _ in 0..2 {
        importer
            .import(&demo_request(), &CancelToken::new())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn cancellation_during_walk_suppresses_publication() {
    let source = slow_source();
    let store = Arc::new(MemoryDocumentStore::new());
    let importer = Importer::new(source.clone(), store.clone(), fast_config());
    let cancel = CancelToken::new();
    let request = demo_request();

    let (result, _) = tokio::join!(importer.import(&request, &cancel), async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
    });

    assert!(matches!(result, Err(ImportError::Cancelled)));
    assert!(store.operations().is_empty());
    assert_eq!(importer.status(&room()), ImportState::Cancelled);
    // In-flight calls finish but nothing new starts after cancellation
    assert!(source.call_count(SourceOp::Read) < 8);
}

#[tokio::test]
async fn cancelled_token_makes_no_source_calls() {
    let source = slow_source();
    let store = Arc::new(MemoryDocumentStore::new());
    let importer = Importer::new(source.clone(), store.clone(), fast_config());
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = importer
        .import(&ImportRequest::new(WORKSPACE, "acme", "demo", "main"), &cancel)
        .await
        .unwrap_err();

    assert_eq!(err, ImportError::Cancelled);
    assert!(source.calls().is_empty());
    assert!(store.operations().is_empty());
}
