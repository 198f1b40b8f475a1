use crate::support::{demo_request, demo_source, importer, published};
use std::sync::Arc;
use std::time::Duration;
use syncspace::error::SourceError;
use syncspace::source::memory::SourceOp;
use syncspace::store::MemoryDocumentStore;
use syncspace::tree::{encode, RepoPath};
use syncspace::{CancelToken, ImportError};

fn rate_limited(secs: u64) -> SourceError {
    SourceError::RateLimited {
        retry_after: Some(Duration::from_secs(secs)),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limited_read_restarts_the_walk_after_retry_after() {
    let source = demo_source();
    source.fail_times(SourceOp::Read, "src/index.ts", 1, rate_limited(30));
    let store = Arc::new(MemoryDocumentStore::new());
    let started = tokio::time::Instant::now();

    let outcome = importer(source.clone(), store.clone())
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(30));
    assert!(outcome.warnings.is_empty(), "rate limits must not become warnings");
    let root_listings = source
        .calls()
        .into_iter()
        .filter(|(op, path)| *op == SourceOp::List && path.is_root())
        .count();
    assert_eq!(root_listings, 2);

    let (_, reader) = published(&store).await;
    let index = encode(&RepoPath::parse("src/index.ts").unwrap());
    assert_eq!(reader.text(&index).unwrap().as_deref(), Some("console.log(1)"));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_subdirectory_listing_is_retried() {
    let source = demo_source();
    source.fail_times(SourceOp::List, "src", 2, rate_limited(5));
    let store = Arc::new(MemoryDocumentStore::new());

    let outcome = importer(source.clone(), store.clone())
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.imported_file_count, 2);
    assert!(store.storage(&crate::support::room()).is_initialized());
}

#[tokio::test]
async fn persistent_rate_limit_exhausts_attempts() {
    let source = demo_source();
    source.fail_always(
        SourceOp::List,
        "",
        SourceError::RateLimited { retry_after: None },
    );
    let store = Arc::new(MemoryDocumentStore::new());

    let err = importer(source.clone(), store.clone())
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap_err();

    match err {
        ImportError::SourceUnavailable { source: cause, attempts } => {
            assert_eq!(attempts, 3);
            assert!(matches!(cause, SourceError::RateLimited { .. }));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(source.call_count(SourceOp::List), 3);
    assert!(store.operations().is_empty());
}

#[tokio::test]
async fn unauthorized_source_is_not_retried() {
    let source = demo_source();
    source.fail_always(
        SourceOp::List,
        "",
        SourceError::Unauthorized("bad token".to_string()),
    );
    let store = Arc::new(MemoryDocumentStore::new());

    let err = importer(source.clone(), store)
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ImportError::SourceUnavailable { attempts: 1, .. }
    ));
    assert_eq!(source.call_count(SourceOp::List), 1);
}
