use crate::support::{demo_request, demo_source, importer, published, room};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use syncspace::document::FileTreeSnapshot;
use syncspace::error::SourceError;
use syncspace::source::memory::{MemorySource, SourceOp};
use syncspace::store::MemoryDocumentStore;
use syncspace::tree::{encode, NodeId, RepoPath};
use syncspace::CancelToken;

fn id(path: &str) -> NodeId {
    encode(&RepoPath::parse(path).unwrap())
}

/// Every non-root node is referenced by exactly one directory.
fn assert_tree_complete(tree: &FileTreeSnapshot) {
    let mut parents: HashMap<&NodeId, usize> = HashMap::new();
    for node in tree.files.values() {
        for child in node.children.iter().flatten() {
            assert!(tree.files.contains_key(child), "dangling child {}", child);
            *parents.entry(child).or_default() += 1;
        }
    }
    for node_id in tree.files.keys() {
        let expected = if *node_id == tree.root_dir_id { 0 } else { 1 };
        assert_eq!(
            parents.get(node_id).copied().unwrap_or(0),
            expected,
            "parent count of {}",
            node_id
        );
    }
}

#[tokio::test]
async fn imports_demo_repository() {
    let store = Arc::new(MemoryDocumentStore::new());
    let outcome = importer(demo_source(), store.clone())
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.imported_file_count, 2);
    assert_eq!(outcome.directory_count, 2);
    assert!(outcome.warnings.is_empty());

    let (storage, reader) = published(&store).await;
    let tree = storage.file_tree.expect("file tree published");
    assert!(tree.is_initialized);
    assert_eq!(tree.active_file_id, "");
    assert_eq!(tree.root_dir_id, NodeId::root());
    assert_eq!(tree.files.len(), 5);

    let root = tree.root().unwrap();
    let root_children: HashSet<_> = root.children.clone().unwrap().into_iter().collect();
    assert_eq!(
        root_children,
        HashSet::from([id("README.md"), id("src"), id("docs")])
    );
    assert_eq!(
        tree.files[&id("src")].children,
        Some(vec![id("src/index.ts")])
    );
    assert_eq!(tree.files[&id("docs")].children, Some(vec![]));
    assert_eq!(
        tree.files[&id("src/index.ts")].language.as_deref(),
        Some("typescript")
    );
    assert_tree_complete(&tree);

    assert_eq!(
        reader.text(&id("src/index.ts")).unwrap().as_deref(),
        Some("console.log(1)")
    );
    assert_eq!(
        reader.text(&id("README.md")).unwrap().as_deref(),
        Some("# Demo\n")
    );

    let meta = storage.repo_meta.unwrap();
    assert_eq!((meta.owner.as_str(), meta.name.as_str()), ("acme", "demo"));
    assert_eq!(meta.default_branch, "main");
}

#[tokio::test]
async fn unreadable_file_is_imported_empty_with_warning() {
    let source = demo_source();
    source.add_file("src/broken.ts", "never read");
    source.fail_always(
        SourceOp::Read,
        "src/broken.ts",
        SourceError::Transient("connection reset".to_string()),
    );
    let store = Arc::new(MemoryDocumentStore::new());

    let outcome = importer(source, store.clone())
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.imported_file_count, 3);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].path.as_str(), "src/broken.ts");

    let (storage, reader) = published(&store).await;
    let tree = storage.file_tree.unwrap();
    assert!(tree.files.contains_key(&id("src/broken.ts")));
    assert_tree_complete(&tree);
    assert_eq!(reader.text(&id("src/broken.ts")).unwrap().as_deref(), Some(""));
    assert_eq!(
        reader.text(&id("src/index.ts")).unwrap().as_deref(),
        Some("console.log(1)")
    );
}

#[tokio::test]
async fn reimport_keeps_ids_for_unchanged_paths() {
    let source = demo_source();
    let store = Arc::new(MemoryDocumentStore::new());
    let importer = importer(source.clone(), store.clone());

    importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();
    let first = store.storage(&room()).file_tree.unwrap();

    source.add_file("docs/guide.md", "guide");
    importer
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();
    let second = store.storage(&room()).file_tree.unwrap();

    for node_id in first.files.keys() {
        assert!(second.files.contains_key(node_id), "lost {}", node_id);
    }
    assert!(second.files.contains_key(&id("docs/guide.md")));
    assert_eq!(second.files.len(), first.files.len() + 1);
    assert!(second.is_initialized);
    assert_tree_complete(&second);
    assert_eq!(store.update_count(&room()), 2);

    let (_, reader) = published(&store).await;
    assert_eq!(reader.text(&id("docs/guide.md")).unwrap().as_deref(), Some("guide"));
    assert_eq!(
        reader.text(&id("src/index.ts")).unwrap().as_deref(),
        Some("console.log(1)")
    );
}

#[tokio::test]
async fn reimport_replaces_text_of_changed_added_and_removed_files() {
    // Fresh room per round; each import draws new CRDT client ids.
    for round in 0..16 {
        let source = demo_source();
        let store = Arc::new(MemoryDocumentStore::new());
        let importer = importer(source.clone(), store.clone());
        importer
            .import(&demo_request(), &CancelToken::new())
            .await
            .unwrap();

        source
            .add_file("src/index.ts", "console.log(2)")
            .add_file("src/new.ts", "export {}")
            .remove_file("README.md");
        importer
            .import(&demo_request(), &CancelToken::new())
            .await
            .unwrap();

        let (storage, reader) = published(&store).await;
        let tree = storage.file_tree.unwrap();
        assert_tree_complete(&tree);
        assert!(!tree.files.contains_key(&id("README.md")));
        assert_eq!(
            reader.text(&id("src/index.ts")).unwrap().as_deref(),
            Some("console.log(2)"),
            "round {}",
            round
        );
        assert_eq!(
            reader.text(&id("src/new.ts")).unwrap().as_deref(),
            Some("export {}"),
            "round {}",
            round
        );
        assert!(!reader.contains(&id("README.md")), "round {}", round);
        for node in tree.files.values().filter(|n| n.children.is_none()) {
            assert!(reader.text(&node.id).unwrap().is_some(), "no text for {}", node.path);
        }
    }
}

#[tokio::test]
async fn deep_tree_is_complete() {
    let source = MemorySource::new("main");
    for a in 0..3 {
        for b in 0..3 {
            source.add_file(&format!("d{}/e{}/f.txt", a, b), format!("{}{}", a, b));
        }
        source.add_file(&format!("d{}/top.md", a), "top");
    }
    source.add_directory("empty/nested");
    let store = Arc::new(MemoryDocumentStore::new());

    let outcome = importer(Arc::new(source), store.clone())
        .import(&demo_request(), &CancelToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.imported_file_count, 12);
    // d0..d2, their e0..e2, empty and empty/nested
    assert_eq!(outcome.directory_count, 14);

    let (storage, reader) = published(&store).await;
    let tree = storage.file_tree.unwrap();
    assert_tree_complete(&tree);
    assert_eq!(tree.file_count(), 12);
    assert_eq!(reader.text(&id("d2/e1/f.txt")).unwrap().as_deref(), Some("21"));
}

#[tokio::test]
async fn missing_branch_fails_without_publishing() {
    let store = Arc::new(MemoryDocumentStore::new());
    let request = syncspace::ImportRequest::new(crate::support::WORKSPACE, "acme", "demo", "dev");

    let err = importer(demo_source(), store.clone())
        .import(&request, &CancelToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        syncspace::ImportError::SourceUnavailable {
            source: SourceError::NotFound(_),
            ..
        }
    ));
    assert!(store.operations().is_empty());
}
