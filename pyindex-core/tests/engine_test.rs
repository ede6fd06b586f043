use bytes::Bytes;
use pyindex_core::hash::sha256_hash;
use pyindex_core::{normalize, FileStore, IndexEngine, IndexError, VersionKey};
use std::sync::Arc;
use tempfile::TempDir;

async fn engine_in(dir: &TempDir) -> IndexEngine {
    IndexEngine::new(FileStore::open(dir.path()).await.unwrap())
}

fn filenames(listing: &[pyindex_core::FileEntry]) -> Vec<&str> {
    listing.iter().map(|f| f.filename.as_str()).collect()
}

#[tokio::test]
async fn ingest_groups_by_normalized_name() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir).await;

    let stored = engine
        .ingest("Foo-Bar", "foo_bar-1.0.tar.gz", Bytes::from_static(b"sdist"))
        .await
        .unwrap();
    assert_eq!(stored.project.as_str(), "foo-bar");

    let projects = engine.list_projects().await.unwrap();
    assert_eq!(projects, vec![normalize("foo-bar")]);

    let listing = engine.list_files(&normalize("foo-bar")).await.unwrap();
    assert_eq!(filenames(&listing), vec!["foo_bar-1.0.tar.gz"]);
    assert_eq!(listing[0].version, Ok(VersionKey::parse("1.0").unwrap()));
    assert_eq!(listing[0].sha256, sha256_hash(b"sdist"));
    assert_eq!(listing[0].size, 5);
    assert!(dir.path().join("foo-bar").join("foo_bar-1.0.tar.gz").is_file());
}

#[tokio::test]
async fn listing_is_version_ordered() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir).await;

    for filename in ["pkg-2.0.tar.gz", "pkg-1.0.tar.gz", "pkg-1.0rc1.tar.gz", "pkg-10.0.tar.gz"] {
        engine
            .ingest("pkg", filename, Bytes::from(filename.to_string()))
            .await
            .unwrap();
    }

    let listing = engine.list_files(&normalize("pkg")).await.unwrap();
    assert_eq!(
        filenames(&listing),
        vec!["pkg-1.0rc1.tar.gz", "pkg-1.0.tar.gz", "pkg-2.0.tar.gz", "pkg-10.0.tar.gz"]
    );
}

#[tokio::test]
async fn unparseable_versions_list_last() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir).await;

    engine
        .ingest("pkg", "pkg-snapshot.tar.gz", Bytes::from_static(b"a"))
        .await
        .unwrap();
    engine
        .ingest("pkg", "pkg-0.1.tar.gz", Bytes::from_static(b"b"))
        .await
        .unwrap();
    engine
        .ingest("pkg", "pkg-latest.zip", Bytes::from_static(b"c"))
        .await
        .unwrap();

    let listing = engine.list_files(&normalize("pkg")).await.unwrap();
    assert_eq!(
        filenames(&listing),
        vec!["pkg-0.1.tar.gz", "pkg-latest.zip", "pkg-snapshot.tar.gz"]
    );
    assert!(listing[1].version.is_err());
    assert!(listing[2].version.is_err());
}

#[tokio::test]
async fn traversal_is_rejected_and_nothing_written() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("root");
    let engine = IndexEngine::new(FileStore::open(&root).await.unwrap());

    let err = engine
        .ingest("passwd", "../../etc/passwd", Bytes::from_static(b"x"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidFilename { .. }));
    assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    assert!(!dir.path().join("etc").exists());
}

#[tokio::test]
async fn duplicate_filename_is_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir).await;

    engine
        .ingest("foo", "foo-1.0.tar.gz", Bytes::from_static(b"one"))
        .await
        .unwrap();
    let err = engine
        .ingest("FOO", "foo-1.0.tar.gz", Bytes::from_static(b"two"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::AlreadyExists { .. }));

    let stat = engine
        .stat(&normalize("foo"), "foo-1.0.tar.gz")
        .await
        .unwrap();
    assert_eq!(stat.sha256, sha256_hash(b"one"));
}

#[cfg(unix)]
#[tokio::test]
async fn device_names_are_ordinary_projects() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir).await;

    for name in ["aux", "con", "nul", "prn", "com1"] {
        let filename = format!("{name}-1.0.tar.gz");
        let stored = engine
            .ingest(name, &filename, Bytes::from(filename.clone()))
            .await
            .unwrap();
        assert_eq!(stored.project.as_str(), name);

        let listing = engine.list_files(&normalize(name)).await.unwrap();
        assert_eq!(filenames(&listing), vec![filename.as_str()]);
    }
    assert_eq!(engine.list_projects().await.unwrap().len(), 5);
}

#[tokio::test]
async fn wheel_with_dashed_name_is_not_filed_under_prefix() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir).await;

    let err = engine
        .ingest("foo", "foo-bar-1.0-py3-none-any.whl", Bytes::from_static(b"wheel"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::InvalidFilename { .. }));
    assert!(!dir.path().join("foo").exists());

    engine
        .ingest("foo-bar", "foo_bar-1.0-1-py3-none-any.whl", Bytes::from_static(b"wheel"))
        .await
        .unwrap();
}

#[tokio::test]
async fn missing_project_is_not_found() {
    let dir = TempDir::new().unwrap();
    let engine = engine_in(&dir).await;

    assert!(matches!(
        engine.list_files(&normalize("nope")).await,
        Err(IndexError::NotFound(_))
    ));
    assert!(matches!(
        engine.open(&normalize("nope"), "nope-1.0.tar.gz").await,
        Err(IndexError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_distinct_ingests_all_succeed() {
    const N: usize = 32;
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine_in(&dir).await);

    let mut handles = Vec::new();
    for i in 0..N {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let filename = format!("pkg-1.{i}.tar.gz");
            engine
                .ingest("pkg", &filename, Bytes::from(filename.clone()))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let listing = engine.list_files(&normalize("pkg")).await.unwrap();
    assert_eq!(listing.len(), N);
    let expected: Vec<String> = (0..N).map(|i| format!("pkg-1.{i}.tar.gz")).collect();
    assert_eq!(filenames(&listing), expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_same_filename_has_one_winner() {
    const N: usize = 16;
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine_in(&dir).await);

    let mut handles = Vec::new();
    for i in 0..N {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            let content = Bytes::from(vec![i as u8; 4096]);
            engine.ingest("pkg", "pkg-1.0.tar.gz", content).await
        }));
    }

    let mut winners = Vec::new();
    let mut conflicts = 0;
    for (i, handle) in handles.into_iter().enumerate() {
        match handle.await.unwrap() {
            Ok(stored) => winners.push((i, stored)),
            Err(IndexError::AlreadyExists { .. }) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(conflicts, N - 1);

    let (i, stored) = &winners[0];
    let on_disk = std::fs::read(dir.path().join("pkg").join("pkg-1.0.tar.gz")).unwrap();
    assert_eq!(on_disk, vec![*i as u8; 4096]);
    assert_eq!(stored.sha256, sha256_hash(&on_disk));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("pkg"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp-"))
        .collect();
    assert!(leftovers.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn listing_never_goes_stale_under_concurrent_ingest() {
    const N: usize = 20;
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(engine_in(&dir).await);
    let project = normalize("pkg");

    for i in 0..N {
        let reader = {
            let engine = Arc::clone(&engine);
            let project = project.clone();
            tokio::spawn(async move { engine.list_files(&project).await })
        };
        engine
            .ingest("pkg", &format!("pkg-0.{i}.tar.gz"), Bytes::from_static(b"x"))
            .await
            .unwrap();
        let _ = reader.await.unwrap();

        let listing = engine.list_files(&project).await.unwrap();
        assert_eq!(listing.len(), i + 1);
    }
}
