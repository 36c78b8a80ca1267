//! End-to-end pipeline tests against a mock embedding endpoint and the
//! in-memory vector backend.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use repovec_config::{
    BackendKind, CollectionsConfigFile, DomainRules, EmbeddingSettings, IngestConfig, Priority,
    QdrantSettings, RepoType, Repository,
};
use repovec_parsers::{chunk_hash, Language};
use repovec_pipeline::{CheckpointRecord, CheckpointStore, Pipeline};
use repovec_store::memory::InMemoryBackend;
use repovec_store::point_id;

const DIMENSION: usize = 4;

/// Responds with one `0.1`-vector per input, mirroring the request length.
struct EchoEmbeddings;

impl Respond for EchoEmbeddings {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or(json!({}));
        let count = body["input"].as_array().map(|a| a.len()).unwrap_or(0);
        let data: Vec<serde_json::Value> = (0..count)
            .map(|i| json!({ "embedding": vec![0.1_f32; DIMENSION], "index": i }))
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

async fn mock_embedding_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EchoEmbeddings)
        .mount(&server)
        .await;
    server
}

fn config(workdir: &Path, embed_url: &str) -> IngestConfig {
    IngestConfig {
        repos_base_dir: workdir.to_path_buf(),
        backend: BackendKind::Managed,
        qdrant: Some(QdrantSettings {
            url: "http://localhost:6334".into(),
            api_key: None,
        }),
        surreal: None,
        embedding: EmbeddingSettings {
            base_url: embed_url.into(),
            api_key: "test-key".into(),
            model: "embed-large".into(),
            dimension: DIMENSION,
        },
        batch_size: 2,
        rate_limit: 2,
        request_timeout_secs: 5,
        max_retries: 0,
        max_file_size: 500_000,
        skip_dirs: IngestConfig::default_skip_dirs(),
        collections: CollectionsConfigFile::default().resolve().unwrap(),
        domains: DomainRules::default(),
        checkpoint_path: workdir.join("ingestion_checkpoint.json"),
        checkpoint_frequency: BTreeMap::new(),
    }
}

fn repository(id: &str, path: &Path) -> Repository {
    Repository {
        id: id.into(),
        path: path.to_path_buf(),
        repo_type: RepoType::Backend,
        languages: vec!["rust".into()],
        components: Vec::new(),
        priority: Priority::Medium,
        service_dependencies: Vec::new(),
    }
}

#[tokio::test]
async fn single_function_round_trip() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(repo_dir.join("svc")).unwrap();

    let source = "pub fn verify_token(t: &str) -> bool { !t.is_empty() }";
    std::fs::write(repo_dir.join("svc/auth.rs"), source).unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(
        Arc::new(config(workdir.path(), &server.uri())),
        backend.clone(),
    )
    .unwrap();

    let stats = pipeline
        .ingest(&[repository("core", &repo_dir)], false)
        .await
        .unwrap();

    assert_eq!(stats.repos_processed, 1);
    assert_eq!(stats.files_by_language["rust"], 1);
    assert_eq!(stats.chunks_stored, 1);
    assert_eq!(stats.chunks_by_domain["auth"], 1);
    assert!(stats.errors.is_empty());

    // The stored point id is the UUID of the canonical chunk hash.
    let expected_hash = chunk_hash(
        Language::Rust,
        "svc/auth.rs",
        "function",
        "verify_token",
        source,
    );
    let ids = backend.point_ids("rust_code").await;
    assert_eq!(ids, vec![point_id(&expected_hash)]);
}

#[tokio::test]
async fn reingestion_is_idempotent() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(repo_dir.join("src")).unwrap();
    std::fs::write(
        repo_dir.join("src/lib.rs"),
        "pub fn a() {}\npub fn b() {}\npub fn c() {}\n",
    )
    .unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let repos = [repository("core", &repo_dir)];

    for _ in 0..2 {
        let pipeline = Pipeline::new(
            Arc::new(config(workdir.path(), &server.uri())),
            backend.clone(),
        )
        .unwrap();
        pipeline.ingest(&repos, false).await.unwrap();
    }

    // Same chunk hash maps to the same point id; the second run overwrites.
    assert_eq!(backend.point_count("rust_code").await, 3);
}

#[tokio::test]
async fn failing_batch_contributes_zero_chunks() {
    let server = MockServer::start().await;
    // Second batch (the one containing `charlie`) always fails.
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(body_string_contains("charlie"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(EchoEmbeddings)
        .with_priority(5)
        .mount(&server)
        .await;

    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(repo_dir.join("src")).unwrap();
    // Four chunks, batch_size 2: batch 1 = alpha/bravo, batch 2 = charlie/delta.
    std::fs::write(
        repo_dir.join("src/lib.rs"),
        "pub fn alpha() {}\npub fn bravo() {}\npub fn charlie() {}\npub fn delta() {}\n",
    )
    .unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(
        Arc::new(config(workdir.path(), &server.uri())),
        backend.clone(),
    )
    .unwrap();

    let stats = pipeline
        .ingest(&[repository("core", &repo_dir)], false)
        .await
        .unwrap();

    assert_eq!(stats.chunks_stored, 2, "failed batch stores nothing");
    assert_eq!(backend.point_count("rust_code").await, 2);
    assert_eq!(stats.errors.len(), 1);
    assert!(stats.errors[0].cause.contains("embedding failed"));
}

#[tokio::test]
async fn resume_skips_checkpointed_prefix_and_completed_repos() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(repo_dir.join("src")).unwrap();
    std::fs::write(repo_dir.join("src/a.rs"), "pub fn from_a() {}").unwrap();
    std::fs::write(repo_dir.join("src/b.rs"), "pub fn from_b() {}").unwrap();
    std::fs::write(repo_dir.join("src/c.rs"), "pub fn from_c() {}").unwrap();

    let done_dir = workdir.path().join("done-repo");
    std::fs::create_dir_all(done_dir.join("src")).unwrap();
    std::fs::write(done_dir.join("src/x.rs"), "pub fn from_done() {}").unwrap();

    // A prior run completed `done-repo` and died after persisting src/a.rs.
    let cfg = config(workdir.path(), &server.uri());
    let store = CheckpointStore::new(cfg.checkpoint_path.clone());
    let mut record = CheckpointRecord::new("core", "rust");
    record.last_processed_file = "src/a.rs".into();
    record.files_processed = 1;
    record.chunks_processed = 1;
    record.completed_repos = vec!["done-repo".into()];
    store.save(&record).unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(Arc::new(cfg), backend.clone()).unwrap();
    let repos = [
        repository("done-repo", &done_dir),
        repository("core", &repo_dir),
    ];
    let stats = pipeline.ingest(&repos, true).await.unwrap();

    // Only b.rs and c.rs are processed in this run; done-repo is skipped.
    assert_eq!(stats.files_by_language["rust"], 2);
    assert_eq!(backend.point_count("rust_code").await, 2);
    let hash_b = chunk_hash(
        Language::Rust,
        "src/b.rs",
        "function",
        "from_b",
        "pub fn from_b() {}",
    );
    assert!(backend.point_ids("rust_code").await.contains(&point_id(&hash_b)));

    // Clean completion clears the checkpoint.
    assert!(store.load().unwrap().is_none());
}

#[tokio::test]
async fn oversized_file_is_skipped_with_a_warning() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(&repo_dir).unwrap();

    let mut cfg = config(workdir.path(), &server.uri());
    cfg.max_file_size = 100;

    std::fs::write(repo_dir.join("ok.rs"), "pub fn fine() {}").unwrap();
    std::fs::write(repo_dir.join("big.rs"), "x".repeat(101)).unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(Arc::new(cfg), backend.clone()).unwrap();
    let stats = pipeline
        .ingest(&[repository("core", &repo_dir)], false)
        .await
        .unwrap();

    assert_eq!(stats.files_skipped, 1);
    assert_eq!(stats.files_by_language["rust"], 1);
    assert_eq!(backend.point_count("rust_code").await, 1);
    assert!(stats
        .errors
        .iter()
        .any(|e| e.path == "big.rs" && e.cause.contains("exceeds limit")));
}

#[tokio::test]
async fn parse_failures_do_not_stop_the_repository() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(&repo_dir).unwrap();
    std::fs::write(repo_dir.join("bad.rs"), "fn broken( {").unwrap();
    std::fs::write(repo_dir.join("good.rs"), "pub fn fine() {}").unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(
        Arc::new(config(workdir.path(), &server.uri())),
        backend.clone(),
    )
    .unwrap();
    let stats = pipeline
        .ingest(&[repository("core", &repo_dir)], false)
        .await
        .unwrap();

    assert_eq!(stats.repos_processed, 1);
    assert_eq!(stats.repos_failed, 0);
    assert_eq!(backend.point_count("rust_code").await, 1);
    assert!(stats.errors.iter().any(|e| e.path == "bad.rs"));
}

#[tokio::test]
async fn missing_repository_is_recorded_and_skipped() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(&repo_dir).unwrap();
    std::fs::write(repo_dir.join("lib.rs"), "pub fn f() {}").unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(
        Arc::new(config(workdir.path(), &server.uri())),
        backend.clone(),
    )
    .unwrap();

    let ghost = repository("ghost", &workdir.path().join("missing"));
    let stats = pipeline
        .ingest(&[ghost, repository("core", &repo_dir)], false)
        .await
        .unwrap();

    assert_eq!(stats.repos_processed, 1);
    assert!(stats.errors.iter().any(|e| e.path == "ghost"));
    assert_eq!(backend.point_count("rust_code").await, 1);
}

#[tokio::test]
async fn cancelled_run_reports_cancellation() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(&repo_dir).unwrap();
    std::fs::write(repo_dir.join("lib.rs"), "pub fn f() {}").unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(
        Arc::new(config(workdir.path(), &server.uri())),
        backend,
    )
    .unwrap();

    pipeline.cancel_token().cancel();
    let stats = pipeline
        .ingest(&[repository("core", &repo_dir)], false)
        .await
        .unwrap();

    assert!(stats.cancelled);
    assert_eq!(stats.repos_processed, 0);
}

#[tokio::test]
async fn batch_boundaries_make_minimal_embedding_calls() {
    // batch_size = 2: two chunks need one embedding call, three need two.
    // The warmup probe accounts for one extra request per run.
    for (functions, expected_requests) in [(2u32, 2u64), (3u32, 3u64)] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(EchoEmbeddings)
            .expect(expected_requests)
            .mount(&server)
            .await;

        let workdir = tempfile::tempdir().unwrap();
        let repo_dir = workdir.path().join("core");
        std::fs::create_dir_all(&repo_dir).unwrap();
        let source: String = (0..functions)
            .map(|i| format!("pub fn item{}() {{}}\n", i))
            .collect();
        std::fs::write(repo_dir.join("lib.rs"), source).unwrap();

        let backend = Arc::new(InMemoryBackend::new());
        let pipeline = Pipeline::new(
            Arc::new(config(workdir.path(), &server.uri())),
            backend.clone(),
        )
        .unwrap();
        pipeline
            .ingest(&[repository("core", &repo_dir)], false)
            .await
            .unwrap();

        assert_eq!(backend.point_count("rust_code").await, functions as usize);
        server.verify().await;
    }
}

#[tokio::test]
async fn markdown_and_rust_route_to_their_collections() {
    let server = mock_embedding_server().await;
    let workdir = tempfile::tempdir().unwrap();
    let repo_dir = workdir.path().join("core");
    std::fs::create_dir_all(repo_dir.join("docs")).unwrap();
    std::fs::write(repo_dir.join("lib.rs"), "pub fn f() {}").unwrap();
    std::fs::write(
        repo_dir.join("docs/ARCH.md"),
        "# Title\n## Auth\ntext A\n## Deployment\ntext B\n",
    )
    .unwrap();

    let backend = Arc::new(InMemoryBackend::new());
    let pipeline = Pipeline::new(
        Arc::new(config(workdir.path(), &server.uri())),
        backend.clone(),
    )
    .unwrap();
    let stats = pipeline
        .ingest(&[repository("core", &repo_dir)], false)
        .await
        .unwrap();

    assert_eq!(backend.point_count("rust_code").await, 1);
    assert_eq!(backend.point_count("documentation").await, 2);
    assert_eq!(stats.chunks_by_collection["documentation"], 2);
    assert_eq!(stats.files_by_language["markdown"], 1);
}
