use filebench::config::Settings;
use filebench::harness::ThroughputHarness;
use filebench::server::{HttpServer, StreamServer};
use filebench::transport::{FileTransport, HttpTransport, StreamingTransport};
use filebench::FilebenchError;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const CHUNK_SIZE: usize = 64 * 1024;

fn test_settings(upload_dir: &Path) -> Settings {
    let mut settings = Settings::default();
    settings.network.stream_port = 0;
    settings.network.http_port = 0;
    settings.network.timeout_seconds = 30;
    settings.network.tls = false;
    settings.transfer.chunk_size = CHUNK_SIZE;
    settings.transfer.server_chunk_size = 256 * 1024;
    settings.storage.upload_dir = upload_dir.to_path_buf();
    settings
}

async fn start_stream_server(settings: Arc<Settings>) -> SocketAddr {
    let server = StreamServer::bind(settings).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

async fn start_http_server(settings: Arc<Settings>) -> SocketAddr {
    let server = HttpServer::bind(settings).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(server.run());
    addr
}

fn write_patterned_file(dir: &Path, name: &str, len: usize) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

fn stream_transport(addr: SocketAddr, settings: Arc<Settings>) -> StreamingTransport {
    StreamingTransport::new(format!("127.0.0.1:{}", addr.port()), settings)
}

fn http_transport(addr: SocketAddr, settings: Arc<Settings>) -> HttpTransport {
    HttpTransport::new(&format!("http://127.0.0.1:{}", addr.port()), settings).unwrap()
}

#[tokio::test]
async fn stream_roundtrip_across_size_boundaries() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    let settings = Arc::new(test_settings(&uploads));
    let addr = start_stream_server(settings.clone()).await;
    let transport = stream_transport(addr, settings);

    // Zero bytes, one byte, an exact chunk boundary, several chunks, and a
    // size that leaves a remainder.
    for (index, size) in [0, 1, CHUNK_SIZE, CHUNK_SIZE * 3, CHUNK_SIZE * 2 + 123]
        .into_iter()
        .enumerate()
    {
        let name = format!("case-{}.bin", index);
        let source = write_patterned_file(dir.path(), &name, size);
        let output = dir.path().join(format!("out-{}.bin", index));

        let upload = transport.upload(&source).await.unwrap();
        assert_eq!(upload.bytes, size as u64);

        let stored = std::fs::read(uploads.join(&name)).unwrap();
        assert_eq!(stored.len(), size, "server stored wrong byte count");

        let download = transport.download(&name, &output).await.unwrap();
        assert_eq!(download.bytes, size as u64);
        assert_eq!(
            std::fs::read(&source).unwrap(),
            std::fs::read(&output).unwrap(),
            "round-trip content mismatch at {} bytes",
            size
        );
    }
}

#[tokio::test]
async fn stream_upload_splits_five_megabytes_into_five_chunks() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();

    let mut settings = test_settings(&uploads);
    settings.transfer.chunk_size = 1024 * 1024;
    let settings = Arc::new(settings);

    let addr = start_stream_server(settings.clone()).await;
    let transport = stream_transport(addr, settings);

    let source = write_patterned_file(dir.path(), "five.bin", 5 * 1024 * 1024);
    let stats = transport.upload(&source).await.unwrap();

    assert_eq!(stats.chunks, 5);
    assert_eq!(stats.bytes, 5 * 1024 * 1024);
    assert_eq!(
        std::fs::metadata(uploads.join("five.bin")).unwrap().len(),
        5 * 1024 * 1024
    );
}

#[tokio::test]
async fn stream_download_of_unknown_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    let settings = Arc::new(test_settings(&uploads));
    let addr = start_stream_server(settings.clone()).await;
    let transport = stream_transport(addr, settings);

    let output = dir.path().join("missing-out.bin");
    let result = transport.download("never-uploaded.bin", &output).await;

    match result {
        Err(FilebenchError::NotFound(name)) => assert_eq!(name, "never-uploaded.bin"),
        other => panic!("expected NotFound, got {:?}", other),
    }
    // No content may have been written for a missing file.
    if output.exists() {
        assert_eq!(std::fs::metadata(&output).unwrap().len(), 0);
    }
}

#[tokio::test]
async fn stream_roundtrip_over_tls() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();

    let mut settings = test_settings(&uploads);
    settings.network.tls = true;
    let settings = Arc::new(settings);

    let addr = start_stream_server(settings.clone()).await;
    let transport = stream_transport(addr, settings);

    let source = write_patterned_file(dir.path(), "tls.bin", CHUNK_SIZE + 17);
    let output = dir.path().join("tls-out.bin");

    transport.upload(&source).await.unwrap();
    transport.download("tls.bin", &output).await.unwrap();

    assert_eq!(
        std::fs::read(&source).unwrap(),
        std::fs::read(&output).unwrap()
    );
}

#[tokio::test]
async fn http_roundtrip_across_size_boundaries() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    let settings = Arc::new(test_settings(&uploads));
    let addr = start_http_server(settings.clone()).await;
    let transport = http_transport(addr, settings);

    for (index, size) in [0, 1, CHUNK_SIZE, CHUNK_SIZE * 2 + 123].into_iter().enumerate() {
        let name = format!("http-{}.bin", index);
        let source = write_patterned_file(dir.path(), &name, size);
        let output = dir.path().join(format!("http-out-{}.bin", index));

        let upload = transport.upload(&source).await.unwrap();
        assert_eq!(upload.bytes, size as u64);

        let download = transport.download(&name, &output).await.unwrap();
        assert_eq!(download.bytes, size as u64);
        assert_eq!(
            std::fs::read(&source).unwrap(),
            std::fs::read(&output).unwrap()
        );
    }
}

#[tokio::test]
async fn http_download_of_unknown_file_is_not_found() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    let settings = Arc::new(test_settings(&uploads));
    let addr = start_http_server(settings.clone()).await;
    let transport = http_transport(addr, settings);

    let output = dir.path().join("http-missing.bin");
    let result = transport.download("never-uploaded.bin", &output).await;

    assert!(matches!(result, Err(FilebenchError::NotFound(_))));
    assert!(!output.exists(), "failed download must not create output");
}

#[tokio::test]
async fn http_upload_failure_carries_the_response_body() {
    use axum::http::StatusCode;
    use axum::routing::put;
    use axum::Router;

    // A server that always refuses with a diagnostic body.
    let router = Router::new().route(
        "/upload/{filename}",
        put(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "disk full") }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let dir = TempDir::new().unwrap();
    let settings = Arc::new(test_settings(dir.path()));
    let transport = http_transport(addr, settings);

    let source = write_patterned_file(dir.path(), "refused.bin", 512);
    let result = transport.upload(&source).await;

    match result {
        Err(FilebenchError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("disk full"));
        }
        other => panic!("expected Status error, got {:?}", other),
    }
}

#[tokio::test]
async fn harness_survives_an_unreachable_server() {
    let dir = TempDir::new().unwrap();
    let mut settings = test_settings(dir.path());
    settings.network.timeout_seconds = 5;
    let settings = Arc::new(settings);

    let source = write_patterned_file(dir.path(), "unreachable.bin", 1024);
    let harness = ThroughputHarness::new(source, dir.path().to_path_buf()).unwrap();

    // Port 9 on loopback has no listener.
    let stream = StreamingTransport::new("127.0.0.1:9", settings.clone());
    let http = HttpTransport::new("http://127.0.0.1:9", settings).unwrap();

    let stream_outcome = harness.run_transport(&stream).await;
    let http_outcome = harness.run_transport(&http).await;

    for outcome in [stream_outcome, http_outcome] {
        assert!(!outcome.upload.success);
        assert!(!outcome.download.success);
        assert!(outcome.upload.error.is_some());
        assert!(outcome.download.error.is_some());
    }
}

#[tokio::test]
async fn harness_measures_a_full_run_over_both_transports() {
    let dir = TempDir::new().unwrap();
    let uploads = dir.path().join("uploads");
    std::fs::create_dir_all(&uploads).unwrap();
    let settings = Arc::new(test_settings(&uploads));

    let stream_addr = start_stream_server(settings.clone()).await;
    let http_addr = start_http_server(settings.clone()).await;

    let source = write_patterned_file(dir.path(), "measured.bin", CHUNK_SIZE * 2 + 7);
    let harness = ThroughputHarness::new(source, dir.path().to_path_buf()).unwrap();

    let stream_outcome = harness
        .run_transport(&stream_transport(stream_addr, settings.clone()))
        .await;
    let http_outcome = harness
        .run_transport(&http_transport(http_addr, settings))
        .await;

    for outcome in [&stream_outcome, &http_outcome] {
        assert!(outcome.upload.success, "{} upload failed", outcome.transport);
        assert!(
            outcome.download.success,
            "{} download failed",
            outcome.transport
        );
        assert!(outcome.upload.speed_mbps >= 0.0);
        assert!(outcome.download.speed_mbps >= 0.0);
    }

    assert!(dir.path().join("downloaded-stream.bin").exists());
    assert!(dir.path().join("downloaded-http.bin").exists());
}
