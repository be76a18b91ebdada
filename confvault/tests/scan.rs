mod common;

use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{FakeRouter, cisco_device, dead_addr, init_logging};
use confvault::{
    Credentials, Device, FetchOptions, ModelRegistry, ScanOptions, VersionPrefix, scan_devices,
    update_last_success,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

fn options(repo: &std::path::Path, max_concurrency: usize, holdtime: Duration) -> ScanOptions {
    let mut fetch = FetchOptions::new(repo);
    fetch.connect.connect_timeout = Duration::from_secs(2);
    ScanOptions {
        max_concurrency,
        delay_min: Duration::ZERO,
        delay_max: Duration::ZERO,
        holdtime,
        fetch,
    }
}

#[tokio::test]
async fn test_recent_success_is_skipped() {
    init_logging();
    let addr = FakeRouter::new("r1").spawn().await;
    let repo = tempfile::tempdir().unwrap();

    // r2 was backed up a moment ago by a previous run.
    let r2 = VersionPrefix::for_device(repo.path(), "r2");
    r2.ensure_dir().unwrap();
    fs::write(r2.version_path(0), "hostname r2\n").unwrap();

    let mut devices = vec![cisco_device("r1", addr), cisco_device("r2", addr)];
    update_last_success(&mut devices, repo.path());
    assert!(devices[0].status().last_success.is_none());
    assert!(devices[1].status().last_success.is_some());

    let summary = scan_devices(&mut devices, &options(repo.path(), 1, Duration::from_secs(3600))).await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.failure, 0);

    // Fetched device recorded, skipped device untouched.
    let r1 = devices[0].status();
    assert!(r1.last_ok);
    assert_eq!(r1.last_try, r1.last_success);
    assert!(devices[1].status().last_try.is_none());
    assert!(
        VersionPrefix::for_device(repo.path(), "r1")
            .version_path(0)
            .is_file()
    );
    assert!(!r2.version_path(1).exists());
}

#[tokio::test]
async fn test_mixed_results() {
    init_logging();
    let good = FakeRouter::new("r1").spawn().await;
    let dead = dead_addr().await;
    let repo = tempfile::tempdir().unwrap();

    let mut devices = vec![
        cisco_device("r1", good),
        cisco_device("r2", dead),
        cisco_device("r3", good),
    ];
    let summary = scan_devices(&mut devices, &options(repo.path(), 0, Duration::ZERO)).await;

    assert_eq!(summary.success, 2);
    assert_eq!(summary.failure, 1);
    assert_eq!(summary.skipped, 0);
    assert!(summary.elapsed_min.unwrap() <= summary.elapsed_max.unwrap());

    assert!(devices[0].status().last_ok);
    let r2 = devices[1].status();
    assert!(!r2.last_ok);
    assert!(r2.last_try.is_some());
    assert!(r2.last_success.is_none());
}

#[tokio::test]
async fn test_holdtime_expires_between_scans() {
    init_logging();
    let addr = FakeRouter::new("r1").spawn().await;
    let repo = tempfile::tempdir().unwrap();
    let mut devices = vec![cisco_device("r1", addr)];

    let held = options(repo.path(), 2, Duration::from_secs(3600));
    let first = scan_devices(&mut devices, &held).await;
    assert_eq!(first.success, 1);

    let second = scan_devices(&mut devices, &held).await;
    assert_eq!(second.skipped, 1);
    assert_eq!(second.completed(), 0);

    let unheld = options(repo.path(), 2, Duration::ZERO);
    let third = scan_devices(&mut devices, &unheld).await;
    assert_eq!(third.success, 1);
}

/// HTTP server that answers slowly and remembers the most connections it
/// ever had open at once.
async fn spawn_slow_http(peak: Arc<AtomicUsize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let open = Arc::new(AtomicUsize::new(0));
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let now = open.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let open = Arc::clone(&open);
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 256];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                tokio::time::sleep(Duration::from_millis(150)).await;
                let _ = stream.write_all(b"HTTP/1.0 200 OK\r\n\r\nok").await;
                // Count the connection closed before the client can see EOF.
                open.fetch_sub(1, Ordering::SeqCst);
                drop(stream);
            });
        }
    });
    addr
}

fn http_device(id: &str, addr: SocketAddr) -> Device {
    ModelRegistry::with_builtin_models()
        .create_device("http", id, addr.to_string(), "tcp", Credentials::default())
        .unwrap()
}

#[tokio::test]
async fn test_concurrency_ceiling_is_respected() {
    init_logging();
    let peak = Arc::new(AtomicUsize::new(0));
    let addr = spawn_slow_http(Arc::clone(&peak)).await;
    let repo = tempfile::tempdir().unwrap();

    let mut devices: Vec<Device> = (0..8).map(|i| http_device(&format!("web{i}"), addr)).collect();
    let summary = scan_devices(&mut devices, &options(repo.path(), 3, Duration::ZERO)).await;

    assert_eq!(summary.success, 8);
    assert_eq!(summary.failure, 0);
    let peak = peak.load(Ordering::SeqCst);
    assert!(peak <= 3, "{peak} fetches ran at once");
    assert!(peak >= 2, "fetches never overlapped");
    assert!(devices.iter().all(|d| d.status().last_ok));
}
