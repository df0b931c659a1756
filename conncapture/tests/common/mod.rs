//! Shared harness for the integration tests.
#![allow(dead_code)]

pub mod health;
pub mod selfsigned;
pub mod tls;

use std::path::PathBuf;
use std::time::Duration;

use conncapture::grpc::{incoming, Listener};
use conncapture::{CaptureCredentials, HandshakeConfig};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tonic::transport::Server;
use tonic_health::pb::health_server::HealthServer;
use tracing_subscriber::EnvFilter;

use health::TestHealthServer;

/// Install a test subscriber once; `RUST_LOG` controls verbosity.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Whether `fd` refers to an open descriptor.
pub fn fd_is_open(fd: std::os::fd::RawFd) -> bool {
    unsafe { libc::fcntl(fd, libc::F_GETFD) != -1 }
}

/// Health server on a unix socket in a temp dir, served through
/// `CaptureCredentials`. Stops when dropped.
pub struct TestServer {
    pub health: TestHealthServer,
    path: PathBuf,
    handle: JoinHandle<()>,
    _dir: TempDir,
}

impl TestServer {
    pub async fn start(creds: CaptureCredentials) -> Self {
        init_tracing();

        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("health.sock");
        let listener = Listener::bind_unix(&path).expect("Failed to bind unix socket");

        let health = TestHealthServer::default();
        let service = HealthServer::new(health.clone());
        let config = HandshakeConfig::default().with_timeout(Duration::from_secs(5));
        let conns = incoming(listener, creds, config);

        let handle = tokio::spawn(async move {
            if let Err(e) = Server::builder()
                .add_service(service)
                .serve_with_incoming(conns)
                .await
            {
                tracing::error!(error = %e, "Test server failed");
            }
        });

        Self {
            health,
            path,
            handle,
            _dir: dir,
        }
    }

    /// Dial target for `conncapture::grpc::connect`.
    pub fn target(&self) -> String {
        format!("unix://{}", self.path.display())
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
