//! Test utilities and common setup.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, header};
use bytes::Bytes;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::io::AsyncWrite;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tower::ServiceExt;

use dockterm::api::{self, AppState};
use dockterm::auth::{CredentialRecord, IdentityGate, TokenAuthority};
use dockterm::container::{
    AttachedShell, ContainerError, ContainerRuntime, FlavorSpec, FlavorTable,
};
use dockterm::session::AdmissionController;

pub const TEST_USER: &str = "dev";
pub const TEST_PASSWORD: &str = "devpassword123";

/// Container runtime double that records every call and hands out
/// in-memory stream halves.
#[derive(Default)]
pub struct MockRuntime {
    next_id: AtomicUsize,
    pub fail_spawn: AtomicBool,
    /// Ordered record of lifecycle calls, e.g. `spawn:mock-0`.
    pub events: Mutex<Vec<String>>,
    /// Feeds for pushing bytes out of a mock container.
    pub output_feeds: Mutex<HashMap<String, mpsc::UnboundedSender<Bytes>>>,
    /// Everything written to a mock container's stdin.
    pub input_sinks: Mutex<HashMap<String, Arc<Mutex<Vec<u8>>>>>,
}

impl MockRuntime {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn input_bytes(&self, container_id: &str) -> Vec<u8> {
        self.input_sinks
            .lock()
            .unwrap()
            .get(container_id)
            .map(|buffer| buffer.lock().unwrap().clone())
            .unwrap_or_default()
    }

    pub fn feed_output(&self, container_id: &str, data: &[u8]) {
        let feeds = self.output_feeds.lock().unwrap();
        feeds
            .get(container_id)
            .expect("no output feed for container")
            .send(Bytes::copy_from_slice(data))
            .expect("mock output channel closed");
    }
}

struct CaptureWriter(Arc<Mutex<Vec<u8>>>);

impl AsyncWrite for CaptureWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn spawn(&self, _spec: &FlavorSpec) -> Result<AttachedShell, ContainerError> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(ContainerError::Provisioning("mock refused spawn".into()));
        }
        let id = format!("mock-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        let buffer = Arc::new(Mutex::new(Vec::new()));
        self.output_feeds.lock().unwrap().insert(id.clone(), tx);
        self.input_sinks
            .lock()
            .unwrap()
            .insert(id.clone(), buffer.clone());
        self.events.lock().unwrap().push(format!("spawn:{id}"));
        Ok(AttachedShell {
            container_id: id,
            output: UnboundedReceiverStream::new(rx).map(Ok::<_, ContainerError>).boxed(),
            input: Box::pin(CaptureWriter(buffer)),
        })
    }

    async fn teardown(&self, container_id: &str) {
        self.output_feeds.lock().unwrap().remove(container_id);
        self.events
            .lock()
            .unwrap()
            .push(format!("teardown:{container_id}"));
    }

    async fn inject_file(
        &self,
        container_id: &str,
        archive: &Path,
        destination: &str,
    ) -> Result<(), ContainerError> {
        assert!(archive.exists(), "archive must exist at injection time");
        self.events
            .lock()
            .unwrap()
            .push(format!("inject:{container_id}:{destination}"));
        Ok(())
    }

    async fn resize(&self, container_id: &str, cols: u16, rows: u16) {
        self.events
            .lock()
            .unwrap()
            .push(format!("resize:{container_id}:{cols}x{rows}"));
    }
}

/// A fully wired test application over the mock runtime.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub runtime: Arc<MockRuntime>,
    pub staging: TempDir,
}

pub fn test_app() -> TestApp {
    test_app_with(1, Duration::from_millis(200))
}

pub fn test_app_with(max_connections: usize, grace_period: Duration) -> TestApp {
    let gate = IdentityGate::new(CredentialRecord {
        username: TEST_USER.to_string(),
        password: bcrypt::hash(TEST_PASSWORD, 4).unwrap(),
    });
    let runtime = Arc::new(MockRuntime::default());
    let staging = tempfile::tempdir().unwrap();

    let state = AppState::new(
        gate,
        TokenAuthority::new(grace_period),
        AdmissionController::new(max_connections),
        runtime.clone(),
        FlavorTable::default(),
        staging.path().to_path_buf(),
    );
    let router = api::create_router(state.clone());

    TestApp {
        router,
        state,
        runtime,
        staging,
    }
}

/// Log in through the router and return the `Cookie` header value carrying
/// the session token and flavor.
pub async fn login_cookie(router: &Router) -> String {
    login_cookie_with_flavor(router, "shell").await
}

pub async fn login_cookie_with_flavor(router: &Router, flavor: &str) -> String {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/login")
                .method(Method::POST)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    serde_json::json!({
                        "username": TEST_USER,
                        "password": TEST_PASSWORD,
                        "flavor": flavor,
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(response.status().is_success(), "login failed in test setup");

    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Serve the router on an ephemeral local port for WebSocket tests.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// Poll until `predicate` holds or the timeout elapses.
pub async fn wait_until(timeout: Duration, mut predicate: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
