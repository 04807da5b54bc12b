//! Test support for the traffic crates.
//!
//! - `StubServer`: an HTTP/1.1 server on an ephemeral port that answers each
//!   path with a canned JSON body and records what it received.
//! - `RecordingRenderer`: a `RenderBackend` that keeps the last frame.

use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{bail, Context};
use bytes::{BufMut, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tracing::debug;
use traffic_shared::{
    entity::EntityId,
    render::{RenderBackend, SignalFrame, StaticFrame, VehicleFrame},
};

/// Canned reply for one path.
#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub body: String,
    /// Wait this long before answering.
    pub delay: Option<Duration>,
}

impl StubResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: value.to_string(),
            delay: None,
        }
    }

    pub fn raw(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// One request as seen by the stub.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    /// Path without the leading slash, e.g. `getAgents`.
    pub path: String,
    pub body: String,
}

impl RecordedRequest {
    pub fn json(&self) -> anyhow::Result<serde_json::Value> {
        serde_json::from_str(&self.body).context("request body is not JSON")
    }
}

#[derive(Default)]
struct StubState {
    routes: HashMap<String, StubResponse>,
    requests: Vec<RecordedRequest>,
}

/// Stand-in for the simulation server.
pub struct StubServer {
    addr: SocketAddr,
    state: Arc<Mutex<StubState>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    /// Binds to an ephemeral loopback port and starts serving.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0))
            .await
            .context("tcp bind")?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(StubState::default()));

        let shared = state.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let shared = shared.clone();
                tokio::spawn(async move {
                    if let Err(e) = serve(stream, shared).await {
                        debug!(error = %e, "Stub connection failed");
                    }
                });
            }
        });

        Ok(Self { addr, state, handle })
    }

    /// Base URL with a trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Sets (or replaces) the reply for `path`; a leading slash is optional.
    pub fn route(&self, path: &str, response: StubResponse) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.routes.insert(path.trim_start_matches('/').to_string(), response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).requests.clone()
    }

    /// Requests received for one path.
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        let path = path.trim_start_matches('/');
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(mut stream: TcpStream, state: Arc<Mutex<StubState>>) -> anyhow::Result<()> {
    let mut buf = BytesMut::with_capacity(4096);
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = stream.read_buf(&mut buf).await.context("tcp read")?;
        if n == 0 {
            bail!("connection closed before headers");
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or("/");
    let path = target.split('?').next().unwrap_or_default().trim_start_matches('/').to_string();

    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = header_end + 4;
    while buf.len() < body_start + content_length {
        let n = stream.read_buf(&mut buf).await.context("tcp read body")?;
        if n == 0 {
            bail!("connection closed before body");
        }
    }
    let body = String::from_utf8_lossy(&buf[body_start..body_start + content_length]).into_owned();

    let response = {
        let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
        state.requests.push(RecordedRequest {
            method,
            path: path.clone(),
            body,
        });
        state
            .routes
            .get(&path)
            .cloned()
            .unwrap_or_else(|| StubResponse::raw(404, r#"{"message":"not found"}"#))
    };

    if let Some(delay) = response.delay {
        tokio::time::sleep(delay).await;
    }

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        response.status,
        if response.status < 400 { "OK" } else { "Error" },
        response.body.len()
    );
    let mut out = BytesMut::with_capacity(head.len() + response.body.len());
    out.put_slice(head.as_bytes());
    out.put_slice(response.body.as_bytes());
    stream.write_all(&out).await.context("tcp write")?;
    stream.shutdown().await.context("tcp shutdown")?;
    Ok(())
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

/// What a [`RecordingRenderer`] saw.
#[derive(Debug, Default)]
pub struct Recording {
    pub frames: usize,
    pub fraction: f32,
    pub released: Vec<EntityId>,
    pub statics: Vec<StaticFrame>,
    pub signals: Vec<SignalFrame>,
    pub vehicles: Vec<VehicleFrame>,
}

impl Recording {
    pub fn vehicle(&self, id: EntityId) -> Option<&VehicleFrame> {
        self.vehicles.iter().find(|v| v.id == id)
    }
}

/// Keeps the draw calls of the last frame plus every release.
#[derive(Clone, Default)]
pub struct RecordingRenderer(pub Arc<Mutex<Recording>>);

impl RecordingRenderer {
    pub fn recording(&self) -> std::sync::MutexGuard<'_, Recording> {
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RenderBackend for RecordingRenderer {
    fn begin_frame(&mut self, fraction: f32) {
        let mut rec = self.recording();
        rec.fraction = fraction;
        rec.statics.clear();
        rec.signals.clear();
        rec.vehicles.clear();
    }

    fn draw_static(&mut self, item: &StaticFrame) {
        self.recording().statics.push(item.clone());
    }

    fn draw_signal(&mut self, item: &SignalFrame) {
        self.recording().signals.push(item.clone());
    }

    fn draw_vehicle(&mut self, item: &VehicleFrame) {
        self.recording().vehicles.push(item.clone());
    }

    fn release_vehicle(&mut self, id: EntityId) {
        self.recording().released.push(id);
    }

    fn end_frame(&mut self) {
        self.recording().frames += 1;
    }
}

/// Installs a test log writer once per process.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}
