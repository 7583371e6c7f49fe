// -----------------------------------------------------------------------------
// detcast-stream
//
// HTTP front: `GET *.mjpg` streams the relay as multipart JPEG, any other
// `GET` serves a one-line page embedding the stream.
// -----------------------------------------------------------------------------

use axum::{
    body::Body,
    extract::State,
    http::{header, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    Router,
};
use bytes::{BufMut, Bytes, BytesMut};
use detcast_annotate::AnnotatedFrame;
use detcast_relay::{Relay, Subscription};
use std::convert::Infallible;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

pub const BOUNDARY: &str = "--jpgboundary";
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=--jpgboundary";
pub const INDEX_HTML: &str = "<html><head></head><body><img src='/cam.mjpg'/></body></html>";

/// How long open responses get to finish once shutdown fires.
pub const DEFAULT_DRAIN: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// One multipart section: boundary line, part headers, JPEG, trailing CRLF.
pub fn encode_part(jpeg: &[u8]) -> Bytes {
    let head = format!(
        "{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = BytesMut::with_capacity(head.len() + jpeg.len() + 2);
    part.put_slice(head.as_bytes());
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}

#[derive(Debug, Default)]
struct Clients {
    active: AtomicUsize,
    next_id: AtomicU64,
}

#[derive(Debug, Clone)]
struct AppState {
    relay: Arc<Relay<AnnotatedFrame>>,
    clients: Arc<Clients>,
}

/// Serves the relay's frames to any number of HTTP clients.
#[derive(Debug, Clone)]
pub struct StreamServer {
    state: AppState,
    drain: Duration,
}

impl StreamServer {
    pub fn new(relay: Arc<Relay<AnnotatedFrame>>) -> Self {
        Self {
            state: AppState { relay, clients: Arc::default() },
            drain: DEFAULT_DRAIN,
        }
    }

    pub fn with_drain(mut self, drain: Duration) -> Self {
        self.drain = drain;
        self
    }

    pub fn router(&self) -> Router {
        Router::new().fallback(dispatch).with_state(self.state.clone())
    }

    pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
        TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })
    }

    /// Run until `shutdown` resolves and every open response has ended, or
    /// until the drain window after `shutdown` runs out. Close the relay
    /// alongside `shutdown`, or live streams use up the whole window.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            log::info!("streaming on http://{addr}/cam.mjpg");
        }

        let (fired_tx, fired_rx) = oneshot::channel();
        let signal = async move {
            shutdown.await;
            let _ = fired_tx.send(());
        };
        let drain = self.drain;
        let deadline = async move {
            match fired_rx.await {
                Ok(()) => tokio::time::sleep(drain).await,
                // server ended before shutdown fired
                Err(_) => std::future::pending().await,
            }
        };

        let server = axum::serve(listener, self.router()).with_graceful_shutdown(signal);
        tokio::select! {
            served = server.into_future() => served?,
            () = deadline => log::warn!(
                "{} stream client(s) still open after {drain:?}, stopping anyway",
                self.active_clients()
            ),
        }
        log::info!("stream server stopped");
        Ok(())
    }

    /// Number of connected stream clients.
    pub fn active_clients(&self) -> usize {
        self.state.clients.active.load(Ordering::SeqCst)
    }
}

async fn dispatch(State(state): State<AppState>, method: Method, uri: Uri) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }
    if uri.path().ends_with(".mjpg") {
        stream(state)
    } else {
        Html(INDEX_HTML).into_response()
    }
}

fn stream(state: AppState) -> Response {
    let guard = ClientGuard::attach(state.clients.clone());
    let sub = state.relay.subscribe();

    let parts = futures_util::stream::unfold((sub, guard), next_part);
    (
        [
            (header::CONTENT_TYPE, STREAM_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(parts),
    )
        .into_response()
}

type PartState = (Subscription<AnnotatedFrame>, ClientGuard);

async fn next_part((mut sub, mut guard): PartState) -> Option<(std::result::Result<Bytes, Infallible>, PartState)> {
    let Some((frame, seq)) = sub.next().await else {
        guard.relay_closed = true;
        return None;
    };
    guard.delivered += 1;
    guard.last_seq = seq;
    Some((Ok(encode_part(frame.jpeg())), (sub, guard)))
}

// Lives inside the body stream; hyper drops it when the client goes away.
struct ClientGuard {
    clients: Arc<Clients>,
    id: u64,
    delivered: u64,
    last_seq: u64,
    relay_closed: bool,
}

impl ClientGuard {
    fn attach(clients: Arc<Clients>) -> Self {
        let id = clients.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let active = clients.active.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("stream client #{id} connected ({active} active)");
        Self { clients, id, delivered: 0, last_seq: 0, relay_closed: false }
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        let active = self.clients.active.fetch_sub(1, Ordering::SeqCst) - 1;
        let why = if self.relay_closed { "stream closed" } else { "disconnected" };
        log::debug!(
            "stream client #{} {why} after {} frame(s), last seq {} ({active} active)",
            self.id,
            self.delivered,
            self.last_seq
        );
    }
}
