//! Static development server
//!
//! Axum-based server providing:
//! - the output directory as static files (directories resolve to
//!   `index.html`)
//! - the live-reload client script and its WebSocket endpoint
//! - client injection into HTML responses

use super::reload::{inject_client, LiveReload, CLIENT_PATH, CLIENT_SCRIPT, SOCKET_PATH};
use crate::config::ServeConfig;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::{broadcast, oneshot};
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Error starting the development server
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("cannot start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Shared handler state
#[derive(Clone)]
struct ServerState {
    root: Arc<PathBuf>,
    reload: Option<LiveReload>,
}

/// Development server configuration, consumed by [`DevServer::start`].
#[derive(Debug, Clone)]
pub struct DevServer {
    root: PathBuf,
    host: String,
    port: u16,
    reload: Option<LiveReload>,
}

impl DevServer {
    /// Serve `root` on the configured address. Live reload starts disabled.
    pub fn new(root: PathBuf, config: &ServeConfig) -> Self {
        Self { root, host: config.host.clone(), port: config.port, reload: None }
    }

    /// Inject the client and push messages from this hub.
    pub fn with_live_reload(mut self, reload: LiveReload) -> Self {
        self.reload = Some(reload);
        self
    }

    /// Build the Axum router
    fn router(&self) -> Router {
        let state = ServerState { root: Arc::new(self.root.clone()), reload: self.reload.clone() };
        Router::new()
            .route(SOCKET_PATH, get(socket_handler))
            .route(CLIENT_PATH, get(client_handler))
            .fallback(static_handler)
            .with_state(state)
    }

    /// Bind the listener and start serving on a runtime owned by the handle.
    pub fn start(self) -> Result<ServerHandle, ServeError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("assetline-serve")
            .build()
            .map_err(ServeError::Runtime)?;

        let addr = format!("{}:{}", self.host, self.port);
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind(addr.as_str()))
            .map_err(|source| ServeError::Bind { addr: addr.clone(), source })?;
        let local_addr =
            listener.local_addr().map_err(|source| ServeError::Bind { addr, source })?;

        let router = self.router();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        runtime.spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
                tracing::debug!("dev server shutting down");
            });
            if let Err(e) = server.await {
                tracing::error!(error = %e, "dev server stopped");
            }
        });

        tracing::info!(root = %self.root.display(), "serving on http://{}", local_addr);
        Ok(ServerHandle { runtime: Some(runtime), addr: local_addr, shutdown: Some(shutdown_tx) })
    }
}

/// A running server. Dropping the handle stops it.
pub struct ServerHandle {
    runtime: Option<Runtime>,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl ServerHandle {
    /// Address actually bound (useful with port 0).
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and shut the runtime down.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(std::time::Duration::from_secs(1));
        }
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Whether a request path tries to leave the served root.
fn escapes_root(path: &str) -> bool {
    let lowered = path.to_ascii_lowercase();
    if lowered.contains("%2e%2e") || lowered.contains("%2f") || lowered.contains("%5c") {
        return true;
    }
    Path::new(path.trim_start_matches('/'))
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
}

/// HTML file a request path resolves to, if any.
fn html_target(root: &Path, path: &str) -> Option<PathBuf> {
    let mut file = root.join(path.trim_start_matches('/'));
    if file.is_dir() {
        file = file.join("index.html");
    }
    let is_html = file.extension().is_some_and(|e| e == "html" || e == "htm");
    (is_html && file.is_file()).then_some(file)
}

async fn static_handler(State(state): State<ServerState>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    if escapes_root(&path) {
        tracing::warn!(path = %path, "rejected path outside the served root");
        return StatusCode::FORBIDDEN.into_response();
    }

    if state.reload.is_some() {
        if let Some(file) = html_target(&state.root, &path) {
            return match tokio::fs::read_to_string(&file).await {
                Ok(html) => Html(inject_client(&html)).into_response(),
                Err(e) => {
                    tracing::warn!(file = %file.display(), error = %e, "cannot read page");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                }
            };
        }
    }

    match ServeDir::new(state.root.as_path()).oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

async fn client_handler(State(state): State<ServerState>) -> Response {
    if state.reload.is_none() {
        return StatusCode::NOT_FOUND.into_response();
    }
    ([(header::CONTENT_TYPE, "text/javascript; charset=utf-8")], CLIENT_SCRIPT).into_response()
}

async fn socket_handler(ws: WebSocketUpgrade, State(state): State<ServerState>) -> Response {
    match state.reload {
        Some(reload) => {
            let rx = reload.subscribe();
            ws.on_upgrade(move |socket| forward(socket, rx))
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Forward broadcast messages to one browser until either side goes away.
async fn forward(mut socket: WebSocket, mut rx: broadcast::Receiver<String>) {
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Ok(text) => {
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "reload client lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}
