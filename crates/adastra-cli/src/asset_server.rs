//! Asset dev server.
//!
//! Serves project files to the theme preview together with the `/@vite/client`
//! and `/@react-refresh` runtime modules the dev snippet imports. The socket is
//! bound once; `restart()` swaps the router task on the same socket so the
//! theme keeps pointing at the same asset host across session refreshes.

use adastra_core::dev::{AssetServer, LiveReload};
use adastra_core::{Error, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path as AxumPath, Request, State,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, info_span, warn, Instrument};

/// Default asset dev server port.
pub const DEFAULT_ASSET_PORT: u16 = 5173;

/// How long in-flight requests get before a restart aborts them.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const CLIENT_WS_PATH: &str = "/@vite/ws";

/// Connects to the server and reloads the page when the server comes back
/// after a restart.
const LIVE_CLIENT: &str = r"// adastra dev client
const socketUrl = new URL('__WS_PATH__', import.meta.url);
socketUrl.protocol = socketUrl.protocol === 'https:' ? 'wss:' : 'ws:';

let connectedOnce = false;

function connect() {
  const ws = new WebSocket(socketUrl);
  ws.onmessage = (event) => {
    const msg = JSON.parse(event.data);
    if (msg.type === 'connected') {
      if (connectedOnce) location.reload();
      connectedOnce = true;
      console.debug('[adastra] connected.');
    } else if (msg.type === 'full-reload') {
      location.reload();
    }
  };
  ws.onclose = () => setTimeout(connect, 1000);
}

connect();

export function createHotContext() {
  return { accept() {}, dispose() {}, prune() {}, invalidate() { location.reload(); }, on() {}, send() {}, data: {} };
}
";

const INERT_CLIENT: &str = r"// adastra dev client (live reload off)
export function createHotContext() {
  return { accept() {}, dispose() {}, prune() {}, invalidate() {}, on() {}, send() {}, data: {} };
}
";

const REACT_REFRESH_RUNTIME: &str = r"// adastra react refresh runtime
const RefreshRuntime = {
  injectIntoGlobalHook(globalObject) {
    globalObject.__REACT_DEVTOOLS_GLOBAL_HOOK__ ??= { renderers: new Map(), supportsFiber: true, inject() {}, onCommitFiberRoot() {}, onCommitFiberUnmount() {} };
  },
  register() {},
  createSignatureFunctionForTransform() { return (type) => type; },
  performReactRefresh() {},
};
export default RefreshRuntime;
";

/// Server-to-client messages on the client socket.
#[derive(Debug, Clone, Copy)]
enum ClientMessage {
    Connected,
    FullReload,
}

impl ClientMessage {
    fn to_json(self) -> &'static str {
        match self {
            Self::Connected => r#"{"type":"connected"}"#,
            Self::FullReload => r#"{"type":"full-reload"}"#,
        }
    }
}

struct ServeState {
    root: PathBuf,
    live_reload: LiveReload,
    store: String,
    clients: broadcast::Sender<ClientMessage>,
}

struct Running {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

/// Restartable axum server bound to `host:port`.
pub struct AssetDevServer {
    addr: SocketAddr,
    state: Arc<ServeState>,
    listener: Option<std::net::TcpListener>,
    running: Option<Running>,
}

impl AssetDevServer {
    #[must_use]
    pub fn new(addr: SocketAddr, root: PathBuf, live_reload: LiveReload, store: String) -> Self {
        let (clients, _) = broadcast::channel(16);
        Self {
            addr,
            state: Arc::new(ServeState {
                root,
                live_reload,
                store,
                clients,
            }),
            listener: None,
            running: None,
        }
    }

    fn router(&self) -> Router {
        let state = Arc::clone(&self.state);
        Router::new()
            .route("/@vite/client", get(serve_client))
            .route(CLIENT_WS_PATH, get(client_websocket))
            .route("/@react-refresh", get(serve_react_refresh))
            .route("/*path", get(serve_file))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), log_request))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    fn start(&mut self) -> std::io::Result<()> {
        let Some(bound) = &self.listener else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "asset server is not bound",
            ));
        };
        let listener = tokio::net::TcpListener::from_std(bound.try_clone()?)?;
        let (shutdown, signal) = oneshot::channel::<()>();
        let serve = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            let _ = signal.await;
        });

        let span = info_span!("asset_server", store = %self.state.store);
        let task = tokio::spawn(async move { serve.await }.instrument(span));
        self.running = Some(Running { shutdown, task });
        Ok(())
    }

    async fn stop(&mut self) {
        let Some(Running { shutdown, mut task }) = self.running.take() else {
            return;
        };
        let _ = shutdown.send(());

        match tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "asset server exited with an error"),
            Ok(Err(e)) => warn!(error = %e, "asset server task failed"),
            Err(_) => {
                warn!("asset server did not stop in time, aborting open connections");
                task.abort();
            }
        }
    }
}

#[async_trait]
impl AssetServer for AssetDevServer {
    async fn listen(&mut self) -> Result<SocketAddr> {
        let addr = self.addr;
        let listen_err = |source| Error::Listen { addr, source };

        let listener = std::net::TcpListener::bind(addr).map_err(listen_err)?;
        listener.set_nonblocking(true).map_err(listen_err)?;
        let local = listener.local_addr().map_err(listen_err)?;
        self.listener = Some(listener);

        self.start().map_err(listen_err)?;
        Ok(local)
    }

    async fn restart(&mut self) -> Result<()> {
        let _ = self.state.clients.send(ClientMessage::FullReload);
        self.stop().await;
        self.start().map_err(Error::ListenerRestart)?;
        info!("asset server restarted");
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.stop().await;
        self.listener = None;
        Ok(())
    }
}

async fn log_request(State(state): State<Arc<ServeState>>, req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let span = info_span!("asset_request", store = %state.store, %method, %uri);

    let response = next.run(req).instrument(span.clone()).await;
    span.in_scope(|| debug!(status = response.status().as_u16(), "served"));
    response
}

fn javascript(body: &'static str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

async fn serve_client(State(state): State<Arc<ServeState>>) -> Response {
    match state.live_reload {
        LiveReload::Off => javascript(INERT_CLIENT),
        LiveReload::HotReload | LiveReload::FullPage => (
            [
                (header::CONTENT_TYPE, "application/javascript"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            LIVE_CLIENT.replace("__WS_PATH__", CLIENT_WS_PATH),
        )
            .into_response(),
    }
}

async fn serve_react_refresh() -> Response {
    javascript(REACT_REFRESH_RUNTIME)
}

async fn client_websocket(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServeState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_client_socket(socket, state))
}

async fn handle_client_socket(mut socket: WebSocket, state: Arc<ServeState>) {
    let mut rx = state.clients.subscribe();
    if socket
        .send(Message::Text(ClientMessage::Connected.to_json().to_string()))
        .await
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            Ok(msg) = rx.recv() => {
                if socket.send(Message::Text(msg.to_json().to_string())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

async fn serve_file(
    State(state): State<Arc<ServeState>>,
    AxumPath(path): AxumPath<String>,
) -> Response {
    let Some(file_path) = project_file(&state.root, &path) else {
        return (StatusCode::NOT_FOUND, format!("Not found: {path}")).into_response();
    };

    match tokio::fs::read(&file_path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type(&file_path)),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, format!("Not found: {path}")).into_response(),
    }
}

/// Map a request path to a file under `root`. Paths escaping the root are
/// rejected.
fn project_file(root: &Path, request_path: &str) -> Option<PathBuf> {
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return None;
    }
    let file_path = root.join(relative);
    file_path.is_file().then_some(file_path)
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => "application/javascript",
        "css" => "text/css",
        "json" | "map" => "application/json",
        "html" => "text/html",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "wasm" => "application/wasm",
        _ => "application/octet-stream",
    }
}
