//! In-process fake of the Loggly search API.
//!
//! Serves `GET /apiv2/search` and `GET /apiv2/events` on `127.0.0.1:0` so the
//! reqwest client can be tested end to end. Requests must carry the expected
//! bearer token; every accepted request is recorded.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::{Value, json};
use tokio::sync::oneshot;

/// Session identifier issued by the fake server.
pub const FAKE_RSID: &str = "fake-rsid-42";

/// A request received by [`FakeLogglyServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedRequest {
    /// Request path, e.g. `/apiv2/events`.
    pub path: String,
    /// Decoded query parameters.
    pub params: HashMap<String, String>,
    /// `User-Agent` header, if sent.
    pub user_agent: Option<String>,
}

#[derive(Debug)]
struct ServerState {
    token: String,
    pages: Vec<Vec<Value>>,
    search_status: Option<StatusCode>,
    events_status: Option<(u64, StatusCode)>,
    omit_rsid: bool,
    requests: Mutex<Vec<ReceivedRequest>>,
}

/// Options for [`FakeLogglyServer::start`].
#[derive(Debug, Clone, Default)]
pub struct FakeServerConfig {
    /// Bearer token the server accepts.
    pub token: String,
    /// Events served per page index.
    pub pages: Vec<Vec<Value>>,
    /// Status returned by the search endpoint instead of success.
    pub search_status: Option<u16>,
    /// Page index and status returned by the events endpoint instead of success.
    pub events_status: Option<(u64, u16)>,
    /// Answer search creation without an `rsid`.
    pub omit_rsid: bool,
}

/// Fake Loggly API server running on a background task.
pub struct FakeLogglyServer {
    base_url: String,
    state: Arc<ServerState>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    _task: tokio::task::JoinHandle<()>,
}

impl std::fmt::Debug for FakeLogglyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeLogglyServer")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FakeLogglyServer {
    /// Starts the server on an ephemeral local port.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn start(config: FakeServerConfig) -> std::io::Result<Self> {
        let to_status = |code: u16| StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let state = Arc::new(ServerState {
            token: config.token,
            pages: config.pages,
            search_status: config.search_status.map(to_status),
            events_status: config.events_status.map(|(page, code)| (page, to_status(code))),
            omit_rsid: config.omit_rsid,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/apiv2/search", get(search))
            .route("/apiv2/events", get(events))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr: SocketAddr = listener.local_addr()?;
        let base_url = format!("http://{addr}/apiv2");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });

        Ok(Self {
            base_url,
            state,
            shutdown_tx: Some(shutdown_tx),
            _task: task,
        })
    }

    /// Returns the API root (e.g., `http://127.0.0.1:12345/apiv2`).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns accepted requests in arrival order.
    pub fn requests(&self) -> Vec<ReceivedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl Drop for FakeLogglyServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

#[allow(clippy::result_large_err)]
fn authorize(
    state: &ServerState,
    path: &str,
    headers: &HeaderMap,
    params: HashMap<String, String>,
) -> Result<(), Response> {
    let expected = format!("Bearer {}", state.token);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == expected);
    if !authorized {
        return Err((StatusCode::UNAUTHORIZED, "invalid token").into_response());
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state
        .requests
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .push(ReceivedRequest {
            path: path.to_string(),
            params,
            user_agent,
        });
    Ok(())
}

async fn search(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if let Err(resp) = authorize(&state, "/apiv2/search", &headers, params) {
        return resp;
    }
    if let Some(status) = state.search_status {
        return (status, "search rejected").into_response();
    }
    if state.omit_rsid {
        return axum::Json(json!({ "status": "ok" })).into_response();
    }

    axum::Json(json!({
        "rsid": {
            "id": FAKE_RSID,
            "status": "SCHEDULED",
            "date_from": 1_700_000_000_000_u64,
            "date_to": 1_700_086_400_000_u64,
        }
    }))
    .into_response()
}

async fn events(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let rsid = params.get("rsid").cloned();
    let page = params.get("page").and_then(|p| p.parse::<u64>().ok());
    if let Err(resp) = authorize(&state, "/apiv2/events", &headers, params) {
        return resp;
    }

    if rsid.as_deref() != Some(FAKE_RSID) {
        return (StatusCode::NOT_FOUND, "unknown rsid").into_response();
    }
    let Some(page) = page else {
        return (StatusCode::BAD_REQUEST, "page is required").into_response();
    };
    if let Some((failing, status)) = state.events_status {
        if failing == page {
            return (status, "events rejected").into_response();
        }
    }

    let total: usize = state.pages.iter().map(Vec::len).sum();
    let events = usize::try_from(page)
        .ok()
        .and_then(|i| state.pages.get(i))
        .cloned()
        .unwrap_or_default();

    axum::Json(json!({
        "total_events": total,
        "page": page,
        "events": events,
    }))
    .into_response()
}
