//! One HTTP server per acquired slot, serving a single embeddable
//! view. The page's X button posts to `/shutdown`; the server then
//! drains, reports itself closed, and the slot goes back to the pool.

use anyhow::{bail, Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, Instant};

use crate::logging::{self, obj, v_str, Domain};
use crate::netinfo;
use crate::render::{self, Table, ViewKind};
use crate::state::Config;

/// What a view serves: a one-off figure, or a live table model shared
/// with the controller.
pub enum PageContent {
    Figure { figure: Value, close_button: bool, mode_bar: bool },
    Table { model: Arc<Mutex<dyn Table>>, row_deletable: bool },
}

/// Emitted when a view server exits, however the shutdown started.
#[derive(Debug, Clone)]
pub struct ClosedView {
    pub slot: usize,
    pub kind: ViewKind,
    pub url: String,
    pub topic: String,
}

pub struct ViewHandle {
    pub slot: usize,
    pub kind: ViewKind,
    pub url: String,
    pub port: u16,
    pub topic: String,
    shutdown_tx: mpsc::Sender<()>,
}

impl ViewHandle {
    pub async fn shutdown(&self) {
        // The receiver is gone once the server has already exited;
        // that is not an error.
        let _ = self.shutdown_tx.send(()).await;
    }
}

struct ViewState {
    html: String,
    data: PageContent,
    shutdown_tx: mpsc::Sender<()>,
}

#[derive(Deserialize)]
struct AddRowReq {
    key: String,
}

#[derive(Deserialize)]
struct DeleteRowReq {
    index: usize,
}

/// Spawn a view server for `slot` on a freshly discovered port and
/// wait until it answers HTTP before handing back its handle.
pub async fn spawn(
    cfg: &Config,
    slot: usize,
    kind: ViewKind,
    title: &str,
    content: PageContent,
    announce_topic: &str,
    closed_tx: mpsc::Sender<ClosedView>,
) -> Result<ViewHandle> {
    let port = netinfo::free_port()?;
    let ip = netinfo::host_ip(cfg.host_ip.as_deref());
    let url = format!("http://{}:{}/", ip, port);

    let html = match &content {
        PageContent::Figure { figure, close_button, mode_bar } => {
            render::figure_page(title, figure, *close_button, *mode_bar)
        }
        PageContent::Table { row_deletable, .. } => render::table_page(title, *row_deletable),
    };

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    let state = Arc::new(ViewState { html, data: content, shutdown_tx: shutdown_tx.clone() });

    let router = Router::new()
        .route("/", get(index))
        .route("/data.json", get(data_json))
        .route("/rows", post(add_row))
        .route("/rows/delete", post(delete_row))
        .route("/shutdown", post(shutdown))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("bind view port {}", port))?;

    let closed = ClosedView {
        slot,
        kind,
        url: url.clone(),
        topic: announce_topic.to_string(),
    };
    tokio::spawn(async move {
        let server = axum::serve(listener, router).with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        });
        if let Err(err) = server.await {
            logging::error(
                Domain::Render,
                "view_server_failed",
                obj(&[("slot", json!(closed.slot)), ("err", v_str(&err.to_string()))]),
            );
        }
        logging::info(
            Domain::Render,
            "view_stopped",
            obj(&[("slot", json!(closed.slot)), ("url", v_str(&closed.url))]),
        );
        let _ = closed_tx.send(closed).await;
    });

    let handle = ViewHandle {
        slot,
        kind,
        url,
        port,
        topic: announce_topic.to_string(),
        shutdown_tx,
    };

    if let Err(err) = probe_ready(cfg, port).await {
        handle.shutdown().await;
        return Err(err);
    }

    logging::info(
        Domain::Render,
        "view_ready",
        obj(&[
            ("slot", json!(slot)),
            ("kind", v_str(kind.as_str())),
            ("url", v_str(&handle.url)),
        ]),
    );
    Ok(handle)
}

/// Poll the view over loopback until it serves its page. The URL is
/// only announced to the control surface once this succeeds.
async fn probe_ready(cfg: &Config, port: u16) -> Result<()> {
    let probe_url = format!("http://127.0.0.1:{}/", port);
    let client = reqwest::Client::new();
    let deadline = Instant::now() + Duration::from_secs(cfg.ready_timeout_secs);
    loop {
        match client.get(&probe_url).send().await {
            Ok(resp) if resp.status().is_success() => return Ok(()),
            _ if Instant::now() >= deadline => {
                bail!("view on port {} not ready after {}s", port, cfg.ready_timeout_secs)
            }
            _ => sleep(Duration::from_millis(cfg.ready_poll_ms)).await,
        }
    }
}

async fn index(State(state): State<Arc<ViewState>>) -> Html<String> {
    Html(state.html.clone())
}

async fn data_json(State(state): State<Arc<ViewState>>) -> Json<Value> {
    match &state.data {
        PageContent::Figure { figure, .. } => Json(figure.clone()),
        PageContent::Table { model, .. } => {
            let Ok(table) = model.lock() else {
                return Json(json!({"columns": [], "rows": [], "options": []}));
            };
            Json(json!({
                "columns": table.columns(),
                "rows": table.rows(),
                "options": table.options(),
            }))
        }
    }
}

async fn add_row(State(state): State<Arc<ViewState>>, Json(req): Json<AddRowReq>) -> StatusCode {
    match &state.data {
        PageContent::Table { model, .. } => {
            if let Ok(mut table) = model.lock() {
                table.add_row(&req.key);
            }
            StatusCode::OK
        }
        PageContent::Figure { .. } => StatusCode::NOT_FOUND,
    }
}

async fn delete_row(
    State(state): State<Arc<ViewState>>,
    Json(req): Json<DeleteRowReq>,
) -> StatusCode {
    match &state.data {
        PageContent::Table { model, .. } => {
            if let Ok(mut table) = model.lock() {
                table.delete_row(req.index);
            }
            StatusCode::OK
        }
        PageContent::Figure { .. } => StatusCode::NOT_FOUND,
    }
}

async fn shutdown(State(state): State<Arc<ViewState>>) -> &'static str {
    let _ = state.shutdown_tx.send(()).await;
    "view stopped"
}
