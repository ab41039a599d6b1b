//! Status page: an HTML overview at `/` and a JSON summary at `/api/status`.

use anyhow::{Context, Result};
use axum::{extract::State, http::StatusCode, response::Html, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::StatusConfig;
use crate::store::channels::ChannelStore;
use crate::store::filters::FilterStore;

// ── Shared state ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct StatusState {
    pub channels: Arc<ChannelStore>,
    pub filters: Arc<FilterStore>,
    pub source_timezone: String,
    pub target_timezone: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusResponse {
    status: &'static str,
    channels_count: usize,
    filters_count: usize,
}

// ── Rendering ──────────────────────────────────────────────────────────────────

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Store listings are written for chat; drop the code-span backticks.
fn plain(listing: &str) -> String {
    escape_html(&listing.replace('`', ""))
}

fn render_page(channels: &str, filters: &str, source_tz: &str, target_tz: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Telegram Bot Status</title>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <style>
        body {{ padding: 20px; font-family: sans-serif; }}
        .card {{ margin-bottom: 20px; border: 1px solid #444; border-radius: 8px; }}
        .card-header {{ font-weight: bold; padding: 8px 12px; border-bottom: 1px solid #444; }}
        .card-body {{ padding: 8px 12px; }}
        pre {{ white-space: pre-wrap; word-break: break-word; }}
    </style>
</head>
<body>
    <h1>Telegram Bot Status</h1>
    <div class="card">
        <div class="card-header">Bot Status</div>
        <div class="card-body">
            <p>✅ Bot is running and monitoring channels</p>
            <p><strong>Monitored Channels:</strong></p>
            <pre>{channels}</pre>
        </div>
    </div>
    <div class="card">
        <div class="card-header">Active Filters</div>
        <div class="card-body">
            <pre>{filters}</pre>
        </div>
    </div>
    <div class="card">
        <div class="card-header">Configuration</div>
        <div class="card-body">
            <p><strong>Source Timezone:</strong> {source_tz}</p>
            <p><strong>Target Timezone:</strong> {target_tz}</p>
        </div>
    </div>
</body>
</html>
"#,
        channels = plain(channels),
        filters = plain(filters),
        source_tz = escape_html(source_tz),
        target_tz = escape_html(target_tz),
    )
}

// ── Handlers ───────────────────────────────────────────────────────────────────

/// Store reads hit the filesystem, so they run on the blocking pool.
async fn read_stores<T, F>(state: StatusState, read: F) -> Result<T, StatusCode>
where
    T: Send + 'static,
    F: FnOnce(&StatusState) -> T + Send + 'static,
{
    tokio::task::spawn_blocking(move || read(&state))
        .await
        .map_err(|e| {
            error!("Status store read failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn index(State(state): State<StatusState>) -> Result<Html<String>, StatusCode> {
    let page = read_stores(state, |state| {
        render_page(
            &state.channels.list(),
            &state.filters.list(),
            &state.source_timezone,
            &state.target_timezone,
        )
    })
    .await?;
    Ok(Html(page))
}

async fn status_api(State(state): State<StatusState>) -> Result<Json<StatusResponse>, StatusCode> {
    let body = read_stores(state, |state| StatusResponse {
        status: "online",
        channels_count: state.channels.len(),
        filters_count: state.filters.len(),
    })
    .await?;
    Ok(Json(body))
}

pub fn router(state: StatusState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status_api))
        .with_state(state)
}

pub async fn bind(config: &StatusConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind status server to {addr}"))?;
    info!("Status page listening on http://{}", addr);
    Ok(listener)
}

pub async fn serve(listener: TcpListener, state: StatusState) -> Result<()> {
    axum::serve(listener, router(state))
        .await
        .context("Status server error")
}

// ── Tests ──────────────────────────────────────────────────────────────────────
