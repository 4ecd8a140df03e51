//! Web routes.

use std::sync::Arc;

use axum::{
    Router,
    extract::{OriginalUri, Query, State},
    http::{HeaderMap, Uri, header},
    response::{Html, IntoResponse, Json},
    routing::get,
};
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;
use url::Url;

use sundial_scheduler::{
    HistoryPageData, Manager, PageRequest, Sort, StatusCode, StatusData, StatusPageData,
};

use crate::WebError;

/// Shared state for the web server.
pub struct AppState {
    pub manager: Manager,
}

/// Create the web router for a manager.
pub fn create_router(manager: Manager) -> Router {
    let state = Arc::new(AppState { manager });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        // Jobs
        .route("/jobs", get(jobs_page))
        .route("/api/jobs", get(jobs_json))
        // History
        .route("/histories", get(histories_page))
        .route("/api/histories", get(histories_json))
        .with_state(state)
        .layer(ServiceBuilder::new().layer(cors))
}

#[derive(Debug, Default, Deserialize)]
struct SortQuery {
    #[serde(default)]
    sort: String,
}

async fn index(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.manager.info())
}

async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn jobs_json(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SortQuery>,
) -> Json<StatusPageData> {
    Json(state.manager.get_status_data(&query.sort).await)
}

async fn jobs_page(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SortQuery>,
) -> impl IntoResponse {
    let page = state.manager.get_status_data(&query.sort).await;
    let info = state.manager.info();

    let mut rows = String::new();
    for item in &page.data {
        rows.push_str(&job_row(item));
    }

    Html(
        JOBS_HTML
            .replace("<!-- HEADERS -->", &sort_headers("/jobs", &page.sort, STATUS_COLUMNS))
            .replace("<!-- JOBS -->", &rows)
            .replace("<!-- COUNT -->", &page.data.len().to_string())
            .replace("<!-- LOCATION -->", &html_escape(&info.location))
            .replace("<!-- UPTIME -->", &html_escape(&info.up_time)),
    )
}

async fn histories_json(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(request): Query<PageRequest>,
) -> Result<Json<HistoryPageData>, WebError> {
    let page = history_page(&state, &uri, &headers, request).await?;
    Ok(Json(page))
}

async fn histories_page(
    State(state): State<Arc<AppState>>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    Query(request): Query<PageRequest>,
) -> Result<Html<String>, WebError> {
    let page = history_page(&state, &uri, &headers, request).await?;

    let mut rows = String::new();
    for record in &page.data {
        let error = record
            .error
            .as_ref()
            .map(|e| format!(r#"<div class="error">{}</div>"#, html_escape(&e.err)))
            .unwrap_or_default();
        rows.push_str(&format!(
            r#"<tr>
                <td><code>{}</code></td>
                <td>{}</td>
                <td><span class="status {}">{}</span>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
            </tr>"#,
            record.id,
            html_escape(&record.name),
            record.status.to_lowercase(),
            html_escape(&record.status),
            error,
            html_escape(&record.metadata.machine_id),
            format_time(Some(record.started_at)),
            format_time(Some(record.finished_at)),
            html_escape(&record.latency_text),
        ));
    }

    let mut nav = String::new();
    if let Some(prev) = &page.pagination.previous_uri {
        nav.push_str(&format!(
            r#"<a class="btn" href="{}">&larr; Newer</a>"#,
            html_escape(prev)
        ));
    }
    if let Some(next) = &page.pagination.next_uri {
        nav.push_str(&format!(
            r#"<a class="btn" href="{}">Older &rarr;</a>"#,
            html_escape(next)
        ));
    }

    Ok(Html(
        HISTORIES_HTML
            .replace(
                "<!-- HEADERS -->",
                &sort_headers("/histories", &page.sort, HISTORY_COLUMNS),
            )
            .replace("<!-- HISTORIES -->", &rows)
            .replace("<!-- COUNT -->", &page.pagination.yielded.to_string())
            .replace("<!-- NAV -->", &nav),
    ))
}

async fn history_page(
    state: &AppState,
    uri: &Uri,
    headers: &HeaderMap,
    request: PageRequest,
) -> Result<HistoryPageData, WebError> {
    let url = request_url(headers, uri)?;
    debug!(url = %url, "history page requested");
    Ok(state
        .manager
        .get_history_data(request.with_url(url))
        .await?)
}

/// Rebuild the absolute URL of the request so page links keep its path.
fn request_url(headers: &HeaderMap, uri: &Uri) -> Result<Url, WebError> {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    Ok(Url::parse(&format!("http://{}{}", host, path))?)
}

const STATUS_COLUMNS: &[(&str, &str)] = &[
    ("id", "ID"),
    ("name", "Name"),
    ("status", "Status"),
    ("prev_run", "Prev Run"),
    ("next_run", "Next Run"),
    ("latency", "Latency"),
];

const HISTORY_COLUMNS: &[(&str, &str)] = &[
    ("id", "ID"),
    ("name", "Name"),
    ("status", "Status"),
    ("", "Machine"),
    ("started_at", "Started"),
    ("finished_at", "Finished"),
    ("latency", "Latency"),
];

/// Table headers whose links toggle the sort direction of their column.
fn sort_headers(path: &str, sort: &Sort, columns: &[(&str, &str)]) -> String {
    let mut html = String::new();
    for (key, label) in columns {
        if key.is_empty() {
            html.push_str(&format!("<th>{}</th>", label));
            continue;
        }
        let (next_sort, arrow) = match sort.columns.get(*key).map(String::as_str) {
            Some("ASC") => (format!("{}:desc", key), " &uarr;"),
            Some(_) => (key.to_string(), " &darr;"),
            None => (key.to_string(), ""),
        };
        html.push_str(&format!(
            r#"<th><a href="{}?sort={}">{}</a>{}</th>"#,
            path, next_sort, label, arrow
        ));
    }
    html
}

fn job_row(item: &StatusData) -> String {
    let job = &item.job;
    let name = if job.metadata.total_wave > 1 {
        format!(
            "{} <span class=\"wave\">{}/{}</span>",
            html_escape(&job.name),
            job.metadata.wave,
            job.metadata.total_wave
        )
    } else {
        html_escape(&job.name)
    };

    let id = if item.id.is_valid() {
        item.id.to_string()
    } else {
        "-".to_string()
    };

    let mut prev = format_time(item.prev);
    if job.status == StatusCode::Error && !job.error.is_empty() {
        prev.push_str(&format!(
            r#"<div class="error">{}</div>"#,
            html_escape(&job.error)
        ));
    }

    let next = if job.status == StatusCode::Down {
        format!(r#"<div class="error">{}</div>"#, html_escape(&job.error))
    } else {
        format_time(item.next)
    };

    let latency = if job.latency.is_empty() {
        "-".to_string()
    } else {
        html_escape(&job.latency)
    };

    format!(
        r#"<tr>
                <td><code>{}</code></td>
                <td>{}</td>
                <td><span class="status {}">{}</span></td>
                <td>{}</td>
                <td>{}</td>
                <td>{}</td>
            </tr>"#,
        id,
        name,
        job.status.as_str().to_lowercase(),
        job.status,
        prev,
        next,
        latency,
    )
}

fn format_time(t: Option<DateTime<FixedOffset>>) -> String {
    t.map(|t| t.format("%Y-%m-%d %H:%M:%S %:z").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

// =============================================================================
// Templates
// =============================================================================

const JOBS_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Sundial - Jobs</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            max-width: 1100px;
            margin: 0 auto;
            padding: 2rem;
            background: #0a0a0a;
            color: #e0e0e0;
        }
        h1 { color: #88c0d0; }
        a { color: #81a1c1; }
        th a { color: #88c0d0; text-decoration: none; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; }
        th, td { padding: 0.75rem; text-align: left; border-bottom: 1px solid #3b4252; vertical-align: top; }
        th { background: #2e3440; color: #88c0d0; }
        tr:hover { background: #2e3440; }
        code { background: #3b4252; padding: 0.2rem 0.4rem; border-radius: 3px; font-size: 0.9rem; }
        .header { display: flex; justify-content: space-between; align-items: center; }
        .meta { color: #888; }
        .wave { color: #888; font-size: 0.85rem; }
        .error { color: #bf616a; font-size: 0.85rem; margin-top: 0.3rem; }
        .status {
            padding: 0.2rem 0.5rem;
            border-radius: 3px;
            font-size: 0.85rem;
        }
        .status.up { background: #88c0d0; color: #000; }
        .status.idle { background: #a3be8c; color: #000; }
        .status.running { background: #81a1c1; color: #000; }
        .status.error { background: #bf616a; color: #fff; }
        .status.down { background: #4c566a; color: #fff; }
    </style>
</head>
<body>
    <div class="header">
        <h1>Sundial / Jobs</h1>
        <a href="/histories">History</a>
    </div>
    <p class="meta"><!-- COUNT --> jobs &middot; <!-- LOCATION --> &middot; up <!-- UPTIME --></p>
    <table>
        <thead>
            <tr><!-- HEADERS --></tr>
        </thead>
        <tbody>
            <!-- JOBS -->
        </tbody>
    </table>
</body>
</html>"#;

const HISTORIES_HTML: &str = r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>Sundial - History</title>
    <style>
        body {
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            max-width: 1100px;
            margin: 0 auto;
            padding: 2rem;
            background: #0a0a0a;
            color: #e0e0e0;
        }
        h1 { color: #88c0d0; }
        a { color: #81a1c1; }
        th a { color: #88c0d0; text-decoration: none; }
        table { width: 100%; border-collapse: collapse; margin-top: 1rem; }
        th, td { padding: 0.75rem; text-align: left; border-bottom: 1px solid #3b4252; vertical-align: top; }
        th { background: #2e3440; color: #88c0d0; }
        tr:hover { background: #2e3440; }
        code { background: #3b4252; padding: 0.2rem 0.4rem; border-radius: 3px; font-size: 0.9rem; }
        .header { display: flex; justify-content: space-between; align-items: center; }
        .meta { color: #888; }
        .nav { display: flex; gap: 1rem; margin-top: 1rem; }
        .btn { padding: 0.5rem 1rem; background: #5e81ac; color: #fff; border: none; border-radius: 4px; text-decoration: none; }
        .btn:hover { background: #81a1c1; }
        .error { color: #bf616a; font-size: 0.85rem; margin-top: 0.3rem; }
        .status {
            padding: 0.2rem 0.5rem;
            border-radius: 3px;
            font-size: 0.85rem;
        }
        .status.idle { background: #a3be8c; color: #000; }
        .status.error { background: #bf616a; color: #fff; }
    </style>
</head>
<body>
    <div class="header">
        <h1>Sundial / History</h1>
        <a href="/jobs">Jobs</a>
    </div>
    <p class="meta"><!-- COUNT --> runs on this page</p>
    <table>
        <thead>
            <tr><!-- HEADERS --></tr>
        </thead>
        <tbody>
            <!-- HISTORIES -->
        </tbody>
    </table>
    <div class="nav"><!-- NAV --></div>
</body>
</html>"#;
