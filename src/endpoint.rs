/// HTTP endpoint for the propagation monitor
///
/// Gives a presentation layer (menu bar app, dashboard, curl) read access to
/// the refresh state and a way to change the tracked selection.
///
/// Endpoints:
/// - GET  /health                               - Service health check
/// - GET  /status                               - Refresh state summary
/// - GET  /snapshot                             - Current snapshot (404 before the first success)
/// - GET  /tracked                              - Tracked band and phenomenon slots
/// - POST /tracked/band?name=..&time=..         - Toggle a band slot
/// - POST /tracked/vhf?name=..&location=..      - Toggle a phenomenon slot
/// - POST /refresh                              - Start a refresh now

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::daemon::RefreshScheduler;
use crate::model::{BandKey, PhenomenonKey, format_local};
use crate::monitor::StateStore;

#[derive(Debug, Error)]
pub enum EndpointError {
    #[error("failed to start HTTP server on port {port}: {reason}")]
    Bind { port: u16, reason: String },
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Summary of the refresh state for `/status`
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub is_loading: bool,
    pub last_error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_success_local: Option<String>,
    /// The feed's own `<updated>` stamp, as text and parsed
    pub feed_updated: Option<String>,
    pub feed_updated_at: Option<DateTime<Utc>>,
    /// No successful fetch within two refresh intervals
    pub stale: bool,
    pub solar_flux: Option<f64>,
    pub k_index: Option<f64>,
    pub a_index: Option<f64>,
    pub band_count: usize,
    pub phenomenon_count: usize,
    pub tracked_count: usize,
}

#[derive(Debug, Serialize)]
pub struct TrackedResponse {
    pub bands: Vec<BandKey>,
    pub phenomena: Vec<PhenomenonKey>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Status code and JSON body for one request.
pub type RouteResult = (u16, serde_json::Value);

/// What a request may read or act on.
pub struct RouteContext<'a> {
    pub store: &'a StateStore,
    /// Age after which `/status` reports the data as stale
    pub stale_after: Duration,
    /// Called for `POST /refresh`
    pub trigger_refresh: &'a dyn Fn(),
}

/// Routes a request without touching the network.
pub fn route(method: &str, url: &str, ctx: &RouteContext<'_>) -> RouteResult {
    let store = ctx.store;
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (url, HashMap::new()),
    };

    match (method, path) {
        ("GET", "/health") => handle_health(),
        ("GET", "/status") => handle_status(store, ctx.stale_after),
        ("GET", "/snapshot") => handle_snapshot(store),
        ("GET", "/tracked") => handle_tracked(store),
        ("POST", "/tracked/band") => {
            match (query.get("name"), query.get("time")) {
                (Some(name), Some(time)) => {
                    let key = BandKey::new(name, time);
                    let tracked = store.toggle_band(key.clone());
                    log::info!("Band {} tracking {}", key, if tracked { "on" } else { "off" });
                    (200, serde_json::json!({ "band": key, "tracked": tracked }))
                }
                _ => bad_request("name and time query parameters are required"),
            }
        }
        ("POST", "/tracked/vhf") => {
            match (query.get("name"), query.get("location")) {
                (Some(name), Some(location)) => {
                    let key = PhenomenonKey::new(name, location);
                    let tracked = store.toggle_phenomenon(key.clone());
                    log::info!("Phenomenon {} tracking {}", key, if tracked { "on" } else { "off" });
                    (200, serde_json::json!({ "phenomenon": key, "tracked": tracked }))
                }
                _ => bad_request("name and location query parameters are required"),
            }
        }
        ("POST", "/refresh") => {
            (ctx.trigger_refresh)();
            (202, serde_json::json!({ "status": "refresh started" }))
        }
        (_, "/health" | "/status" | "/snapshot" | "/tracked" | "/tracked/band" | "/tracked/vhf" | "/refresh") => (
            405,
            serde_json::json!({ "error": "Method not allowed", "method": method, "path": path }),
        ),
        _ => (
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": [
                    "GET /health",
                    "GET /status",
                    "GET /snapshot",
                    "GET /tracked",
                    "POST /tracked/band?name=..&time=..",
                    "POST /tracked/vhf?name=..&location=..",
                    "POST /refresh"
                ]
            }),
        ),
    }
}

/// Decodes `a=1&b=two%20words`. Pairs that fail to decode are skipped.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = urlencoding::decode(&key.replace('+', " ")).ok()?.into_owned();
            let value = urlencoding::decode(&value.replace('+', " ")).ok()?.into_owned();
            Some((key, value))
        })
        .collect()
}

fn bad_request(message: &str) -> RouteResult {
    (400, serde_json::json!({ "error": message }))
}

fn handle_health() -> RouteResult {
    (
        200,
        serde_json::json!({
            "status": "ok",
            "service": "propmon_service",
            "version": env!("CARGO_PKG_VERSION")
        }),
    )
}

fn handle_status(store: &StateStore, stale_after: Duration) -> RouteResult {
    let state = store.state();
    let snapshot = state.current_snapshot.as_ref();

    let status = StatusResponse {
        is_loading: state.is_loading,
        last_error: state.last_error.clone(),
        last_success: state.last_success,
        last_success_local: state.last_success.map(format_local),
        feed_updated: snapshot.map(|s| s.updated.clone()),
        feed_updated_at: snapshot.and_then(|s| s.updated_at()),
        stale: state.is_stale(Utc::now(), stale_after),
        solar_flux: snapshot.and_then(|s| s.solar_flux_value()),
        k_index: snapshot.and_then(|s| s.k_index_value()),
        a_index: snapshot.and_then(|s| s.a_index_value()),
        band_count: snapshot.map_or(0, |s| s.band_conditions.len()),
        phenomenon_count: snapshot.map_or(0, |s| s.vhf_conditions.len()),
        tracked_count: store.tracked().len(),
    };

    to_json(200, &status)
}

fn handle_snapshot(store: &StateStore) -> RouteResult {
    match store.state().current_snapshot {
        Some(snapshot) => to_json(200, &snapshot),
        None => (
            404,
            serde_json::json!({ "error": "No snapshot yet; the first refresh has not completed" }),
        ),
    }
}

fn handle_tracked(store: &StateStore) -> RouteResult {
    let tracked = store.tracked();
    let mut bands: Vec<BandKey> = tracked.bands().cloned().collect();
    let mut phenomena: Vec<PhenomenonKey> = tracked.phenomena().cloned().collect();
    bands.sort();
    phenomena.sort();

    to_json(200, &TrackedResponse { bands, phenomena })
}

fn to_json<T: Serialize>(status: u16, body: &T) -> RouteResult {
    match serde_json::to_value(body) {
        Ok(value) => (status, value),
        Err(e) => (500, serde_json::json!({ "error": e.to_string() })),
    }
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Serves the endpoint on `0.0.0.0:port`. Blocks for the life of the server.
pub fn start_endpoint_server(port: u16, scheduler: Arc<RefreshScheduler>) -> Result<(), EndpointError> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port)).map_err(|e| EndpointError::Bind {
        port,
        reason: e.to_string(),
    })?;

    log::info!("HTTP endpoint listening on http://0.0.0.0:{}", port);

    let trigger = || scheduler.trigger_immediate_fetch();
    let stale_after = Duration::from_std(scheduler.refresh_interval() * 2).unwrap_or(Duration::MAX);

    for request in server.incoming_requests() {
        let method = request.method().as_str().to_uppercase();
        let ctx = RouteContext {
            store: scheduler.store(),
            stale_after,
            trigger_refresh: &trigger,
        };
        let (status, body) = route(&method, request.url(), &ctx);

        log::debug!("{} {} -> {}", method, request.url(), status);

        if let Err(e) = request.respond(create_response(status, &body)) {
            log::warn!("Failed to send response: {}", e);
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| json.to_string());
    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(()) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
