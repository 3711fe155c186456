//! HTTP endpoints: streaming SSE search, blocking aggregate search, health.

use crate::error::ApiError;
use crate::state::AppState;
use awardgrid_browser::PoolStats;
use awardgrid_core::{AirportCode, DatePairKey, SearchQuery};
use awardgrid_search::{DateGrid, EventSink};
use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::info;

/// Build the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search", post(search))
        .route("/api/search-stream", post(search_stream))
        .with_state(state)
}

/// Incoming search request body. All fields are validated explicitly so
/// missing ones produce the contract's client error, not a decode failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub center_date: Option<String>,
}

/// One cell of the blocking response's full grid; unsampled or unresolved
/// cells carry a null price.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GridSlot {
    key: DatePairKey,
    price: Option<String>,
    outbound: String,
    #[serde(rename = "return")]
    return_label: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchStats {
    total_combinations: usize,
    sampled_combinations: usize,
    successful_searches: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    origin: String,
    destination: String,
    center_date: String,
    status: String,
    timestamp: String,
    grid_data: Vec<GridSlot>,
    search_stats: SearchStats,
    pool_stats: PoolStats,
}

async fn health() -> &'static str {
    "ok"
}

/// `POST /api/search-stream` — run a search, streaming events as they
/// happen; the response body is a server-sent-events sequence ending with
/// the `complete` event.
async fn search_stream(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validate(&request)?;
    let context = state.context().ok_or(ApiError::NotReady)?;
    info!(
        origin = %query.origin,
        destination = %query.destination,
        center_date = %query.center_date,
        "streaming search request received"
    );

    let (sink, rx) = EventSink::channel();
    tokio::spawn(async move {
        context.orchestrator.run(&query, &sink).await;
    });

    // The channel closes once the run finishes, which ends the body after
    // the terminal `complete` frame.
    let frames = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv()
            .await
            .map(|event| (Ok::<_, Infallible>(event.to_sse_frame()), rx))
    });

    Ok((
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(frames),
    ))
}

/// `POST /api/search` — one synchronous run returning the aggregate grid
/// document.
async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let query = validate(&request)?;
    let context = state.context().ok_or(ApiError::NotReady)?;
    info!(
        origin = %query.origin,
        destination = %query.destination,
        center_date = %query.center_date,
        "blocking search request received"
    );

    let outcome = context
        .orchestrator
        .run(&query, &EventSink::disconnected())
        .await;
    let pool_stats = context.orchestrator.pool().stats().await;

    let grid = DateGrid::around(query.center_date);
    let grid_data = grid
        .cells()
        .map(|combo| GridSlot {
            key: combo.key.clone(),
            price: outcome.cells.get(&combo.key).map(|cell| cell.price.clone()),
            outbound: combo.outbound_label.clone(),
            return_label: combo.return_label.clone(),
        })
        .collect();

    Ok(Json(SearchResponse {
        origin: query.origin.to_string(),
        destination: query.destination.to_string(),
        center_date: query.center_date.to_string(),
        status: "Search completed".to_string(),
        timestamp: Utc::now().to_rfc3339(),
        grid_data,
        search_stats: SearchStats {
            total_combinations: grid.total_cells(),
            sampled_combinations: outcome.sampled,
            successful_searches: outcome.successful,
        },
        pool_stats,
    }))
}

/// Check the request and turn it into a typed query.
fn validate(request: &SearchRequest) -> Result<SearchQuery, ApiError> {
    fn present(field: &Option<String>) -> Option<&str> {
        field
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    let (Some(origin), Some(destination), Some(center_date)) = (
        present(&request.origin),
        present(&request.destination),
        present(&request.center_date),
    ) else {
        return Err(ApiError::MissingParameter(
            "Origin, destination, and center date are required".to_string(),
        ));
    };

    let origin =
        AirportCode::new(origin).map_err(|e| ApiError::InvalidParameter(e.to_string()))?;
    let destination =
        AirportCode::new(destination).map_err(|e| ApiError::InvalidParameter(e.to_string()))?;
    let center_date = NaiveDate::parse_from_str(center_date, "%Y-%m-%d").map_err(|_| {
        ApiError::InvalidParameter(format!(
            "invalid center date '{center_date}', expected YYYY-MM-DD"
        ))
    })?;

    Ok(SearchQuery {
        origin,
        destination,
        center_date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(origin: &str, destination: &str, center_date: &str) -> SearchRequest {
        SearchRequest {
            origin: Some(origin.to_string()),
            destination: Some(destination.to_string()),
            center_date: Some(center_date.to_string()),
        }
    }

    #[test]
    fn test_validate_accepts_lowercase_codes() {
        let query = validate(&request("lhr", "jfk", "2026-07-14")).expect("valid request");
        assert_eq!(query.origin.as_str(), "LHR");
        assert_eq!(query.destination.as_str(), "JFK");
        assert_eq!(
            query.center_date,
            NaiveDate::from_ymd_opt(2026, 7, 14).expect("valid date")
        );
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let err = validate(&SearchRequest::default()).expect_err("empty request");
        assert!(matches!(err, ApiError::MissingParameter(_)));

        let mut partial = request("LHR", "JFK", "2026-07-14");
        partial.center_date = None;
        assert!(matches!(
            validate(&partial),
            Err(ApiError::MissingParameter(_))
        ));

        // Whitespace-only counts as missing.
        let blank = request("  ", "JFK", "2026-07-14");
        assert!(matches!(
            validate(&blank),
            Err(ApiError::MissingParameter(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let err = validate(&request("LHRX", "JFK", "2026-07-14")).expect_err("bad airport");
        assert!(matches!(err, ApiError::InvalidParameter(_)));

        let err = validate(&request("LHR", "JFK", "14/07/2026")).expect_err("bad date");
        assert!(matches!(err, ApiError::InvalidParameter(_)));
    }
}
