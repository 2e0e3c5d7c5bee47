//! Latest stored message per vessel.

use axum::extract::{Path, State};
use axum::{routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::instrument;

use super::{parse_vessel_id, ApiError, AppState};
use crate::errors::SailtrackError;
use crate::models::{Mmsi, PositionReport};

#[derive(Debug, Serialize)]
pub struct LatestResponse {
    /// Time the message was received
    pub timestamp: DateTime<Utc>,
    /// Decoded payload, or `{"raw": ...}` when it is not JSON
    pub message: Value,
    pub mmsi: Option<Mmsi>,
}

impl From<PositionReport> for LatestResponse {
    fn from(report: PositionReport) -> Self {
        let message = report.message().unwrap_or_else(
            || json!({ "raw": String::from_utf8_lossy(&report.raw_payload) }),
        );
        Self {
            timestamp: report.received_at,
            message,
            mmsi: report.mmsi,
        }
    }
}

/// GET /latest/{vessel_id}
#[instrument(skip(state))]
async fn latest_for_vessel(
    State(state): State<AppState>,
    Path(vessel_id): Path<String>,
) -> Result<Json<LatestResponse>, ApiError> {
    let mmsi = parse_vessel_id(&vessel_id)?;
    let report = state
        .store
        .latest(mmsi)
        .await?
        .ok_or(SailtrackError::NotFound)?;

    Ok(Json(report.into()))
}

/// GET /latest
#[instrument(skip(state))]
async fn latest_any(State(state): State<AppState>) -> Result<Json<LatestResponse>, ApiError> {
    let report = state
        .store
        .latest_any()
        .await?
        .ok_or(SailtrackError::NotFound)?;

    Ok(Json(report.into()))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/latest", get(latest_any))
        .route("/latest/{vessel_id}", get(latest_for_vessel))
        .route("/v1/ais/{vessel_id}", get(latest_for_vessel))
}
