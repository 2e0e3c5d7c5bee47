//! Map snapshot of a vessel's last known position.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{routing::get, Router};
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{parse_vessel_id, ApiError, AppState};
use crate::errors::SailtrackError;
use crate::position;
use crate::render::{ColorScheme, MapOptions, RenderError, MAX_SIDE};

#[derive(Debug, Default, Deserialize)]
pub struct MapQuery {
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(rename = "colorScheme")]
    pub color_scheme: Option<String>,
}

impl MapQuery {
    fn options(&self) -> Result<MapOptions, RenderError> {
        let defaults = MapOptions::default();
        let color_scheme = match &self.color_scheme {
            Some(scheme) => scheme.parse::<ColorScheme>()?,
            None => defaults.color_scheme,
        };
        Ok(MapOptions {
            width: self.width.unwrap_or(defaults.width).clamp(1, MAX_SIDE),
            height: self.height.unwrap_or(defaults.height).clamp(1, MAX_SIDE),
            color_scheme,
        })
    }
}

/// GET /map/{vessel_id}
#[instrument(skip(state))]
async fn vessel_map(
    State(state): State<AppState>,
    Path(vessel_id): Path<String>,
    Query(query): Query<MapQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let mmsi = parse_vessel_id(&vessel_id)?;
    let options = query.options().map_err(SailtrackError::from)?;

    let report = state
        .store
        .latest(mmsi)
        .await?
        .ok_or(SailtrackError::NotFound)?;

    let position = position::extract_raw(&report.raw_payload).ok_or_else(|| {
        SailtrackError::UnprocessableData("No position in latest message".to_string())
    })?;
    debug!(?position, "rendering map");

    let renderer = state.renderer.clone();
    let png = tokio::task::spawn_blocking(move || renderer.render(position, &options))
        .await
        .map_err(|e| SailtrackError::from(RenderError::Task(e.to_string())))?
        .map_err(SailtrackError::from)?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/map/{vessel_id}", get(vessel_map))
        .route("/v1/map/{vessel_id}", get(vessel_map))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamping() {
        let options = MapQuery::default().options().unwrap();
        assert_eq!(options, MapOptions::default());

        let query = MapQuery {
            width: Some(0),
            height: Some(100_000),
            color_scheme: Some("DARK".to_string()),
        };
        let options = query.options().unwrap();
        assert_eq!(options.width, 1);
        assert_eq!(options.height, MAX_SIDE);
        assert_eq!(options.color_scheme, ColorScheme::Dark);
    }

    #[test]
    fn unknown_color_scheme() {
        let query = MapQuery {
            color_scheme: Some("sepia".to_string()),
            ..MapQuery::default()
        };
        assert!(query.options().is_err());
    }
}
