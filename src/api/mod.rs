//! HTTP query service over the message store

mod error;
mod health;
mod latest;
mod map;
mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

use crate::{errors::SailtrackError, models::Mmsi};

/// Build the full application router
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(latest::router())
        .merge(map::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Parse a vessel id path segment.
///
/// `0` addresses reports whose vessel could not be identified.
pub(crate) fn parse_vessel_id(segment: &str) -> Result<Option<Mmsi>, SailtrackError> {
    match segment.trim() {
        "0" => Ok(None),
        other => Mmsi::try_from(other).map(Some),
    }
}
