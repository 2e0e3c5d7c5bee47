//! Position extraction from decoded stream messages.
//!
//! Upstream feeds do not agree on coordinate field names, so a fixed list of
//! aliases is searched. The first alias that yields a usable number wins,
//! which makes the result deterministic when a message carries several
//! spellings with different values.

use serde_json::Value;

use crate::models::{lookup, Position};

const LAT_KEYS: [&str; 6] = ["lat", "latitude", "Lat", "Latitude", "LAT", "LATITUDE"];
const LON_KEYS: [&str; 8] = [
    "lon",
    "lng",
    "longitude",
    "Lon",
    "Lng",
    "Longitude",
    "LON",
    "LONGITUDE",
];

/// Objects searched for coordinates, in order
const CONTAINERS: [&[&str]; 3] = [&[], &["MetaData"], &["Message", "PositionReport"]];

/// Extract a position from a decoded message.
///
/// Returns `None` when no container holds both a latitude and a longitude,
/// or when the values are outside WGS84 bounds.
pub fn extract(message: &Value) -> Option<Position> {
    CONTAINERS
        .iter()
        .filter_map(|path| lookup(message, path))
        .find_map(extract_from_object)
}

/// Extract a position from raw payload bytes.
pub fn extract_raw(payload: &[u8]) -> Option<Position> {
    serde_json::from_slice::<Value>(payload)
        .ok()
        .as_ref()
        .and_then(extract)
}

fn extract_from_object(object: &Value) -> Option<Position> {
    let lat = first_number(object, &LAT_KEYS)?;
    let lon = first_number(object, &LON_KEYS)?;

    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return None;
    }
    Some(Position { lat, lon })
}

fn first_number(object: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find_map(as_number)
}

fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}
