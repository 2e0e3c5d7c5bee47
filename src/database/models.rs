// src/database/models.rs
use chrono::{DateTime, Utc};

use crate::{
    errors::SailtrackError,
    models::{Mmsi, PositionReport},
};

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ReportRow {
    sequence_id: i64,
    received_at: DateTime<Utc>,
    mmsi: Option<i64>, // NULL when the vessel could not be identified
    raw_payload: Vec<u8>,
}

impl TryFrom<ReportRow> for PositionReport {
    type Error = SailtrackError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(PositionReport {
            sequence_id: row.sequence_id,
            received_at: row.received_at,
            mmsi: row.mmsi.map(Mmsi::try_from).transpose()?,
            raw_payload: row.raw_payload,
        })
    }
}
