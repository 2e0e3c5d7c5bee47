//! AIS stream subscriber
//!
//! Connects to an aisstream.io compatible WebSocket feed, subscribes with an
//! API key and optional vessel filter, and appends every received frame to the
//! [`MessageStore`]. Frames are stored verbatim whether or not they parse.

use std::time::{Duration, Instant};

use backon::BackoffBuilder;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    config::{ReconnectConfig, StreamConfig},
    database::MessageStore,
    errors::SailtrackError,
    models::Mmsi,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Subscription request, sent once per session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    #[serde(rename = "APIKey")]
    pub api_key: String,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: Vec<[[f64; 2]; 2]>,
    /// Vessel filter; omitted when empty, which subscribes to all vessels
    #[serde(rename = "FiltersShipMMSI", skip_serializing_if = "Vec::is_empty")]
    pub filters_ship_mmsi: Vec<String>,
}

impl Subscription {
    pub fn new(api_key: &str, bounding_boxes: &[[[f64; 2]; 2]], mmsi_filter: &[Mmsi]) -> Self {
        Self {
            api_key: api_key.to_string(),
            bounding_boxes: bounding_boxes.to_vec(),
            filters_ship_mmsi: mmsi_filter.iter().map(Mmsi::to_string).collect(),
        }
    }

    fn describe(&self) -> String {
        if self.filters_ship_mmsi.is_empty() {
            "all ships".to_string()
        } else {
            self.filters_ship_mmsi.join(",")
        }
    }
}

/// How a session ended without a transport error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Cancellation was requested; the transport has been closed
    Cancelled,
    /// The upstream closed the stream
    Closed,
}

/// Long-lived subscriber that reconnects with backoff
pub struct StreamSubscriber {
    url: String,
    subscription: Subscription,
    auth_timeout: Duration,
    reconnect: ReconnectConfig,
    store: MessageStore,
}

impl StreamSubscriber {
    /// Create a subscriber from configuration
    ///
    /// Fails when no API key is configured or the vessel filter is invalid.
    pub fn new(config: &StreamConfig, store: MessageStore) -> Result<Self, SailtrackError> {
        config.validate()?;
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| SailtrackError::ConfigurationError {
                message: "Stream API key is not set".to_string(),
            })?;

        Ok(Self {
            url: config.url.clone(),
            subscription: Subscription::new(api_key, &config.bounding_boxes, &config.mmsi_filter()?),
            auth_timeout: config.auth_timeout,
            reconnect: config.reconnect.clone(),
            store,
        })
    }

    /// Connect, subscribe and wait briefly for the upstream to reject the key
    ///
    /// A frame that arrives within the wait and is not a rejection is kept
    /// and stored first when the session runs. A rejection frame is stored
    /// before the error is returned.
    pub async fn connect(&self) -> Result<StreamSession, SailtrackError> {
        info!("Connecting to {}", self.url);
        let (mut ws, _response) = connect_async(self.url.as_str())
            .await
            .map_err(handshake_error)?;

        let request = serde_json::to_string(&self.subscription)?;
        ws.send(Message::text(request)).await?;
        info!("Subscribed to AIS stream for {}", self.subscription.describe());

        let pending = match tokio::time::timeout(self.auth_timeout, ws.next()).await {
            // Nothing yet; a quiet filter is not a rejection
            Err(_) => None,
            Ok(None) => {
                return Err(SailtrackError::ConnectionError(
                    "Stream ended during subscription".to_string(),
                ))
            }
            Ok(Some(Err(e))) => return Err(e.into()),
            Ok(Some(Ok(Message::Close(frame)))) => return Err(close_error(frame)),
            Ok(Some(Ok(message))) => {
                if let Some(reason) = upstream_error(&message) {
                    if let Some(payload) = frame_payload(&message) {
                        if let Err(e) = ingest(&self.store, payload).await {
                            error!("Error storing AIS message: {}", e);
                        }
                    }
                    return Err(SailtrackError::AuthenticationError(reason));
                }
                Some(message)
            }
        };

        Ok(StreamSession {
            ws,
            store: self.store.clone(),
            pending,
        })
    }

    /// Run sessions until cancelled, reconnecting with exponential backoff
    ///
    /// Authentication errors are returned immediately. Other failures are
    /// retried until `max_retries` consecutive attempts fail; a session that
    /// stayed up for `healthy_after` resets the count.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), SailtrackError> {
        let backoff = self.reconnect.backoff();
        let mut delays = backoff.build();
        let mut failures = 0u32;

        loop {
            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                result = self.connect() => result,
            };

            let failure = match connected {
                Ok(session) => {
                    let started = Instant::now();
                    let outcome = session.run(&cancel).await;
                    if started.elapsed() >= self.reconnect.healthy_after {
                        delays = backoff.build();
                        failures = 0;
                    }
                    match outcome {
                        Ok(SessionEnd::Cancelled) => return Ok(()),
                        Ok(SessionEnd::Closed) => SailtrackError::ConnectionError(
                            "Upstream closed the stream".to_string(),
                        ),
                        Err(e) => e,
                    }
                }
                Err(e @ SailtrackError::AuthenticationError(_)) => {
                    error!("Subscription rejected: {}", e);
                    return Err(e);
                }
                Err(e) => e,
            };

            failures += 1;
            let Some(delay) = delays.next() else {
                error!(
                    "Giving up on AIS stream after {} failed attempts: {}",
                    failures, failure
                );
                return Err(failure);
            };

            warn!("AIS stream interrupted: {}; reconnecting in {:?}", failure, delay);
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// One connected, subscribed stream
pub struct StreamSession {
    ws: WsStream,
    store: MessageStore,
    pending: Option<Message>,
}

impl StreamSession {
    /// Receive and store messages until cancelled or the stream ends
    ///
    /// Cancellation is only observed between messages, so a received frame
    /// always finishes its append before the transport is closed.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<SessionEnd, SailtrackError> {
        if let Some(message) = self.pending.take() {
            if let Some(end) = self.handle(message).await {
                return Ok(end);
            }
        }

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    self.close().await;
                    return Ok(SessionEnd::Cancelled);
                }
                next = self.ws.next() => next,
            };

            match next {
                Some(Ok(message)) => {
                    if let Some(end) = self.handle(message).await {
                        return Ok(end);
                    }
                }
                Some(Err(e)) => {
                    error!("AIS stream receive error: {}", e);
                    return Err(e.into());
                }
                None => return Ok(SessionEnd::Closed),
            }
        }
    }

    async fn handle(&mut self, message: Message) -> Option<SessionEnd> {
        match message {
            Message::Text(text) => self.record(text.as_bytes()).await,
            Message::Binary(data) => self.record(&data).await,
            Message::Close(frame) => {
                info!("AIS stream closed by upstream: {:?}", frame);
                return Some(SessionEnd::Closed);
            }
            // Pings are answered by the transport
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
        }
        None
    }

    async fn record(&self, payload: &[u8]) {
        if let Err(e) = ingest(&self.store, payload).await {
            error!("Error storing AIS message: {}", e);
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.ws.close(None).await {
            debug!("Error closing AIS stream: {}", e);
        }
    }
}

/// Store one stream message, attributing it to a vessel when possible
///
/// Parse failures are logged and the payload is stored without a vessel id.
pub async fn ingest(store: &MessageStore, payload: &[u8]) -> Result<i64, SailtrackError> {
    let received_at = Utc::now();

    let mmsi = match serde_json::from_slice::<Value>(payload) {
        Ok(value) => {
            let mmsi = Mmsi::from_message(&value);
            if mmsi.is_none() {
                debug!("AIS message has no recognizable MMSI");
            }
            mmsi
        }
        Err(e) => {
            let e = SailtrackError::ParseError(e.to_string());
            warn!("{}: {}", e, String::from_utf8_lossy(payload));
            None
        }
    };

    if let Some(mmsi) = mmsi {
        debug!("Received AIS message for MMSI {}", mmsi);
    }
    store.append(mmsi, payload, received_at).await
}

fn frame_payload(message: &Message) -> Option<&[u8]> {
    match message {
        Message::Text(text) => Some(text.as_bytes()),
        Message::Binary(data) => Some(&data[..]),
        _ => None,
    }
}

/// Rejection reason if the frame is an upstream error object
fn upstream_error(message: &Message) -> Option<String> {
    let value: Value = serde_json::from_slice(frame_payload(message)?).ok()?;
    value.get("error")?.as_str().map(str::to_string)
}

fn handshake_error(err: tungstenite::Error) -> SailtrackError {
    match &err {
        tungstenite::Error::Http(response) if matches!(response.status().as_u16(), 401 | 403) => {
            SailtrackError::AuthenticationError(format!("HTTP {}", response.status()))
        }
        _ => SailtrackError::ConnectionError(err.to_string()),
    }
}

fn close_error(frame: Option<CloseFrame>) -> SailtrackError {
    match frame {
        Some(frame) if frame.code == CloseCode::Policy => {
            SailtrackError::AuthenticationError(frame.reason.as_str().to_string())
        }
        Some(frame) => SailtrackError::ConnectionError(format!(
            "Stream closed during subscription: {} {}",
            u16::from(frame.code),
            frame.reason.as_str()
        )),
        None => SailtrackError::ConnectionError("Stream closed during subscription".to_string()),
    }
}
