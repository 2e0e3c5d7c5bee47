//! Background lifecycle of the stream subscriber

use std::future::Future;
use std::io;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    config::StreamConfig, database::MessageStore, errors::SailtrackError,
    stream::StreamSubscriber,
};

/// Handle to the running stream subscriber task
///
/// The subscriber starts in [`ListenerService::start`] and is cancelled by
/// [`ListenerService::stop`], which waits for the in-flight append and the
/// transport close to finish.
pub struct ListenerService {
    cancel: CancellationToken,
    handle: JoinHandle<Result<(), SailtrackError>>,
}

impl ListenerService {
    /// Start the listener if an API key is configured
    pub fn from_config(
        config: &StreamConfig,
        store: MessageStore,
    ) -> Result<Option<Self>, SailtrackError> {
        if config.api_key.is_none() {
            info!("No stream API key configured, AIS listener disabled");
            return Ok(None);
        }
        let subscriber = StreamSubscriber::new(config, store)?;
        Ok(Some(Self::start(subscriber)))
    }

    /// Spawn the subscriber as a background task
    pub fn start(subscriber: StreamSubscriber) -> Self {
        info!("Launching AIS listener background task");
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let result = subscriber.run(token).await;
            match &result {
                Ok(()) => info!("AIS listener stopped"),
                Err(e) => error!("AIS listener terminated: {}", e),
            }
            result
        });

        Self { cancel, handle }
    }

    /// Whether the subscriber task has already exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the subscriber and wait for it to wind down
    pub async fn stop(self) -> Result<(), SailtrackError> {
        info!("Stopping AIS listener");
        self.cancel.cancel();
        self.handle
            .await
            .map_err(|e| SailtrackError::TaskError(e.to_string()))?
    }
}

/// Wait for a shutdown signal
///
/// A listener that fails to register is logged and never resolves, so the
/// remaining signals still govern shutdown.
pub async fn wait_for_signal<F>(name: &str, signal: F)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Received {}", name),
        Err(e) => {
            error!("Failed to listen for {}: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseConfig, ReconnectConfig, DEFAULT_STREAM_URL};
    use std::time::Duration;

    #[tokio::test]
    async fn disabled_without_api_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(&DatabaseConfig {
            path: temp_dir.path().join("test.db"),
        })
        .await
        .unwrap();

        let config = StreamConfig {
            url: DEFAULT_STREAM_URL.to_string(),
            api_key: None,
            mmsi_filter: vec![],
            bounding_boxes: vec![],
            auth_timeout: Duration::from_millis(100),
            reconnect: ReconnectConfig::default(),
        };

        let service = ListenerService::from_config(&config, store).unwrap();
        assert!(service.is_none());
    }

    #[tokio::test]
    async fn signal_resolves() {
        tokio::time::timeout(
            Duration::from_secs(1),
            wait_for_signal("test signal", async { Ok::<_, io::Error>(()) }),
        )
        .await
        .expect("signal did not resolve");
    }

    #[tokio::test]
    async fn failed_signal_listener_never_resolves() {
        let failing = async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "no handler")) };
        let result =
            tokio::time::timeout(Duration::from_millis(100), wait_for_signal("test signal", failing))
                .await;
        assert!(result.is_err());
    }
}
