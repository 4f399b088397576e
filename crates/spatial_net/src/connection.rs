//! NATS connection management.
//!
//! Provides a thin wrapper around `async-nats` for connecting to NATS with
//! balancer-specific defaults.

use tracing::{debug, info};

use crate::error::NetError;
use crate::messages::{WorldCommand, headers};
use crate::subjects;

/// Default NATS server URL.
pub const DEFAULT_NATS_URL: &str = "nats://localhost:4222";

/// The environment variable used to override the NATS URL.
pub const NATS_URL_ENV: &str = "NATS_URL";

/// Resolve the NATS URL: an explicit value wins, then `NATS_URL`, then
/// [`DEFAULT_NATS_URL`].
#[must_use]
pub fn resolve_url(explicit: Option<&str>) -> String {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(NATS_URL_ENV).ok())
        .unwrap_or_else(|| DEFAULT_NATS_URL.to_string())
}

/// A wrapper around an `async-nats` client with transport helpers.
#[derive(Debug, Clone)]
pub struct NatsConnection {
    /// The underlying NATS client.
    client: async_nats::Client,
}

impl NatsConnection {
    /// Connect to NATS at the specified URL.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Connect`] if the connection cannot be established.
    pub async fn connect_to(url: &str) -> Result<Self, NetError> {
        info!(url, "connecting to NATS");
        let client = async_nats::connect(url).await?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    /// Publish a MessagePack-encoded message with NATS headers.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding or publishing fails.
    pub async fn publish_with_headers<T: serde::Serialize>(
        &self,
        subject: &str,
        headers: async_nats::HeaderMap,
        message: &T,
    ) -> Result<(), NetError> {
        let payload = crate::codec::encode(message)?;
        self.client
            .publish_with_headers(subject.to_string(), headers, payload.into())
            .await?;
        Ok(())
    }

    /// Send a command to the transport on behalf of `worker_id`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError`] if encoding or publishing fails.
    pub async fn send_command(
        &self,
        worker_id: &str,
        command: &WorldCommand,
    ) -> Result<(), NetError> {
        let mut map = async_nats::HeaderMap::new();
        map.insert(headers::MSG_TYPE, command.msg_type());
        map.insert(headers::WORKER_ID, worker_id);
        debug!(worker_id, msg_type = command.msg_type(), "sending command");
        self.publish_with_headers(&subjects::commands(worker_id), map, command)
            .await
    }

    /// Subscribe to a subject.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Subscribe`] if the subscription fails.
    pub async fn subscribe(&self, subject: &str) -> Result<async_nats::Subscriber, NetError> {
        let sub = self.client.subscribe(subject.to_string()).await?;
        Ok(sub)
    }

    /// Flush buffered publishes to the server.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::Flush`] if the flush fails.
    pub async fn flush(&self) -> Result<(), NetError> {
        self.client
            .flush()
            .await
            .map_err(|e| NetError::Flush(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_url_wins() {
        assert_eq!(resolve_url(Some("nats://example:4222")), "nats://example:4222");
    }
}
