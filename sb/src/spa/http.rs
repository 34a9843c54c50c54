//! HTTP long-poll SPA implementation
//!
//! The reference adapter for services reachable over plain HTTP: `connect`
//! posts the stored credentials, then a spawned task long-polls the events
//! endpoint and feeds inbound notifications into the instance's broadcast
//! channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{Spa, SpaError, SpaEvent};
use crate::session::Session;

/// Capacity of the per-instance event channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// HTTP client timeout; long-poll requests are held up to this long
const REQUEST_TIMEOUT: Duration = Duration::from_secs(45);

/// Initial backoff after a failed poll
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Backoff ceiling
const MAX_BACKOFF_MS: u64 = 30_000;

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// Response body of a successful connect
#[derive(Debug, Deserialize)]
struct ConnectResponse {
    #[serde(default)]
    capabilities: Vec<String>,

    #[serde(default = "default_username_field")]
    username_field: String,

    /// Opaque token identifying this connection on the events endpoint
    token: String,
}

fn default_username_field() -> String {
    "username".to_string()
}

/// Adapter speaking JSON-over-HTTP with long-polled events
pub struct HttpSpa {
    name: String,
    base_url: String,
    http: Client,
    connected: Arc<AtomicBool>,
    capabilities: Vec<String>,
    username_field: String,
    events_tx: broadcast::Sender<SpaEvent>,
    poll_task: Option<tokio::task::JoinHandle<()>>,
}

impl HttpSpa {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Result<Self, SpaError> {
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SpaError::Network)?;
        Ok(Self {
            name: name.into(),
            base_url: base_url.into(),
            http,
            connected: Arc::new(AtomicBool::new(false)),
            capabilities: Vec::new(),
            username_field: default_username_field(),
            events_tx,
            poll_task: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Spa for HttpSpa {
    async fn connect(&mut self, credentials: &serde_json::Value) -> Result<(), SpaError> {
        debug!(spa = %self.name, "HttpSpa::connect");
        let response = self
            .http
            .post(format!("{}/connect", self.base_url))
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpaError::ConnectFailed(format!("HTTP {}", status.as_u16())));
        }

        let body: ConnectResponse = response.json().await?;
        self.capabilities = body.capabilities;
        self.username_field = body.username_field;
        self.connected.store(true, Ordering::SeqCst);

        self.poll_task = Some(tokio::spawn(poll_events(
            self.http.clone(),
            self.base_url.clone(),
            body.token,
            self.events_tx.clone(),
            self.connected.clone(),
            self.name.clone(),
        )));

        Ok(())
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    fn username_field_key(&self) -> &str {
        &self.username_field
    }

    fn subscribe(&self) -> broadcast::Receiver<SpaEvent> {
        self.events_tx.subscribe()
    }

    async fn announce(&self, session: &Session) -> Result<(), SpaError> {
        if !self.connected() {
            return Err(SpaError::NotConnected);
        }

        let response = self
            .http
            .post(format!("{}/presence", self.base_url))
            .json(session)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpaError::Api {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

impl Drop for HttpSpa {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

/// Long-poll loop: each successful response carries a (possibly empty)
/// batch of events and is immediately followed by the next request.
async fn poll_events(
    http: Client,
    base_url: String,
    token: String,
    events_tx: broadcast::Sender<SpaEvent>,
    connected: Arc<AtomicBool>,
    name: String,
) {
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    loop {
        let result = http
            .get(format!("{}/events", base_url))
            .query(&[("token", token.as_str())])
            .send()
            .await;

        match result {
            Ok(response) if response.status().as_u16() == 410 => {
                // The service dropped this connection for good
                debug!(spa = %name, "Events endpoint gone, stopping poll");
                break;
            }
            Ok(response) if response.status().is_success() => {
                backoff_ms = INITIAL_BACKOFF_MS;
                match response.json::<Vec<SpaEvent>>().await {
                    Ok(events) => {
                        for event in events {
                            let _ = events_tx.send(event);
                        }
                    }
                    Err(e) => warn!(spa = %name, error = %e, "Failed to parse events"),
                }
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(spa = %name, status, "Events poll failed");
                if !is_retryable_status(status) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
            Err(e) => {
                warn!(spa = %name, error = %e, "Events poll error");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
        }
    }

    connected.store(false, Ordering::SeqCst);
    let _ = events_tx.send(SpaEvent::Disconnected);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable_status() {
        assert!(is_retryable_status(429));
        assert!(is_retryable_status(503));
        assert!(!is_retryable_status(401));
        assert!(!is_retryable_status(410));
    }

    #[test]
    fn test_connect_response_defaults() {
        let body: ConnectResponse = serde_json::from_str(r#"{"token": "t"}"#).unwrap();
        assert!(body.capabilities.is_empty());
        assert_eq!(body.username_field, "username");
        assert_eq!(body.token, "t");
    }

    #[test]
    fn test_new_spa_starts_disconnected() {
        let spa = HttpSpa::new("talkie", "https://talkie.example").unwrap();
        assert!(!spa.connected());
        assert!(spa.capabilities().is_empty());
        assert_eq!(spa.username_field_key(), "username");
    }
}
