//! HTTP delivery processor
//!
//! Posts payloads as JSON to a single endpoint. In batch mode the whole batch
//! is posted as one JSON array and the response status applies to every
//! message in it.

use crate::processor::error::{ProcessorError, ProcessorResult};
use crate::processor::result::{BatchProcessingResult, ProcessingResult};
use crate::processor::traits::DeliveryProcessor;
use crate::queue::config::duration_ms;
use crate::queue::message::{MessageId, QueuedMessage};
use crate::recovery::api::Fault;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Duration;
use tokio::time::Instant;

/// Status codes worth retrying: server errors, throttling and request timeout
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500..=599)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpDeliveryConfig {
    pub endpoint: String,
    pub bearer_token: Option<String>,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    pub batch_mode: bool,
    /// Metadata keys a message must carry to be delivered
    pub required_metadata: Vec<String>,
}

impl Default for HttpDeliveryConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080/ingest".to_string(),
            bearer_token: None,
            timeout: Duration::from_secs(10),
            batch_mode: false,
            required_metadata: Vec::new(),
        }
    }
}

pub struct HttpDeliveryProcessor<T> {
    config: HttpDeliveryConfig,
    client: reqwest::Client,
    _payload: PhantomData<fn(&T)>,
}

impl<T> HttpDeliveryProcessor<T> {
    pub fn new(config: HttpDeliveryConfig) -> ProcessorResult<Self> {
        if !config.endpoint.starts_with("http://") && !config.endpoint.starts_with("https://") {
            return Err(ProcessorError::InvalidEndpoint {
                endpoint: config.endpoint.clone(),
                reason: "only http:// and https:// endpoints are supported".to_string(),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProcessorError::ClientBuild {
                message: e.to_string(),
            })?;

        Ok(Self {
            config,
            client,
            _payload: PhantomData,
        })
    }

    pub fn config(&self) -> &HttpDeliveryConfig {
        &self.config
    }

    async fn post<B: Serialize + ?Sized>(&self, body: &B) -> ProcessingResult {
        let started = Instant::now();
        let body = match serde_json::to_vec(body) {
            Ok(body) => body,
            Err(e) => {
                return ProcessingResult::permanent_failure(
                    format!("Failed to serialize payload: {}", e),
                    started.elapsed(),
                )
            }
        };

        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.config.bearer_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                ProcessingResult::success(started.elapsed())
            }
            Ok(response) => {
                let status = response.status();
                let error = format!(
                    "HTTP {} - {}",
                    status.as_u16(),
                    status.canonical_reason().unwrap_or("Unknown error")
                );
                if is_retryable_status(status.as_u16()) {
                    ProcessingResult::retryable_failure(error, started.elapsed())
                } else {
                    ProcessingResult::permanent_failure(error, started.elapsed())
                }
            }
            Err(e) => {
                let fault = Fault::from(&e);
                log::debug!("Delivery to {} failed: {}", self.config.endpoint, fault);
                if fault.is_transient() {
                    ProcessingResult::retryable_failure(fault.to_string(), started.elapsed())
                } else {
                    ProcessingResult::permanent_failure(fault.to_string(), started.elapsed())
                }
            }
        }
    }
}

#[async_trait]
impl<T> DeliveryProcessor<T> for HttpDeliveryProcessor<T>
where
    T: Serialize + Send + Sync,
{
    fn name(&self) -> &str {
        "http"
    }

    fn supports_batch(&self) -> bool {
        self.config.batch_mode
    }

    fn can_process(&self, message: &QueuedMessage<T>) -> bool {
        self.config
            .required_metadata
            .iter()
            .all(|key| message.metadata.contains_key(key))
    }

    async fn process(&self, message: &QueuedMessage<T>) -> ProcessingResult {
        self.post(&message.payload).await
    }

    async fn process_batch(&self, messages: &[QueuedMessage<T>]) -> BatchProcessingResult {
        let payloads: Vec<&T> = messages.iter().map(|m| &m.payload).collect();
        let ids: Vec<MessageId> = messages.iter().map(|m| m.id()).collect();
        let result = self.post(&payloads).await;
        BatchProcessingResult::uniform(ids.iter(), result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [408, 429, 500, 502, 503, 599] {
            assert!(is_retryable_status(status), "{}", status);
        }
        for status in [200, 400, 401, 403, 404, 422] {
            assert!(!is_retryable_status(status), "{}", status);
        }
    }

    #[test]
    fn test_retryable_status_agrees_with_fault_classification() {
        for status in 400..600u16 {
            assert_eq!(
                is_retryable_status(status),
                Fault::from_status(status, "").is_transient(),
                "{}",
                status
            );
        }
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let config = HttpDeliveryConfig {
            endpoint: "ftp://example.com".to_string(),
            ..HttpDeliveryConfig::default()
        };
        match HttpDeliveryProcessor::<String>::new(config) {
            Err(ProcessorError::InvalidEndpoint { endpoint, .. }) => {
                assert_eq!(endpoint, "ftp://example.com")
            }
            Err(other) => panic!("Expected InvalidEndpoint, got {:?}", other),
            Ok(_) => panic!("Expected InvalidEndpoint"),
        }
    }

    #[test]
    fn test_required_metadata_gates_can_process() {
        let processor = HttpDeliveryProcessor::<String>::new(HttpDeliveryConfig {
            required_metadata: vec!["device".to_string()],
            ..HttpDeliveryConfig::default()
        })
        .unwrap();

        let bare = QueuedMessage::new("reading".to_string());
        let tagged = QueuedMessage::new("reading".to_string()).with_metadata("device", "scale-1");
        assert!(!processor.can_process(&bare));
        assert!(processor.can_process(&tagged));
    }

    #[test]
    fn test_config_from_toml() {
        let config: HttpDeliveryConfig = toml::from_str(
            r#"
            endpoint = "https://collector.example/ingest"
            timeout_ms = 2500
            batch_mode = true
            "#,
        )
        .unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(config.batch_mode);
        assert!(config.bearer_token.is_none());
    }
}
