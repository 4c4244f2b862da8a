// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP client for the LogStream collector.
//!
//! Every call is scoped by the automation id:
//!
//! - `POST {base}/logs/{id}/clear` drops the backlog of a previous run
//! - `POST {base}/logs/{id}?log_content=..&automation_id=..` ships one line
//! - `POST {base}/batch/{id}` ships a JSON batch `{"logs": [..], "automation_id": ".."}`
//!
//! Failures are returned as [`TransmissionError`]; the caller decides whether
//! to log and move on. Nothing here retries.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error};

use crate::config::LogStreamConfig;
use crate::error::TransmissionError;

#[derive(Debug, Serialize)]
struct BatchPayload<'a> {
    logs: &'a [String],
    automation_id: &'a str,
}

/// Collector endpoints bound to one automation id. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CollectorClient {
    client: reqwest::Client,
    base_url: String,
    automation_id: String,
}

impl CollectorClient {
    #[must_use]
    pub fn new(config: &LogStreamConfig) -> Self {
        Self {
            client: get_client(config.request_timeout),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            automation_id: config.identity.automation_id().to_string(),
        }
    }

    /// Tells the collector to forget lines received for this automation so far.
    pub async fn clear_buffer(&self) -> Result<(), TransmissionError> {
        let url = format!("{}/logs/{}/clear", self.base_url, self.automation_id);
        debug!("LOGSTREAM | Clearing collector backlog");
        let resp = self.client.post(&url).send().await?;
        check_status(resp).await
    }

    /// Ships a single line.
    pub async fn send_log(&self, line: &str) -> Result<(), TransmissionError> {
        let url = format!("{}/logs/{}", self.base_url, self.automation_id);
        let resp = self
            .client
            .post(&url)
            .query(&[
                ("log_content", line),
                ("automation_id", self.automation_id.as_str()),
            ])
            .send()
            .await?;
        check_status(resp).await
    }

    /// Ships `lines` as one request, preserving their order.
    pub async fn send_batch(&self, lines: &[String]) -> Result<(), TransmissionError> {
        let url = format!("{}/batch/{}", self.base_url, self.automation_id);
        let payload = BatchPayload {
            logs: lines,
            automation_id: &self.automation_id,
        };
        let resp = self.client.post(&url).json(&payload).send().await?;
        check_status(resp).await
    }
}

async fn check_status(resp: reqwest::Response) -> Result<(), TransmissionError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    // Only read the body on failure
    let body = resp.text().await.unwrap_or_default();
    Err(TransmissionError::Status { status, body })
}

/// Builds the shared HTTP client, falling back to reqwest defaults if the
/// tuned builder fails.
fn get_client(timeout: Duration) -> reqwest::Client {
    let built = reqwest::Client::builder()
        .timeout(timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)))
        .build();

    match built {
        Ok(client) => client,
        Err(e) => {
            error!("LOGSTREAM | Failed to build HTTP client: {e}, using reqwest defaults");
            reqwest::Client::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AutomationIdentity;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client_for(url: &str) -> CollectorClient {
        let identity = AutomationIdentity::new("auto-1", "Billing").unwrap();
        let config = LogStreamConfig::new(identity, "/tmp/unused.log")
            .with_api_url(format!("{url}/"))
            .with_request_timeout(Duration::from_secs(2));
        CollectorClient::new(&config)
    }

    #[tokio::test]
    async fn test_clear_buffer_posts_to_clear_endpoint() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/logs/auto-1/clear")
            .with_status(200)
            .create_async()
            .await;

        client_for(&server.url()).clear_buffer().await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_log_uses_query_parameters() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/logs/auto-1")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("log_content".into(), "disk 90% full".into()),
                Matcher::UrlEncoded("automation_id".into(), "auto-1".into()),
            ]))
            .with_status(200)
            .create_async()
            .await;

        client_for(&server.url())
            .send_log("disk 90% full")
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_send_batch_posts_json_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/batch/auto-1")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({
                "logs": ["first", "second"],
                "automation_id": "auto-1",
            })))
            .with_status(202)
            .create_async()
            .await;

        client_for(&server.url())
            .send_batch(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_reported() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/batch/auto-1")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let err = client_for(&server.url())
            .send_batch(&["line".to_string()])
            .await
            .unwrap_err();
        match err {
            TransmissionError::Status { status, body } => {
                assert_eq!(status, reqwest::StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body, "unavailable");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_a_request_error() {
        // Nothing listens on port 9 (discard) in the test environment
        let err = client_for("http://127.0.0.1:9")
            .clear_buffer()
            .await
            .unwrap_err();
        assert!(matches!(err, TransmissionError::Request(_)));
    }
}
