//! HTTP Transport (C9): a thin wrapper around `reqwest` that gives the
//! orchestrator exactly what it needs per attempt — a deadline, the raw
//! status and body, and a clean distinction between "the request never
//! reached the server" and "the server answered with an error status".

use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

const MAX_REDIRECTS: usize = 5;

/// Outcome of one POST attempt, already drained into memory.
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
    /// Parsed `Retry-After` header, in seconds, when present.
    pub retry_after: Option<Duration>,
}

/// Distinguishes "we never got a response" from "we got one we didn't like".
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("response body was not valid JSON: {0}")]
    InvalidJson(#[source] reqwest::Error),
}

/// Builds the shared `reqwest::Client` used for both chat and
/// model-catalog requests, with a bounded redirect policy.
pub fn build_client() -> reqwest::Result<Client> {
    Client::builder().redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS)).build()
}

/// POST `body` to `url` with `headers`, bounded by `timeout`. Returns the
/// raw status and decoded JSON body; never inspects the status itself —
/// classification is the retry executor's job.
pub async fn post_json(
    client: &Client,
    url: &str,
    headers: &[(String, String)],
    body: &Value,
    timeout: Duration,
) -> Result<TransportResponse, TransportError> {
    let mut request = client.post(url).json(body).timeout(timeout);
    for (name, value) in headers {
        request = request.header(name, value);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) if err.is_timeout() => return Err(TransportError::Timeout(timeout)),
        Err(err) => return Err(TransportError::Transport(err)),
    };

    decode(response).await
}

async fn decode(response: Response) -> Result<TransportResponse, TransportError> {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.json::<Value>().await.map_err(TransportError::InvalidJson)?;
    Ok(TransportResponse { status, body, retry_after })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn post_json_decodes_a_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let response =
            post_json(&client, &format!("{}/chat", server.uri()), &[], &serde_json::json!({}), Duration::from_secs(5))
                .await
                .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn post_json_surfaces_non_2xx_status_without_erroring() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({"error": "busy"})))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let response =
            post_json(&client, &format!("{}/chat", server.uri()), &[], &serde_json::json!({}), Duration::from_secs(5))
                .await
                .unwrap();

        assert_eq!(response.status, 503);
    }
}
