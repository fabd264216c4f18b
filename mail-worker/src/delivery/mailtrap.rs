//! Mailtrap sending API client.
//!
//! Reference: <https://api-docs.mailtrap.io/docs/mailtrap-api-docs/67f1d70aeb62c-send-email-including-templates>

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{DeliveryClient, DeliveryError};
use crate::config::Config;

/// Production send endpoint.
pub const MAILTRAP_SEND_URL: &str = "https://send.api.mailtrap.io/api/send";

/// Longest provider error body kept in a [`DeliveryError`].
const MAX_ERROR_BODY_CHARS: usize = 500;

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

/// Body of `POST /api/send`.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    from: Address<'a>,
    to: Vec<Address<'a>>,
    subject: &'a str,
    text: &'a str,
    category: &'a str,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    success: bool,
    #[serde(default)]
    message_ids: Vec<String>,
    #[serde(default)]
    errors: Vec<String>,
}

/// Sends plain-text mail through Mailtrap with a bearer token.
#[derive(Debug, Clone)]
pub struct MailtrapClient {
    http: Client,
    endpoint: String,
    api_key: String,
    sender_email: String,
}

impl MailtrapClient {
    /// Build a client from the Mailtrap settings in `config`.
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to create HTTP client")?;

        if !config.mailtrap_configured() {
            warn!(
                has_sender_email = !config.mailtrap_sender_email.is_empty(),
                has_api_key = !config.mailtrap_api_key.is_empty(),
                "mailtrap_not_configured"
            );
        }

        Ok(Self {
            http,
            endpoint: config.mailtrap_api_url.clone(),
            api_key: config.mailtrap_api_key.clone(),
            sender_email: config.mailtrap_sender_email.clone(),
        })
    }

    /// Build the provider request for one email.
    ///
    /// The sender display name is the message subject.
    fn build_request<'a>(
        &'a self,
        recipient: &'a str,
        subject: &'a str,
        body: &'a str,
        category: &'a str,
    ) -> SendRequest<'a> {
        SendRequest {
            from: Address {
                email: &self.sender_email,
                name: Some(subject),
            },
            to: vec![Address {
                email: recipient,
                name: None,
            }],
            subject,
            text: body,
            category,
        }
    }
}

#[async_trait]
impl DeliveryClient for MailtrapClient {
    async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        category: &str,
    ) -> Result<(), DeliveryError> {
        let request = self.build_request(recipient, subject, body, category);

        info!(
            recipient = %recipient,
            category = %category,
            body_length = body.len(),
            "mailtrap_send_starting"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        match serde_json::from_str::<SendResponse>(&text) {
            Ok(parsed) if !parsed.success => {
                Err(DeliveryError::Unsuccessful(parsed.errors.join("; ")))
            }
            Ok(parsed) => {
                info!(
                    recipient = %recipient,
                    status_code = status.as_u16(),
                    message_ids = ?parsed.message_ids,
                    "mailtrap_send_complete"
                );
                Ok(())
            }
            Err(e) => {
                // A 2xx without the documented body still counts as sent
                warn!(
                    recipient = %recipient,
                    status_code = status.as_u16(),
                    error = %e,
                    "mailtrap_response_unparsed"
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    fn test_config(endpoint: &str) -> Config {
        let endpoint = endpoint.to_string();
        Config::from_lookup(move |name| match name {
            "MAIL_SERVICE_MAILTRAP_EMAIL" => Some("noreply@example.com".to_string()),
            "MAIL_SERVICE_MAILTRAP_API_KEY" => Some("test-token".to_string()),
            "MAIL_SERVICE_MAILTRAP_API_URL" => Some(endpoint.clone()),
            "MAIL_SERVICE_REQUEST_TIMEOUT_MS" => Some("5000".to_string()),
            _ => None,
        })
    }

    /// Start a fake provider that records requests and answers with `status`/`body`.
    async fn spawn_provider(status: StatusCode, body: &'static str) -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&captured);

        let app = Router::new().route(
            "/api/send",
            post(move |headers: HeaderMap, Json(payload): Json<Value>| {
                let recorder = Arc::clone(&recorder);
                async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string());
                    recorder.lock().unwrap().push((auth, payload));
                    (status, body)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/api/send"), captured)
    }

    #[test]
    fn test_build_request_shape() {
        let client = MailtrapClient::new(&test_config(MAILTRAP_SEND_URL)).unwrap();

        let request = client.build_request(
            "a@example.com",
            "Confirm",
            "Click here",
            "EMAIL_CONFIRMATION",
        );
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            json!({
                "from": {"email": "noreply@example.com", "name": "Confirm"},
                "to": [{"email": "a@example.com"}],
                "subject": "Confirm",
                "text": "Click here",
                "category": "EMAIL_CONFIRMATION"
            })
        );
    }

    #[tokio::test]
    async fn test_send_success() {
        let (endpoint, captured) =
            spawn_provider(StatusCode::OK, r#"{"success":true,"message_ids":["abc"]}"#).await;
        let client = MailtrapClient::new(&test_config(&endpoint)).unwrap();

        client
            .send("a@example.com", "Confirm", "Click here", "EMAIL_CONFIRMATION")
            .await
            .unwrap();

        let requests = captured.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (auth, payload) = &requests[0];
        assert_eq!(auth.as_deref(), Some("Bearer test-token"));
        assert_eq!(payload["to"][0]["email"], "a@example.com");
        assert_eq!(payload["from"]["name"], "Confirm");
        assert_eq!(payload["category"], "EMAIL_CONFIRMATION");
    }

    #[tokio::test]
    async fn test_send_rejected_status() {
        let (endpoint, captured) =
            spawn_provider(StatusCode::UNAUTHORIZED, r#"{"errors":["Unauthorized"]}"#).await;
        let client = MailtrapClient::new(&test_config(&endpoint)).unwrap();

        let err = client
            .send("a@example.com", "Hi", "x", "PASSWORD_RESET")
            .await
            .unwrap_err();

        match err {
            DeliveryError::Rejected { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Unauthorized"));
            }
            other => panic!("expected Rejected, got {other:?}"),
        }
        assert_eq!(captured.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_send_unsuccessful_body() {
        let (endpoint, _captured) =
            spawn_provider(StatusCode::OK, r#"{"success":false,"errors":["bad sender"]}"#).await;
        let client = MailtrapClient::new(&test_config(&endpoint)).unwrap();

        let err = client
            .send("a@example.com", "Hi", "x", "PASSWORD_RESET")
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Unsuccessful(ref msg) if msg == "bad sender"));
    }

    #[tokio::test]
    async fn test_send_transport_failure() {
        let client = MailtrapClient::new(&test_config("http://127.0.0.1:1/api/send")).unwrap();

        let err = client
            .send("a@example.com", "Hi", "x", "PASSWORD_RESET")
            .await
            .unwrap_err();

        assert!(matches!(err, DeliveryError::Transport(_)));
    }
}
