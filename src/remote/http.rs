use futures_util::future::{BoxFuture, FutureExt};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;

use super::{Method, RemoteError, RemoteRequest, TrackerApi, parse_retry_after};
use crate::auth::Credential;
use crate::redact::redact;

pub const API_VERSION: &str = "7.1";

const MAX_ERROR_MESSAGE_CHARS: usize = 500;

/// [`TrackerApi`] over HTTPS with `reqwest`.
pub struct HttpTrackerApi {
    base_url: String,
    client: Client,
}

impl HttpTrackerApi {
    /// `org_url` is the organization root, e.g. `https://dev.azure.com/acme`.
    pub fn new(org_url: &str) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("sprintgate/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(org_url, client))
    }

    pub fn with_client(org_url: &str, client: Client) -> Self {
        Self {
            base_url: org_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(
        &self,
        credential: &Credential,
        request: RemoteRequest,
    ) -> Result<Value, RemoteError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Patch => self.client.patch(&url),
        };

        let mut query = request.query;
        if !query.iter().any(|(k, _)| k == "api-version") {
            query.push(("api-version".to_string(), API_VERSION.to_string()));
        }
        builder = builder
            .query(&query)
            .header(AUTHORIZATION, credential.expose());

        if let Some(body) = &request.body {
            let content_type = if request.json_patch {
                "application/json-patch+json"
            } else {
                "application/json"
            };
            let payload = serde_json::to_vec(body).map_err(|e| RemoteError::InvalidResponse {
                message: format!("could not encode request body: {e}"),
            })?;
            builder = builder.header(CONTENT_TYPE, content_type).body(payload);
        }

        debug!(method = request.method.as_str(), path = %request.path, "remote request");
        let response = builder.send().await?;
        Self::handle_response(response).await
    }

    async fn handle_response(response: Response) -> Result<Value, RemoteError> {
        let status = response.status();
        if status.is_success() {
            let bytes = response.bytes().await?;
            if bytes.is_empty() {
                return Ok(Value::Null);
            }
            return serde_json::from_slice(&bytes).map_err(|e| RemoteError::InvalidResponse {
                message: e.to_string(),
            });
        }

        let retry_after = parse_retry_after(
            response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok()),
        );
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(RemoteError::Status {
            status: status.as_u16(),
            message: error_message(&text, status.canonical_reason()),
            retry_after,
        })
    }
}

impl TrackerApi for HttpTrackerApi {
    fn send<'a>(
        &'a self,
        credential: &'a Credential,
        request: RemoteRequest,
    ) -> BoxFuture<'a, Result<Value, RemoteError>> {
        self.execute(credential, request).boxed()
    }
}

/// Pull the `message` field out of an error body, falling back to the raw
/// text. Always redacted and bounded.
fn error_message(body: &str, reason: Option<&str>) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());
    let message = if message.is_empty() {
        reason.unwrap_or("Unknown error").to_string()
    } else {
        message
    };
    redact(&message)
        .chars()
        .take(MAX_ERROR_MESSAGE_CHARS)
        .collect()
}
