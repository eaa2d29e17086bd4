//! Shared plumbing for the hosted backend (auth + REST).

use reqwest::{Client, RequestBuilder, Response};
use url::Url;

use crate::error::{CoreError, Result};
use crate::storage::BackendConfig;

/// Base URL, public key and a pooled HTTP client.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base: Url,
    anon_key: String,
    http: Client,
}

impl BackendClient {
    pub fn new(base_url: &str, anon_key: &str) -> Result<Self> {
        if base_url.trim().is_empty() {
            return Err(CoreError::Custom(
                "backend.url is not configured (skillos-cli config set backend.url <url>)".into(),
            ));
        }
        let base = Url::parse(base_url)
            .map_err(|e| CoreError::Custom(format!("invalid backend url '{base_url}': {e}")))?;
        Ok(Self {
            base,
            anon_key: anon_key.to_string(),
            http: Client::new(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        Self::new(&config.url, &config.anon_key)
    }

    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| CoreError::Custom(format!("invalid endpoint '{path}': {e}")))
    }

    /// Request authorized with the anon key.
    pub fn request(&self, method: reqwest::Method, url: Url) -> RequestBuilder {
        self.request_as(method, url, &self.anon_key)
    }

    /// Request with the `apikey` header set and `token` as the bearer
    /// (a user access token or the service key).
    pub fn request_as(&self, method: reqwest::Method, url: Url, token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    pub fn http(&self) -> &Client {
        &self.http
    }
}

/// Send and map transport failures to `CoreError::Network`.
pub async fn send(service: &str, request: RequestBuilder) -> Result<Response> {
    request.send().await.map_err(|e| {
        tracing::warn!(service, "request failed: {e}");
        CoreError::network(service, e.to_string())
    })
}

/// Pull a human-readable message out of an error body.
pub fn error_message(body: &serde_json::Value) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|k| body.get(*k).and_then(|v| v.as_str()).map(str::to_string))
}

/// Read a JSON body, failing with the upstream message on non-2xx.
pub async fn json_or_error(service: &str, resp: Response) -> Result<serde_json::Value> {
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    if status.is_success() {
        return Ok(body);
    }
    let message = error_message(&body).unwrap_or_else(|| format!("HTTP {status}"));
    Err(CoreError::network(service, message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_missing_url() {
        assert!(BackendClient::new("", "key").is_err());
        assert!(BackendClient::new("not a url", "key").is_err());
    }

    #[test]
    fn joins_endpoints() {
        let client = BackendClient::new("https://demo.supabase.co", "anon").unwrap();
        assert_eq!(
            client.endpoint("/auth/v1/otp").unwrap().as_str(),
            "https://demo.supabase.co/auth/v1/otp"
        );
    }

    #[test]
    fn picks_error_message_fields() {
        assert_eq!(
            error_message(&json!({"error_description": "Invalid login credentials"})).as_deref(),
            Some("Invalid login credentials")
        );
        assert_eq!(
            error_message(&json!({"msg": "Rate limit exceeded"})).as_deref(),
            Some("Rate limit exceeded")
        );
        assert!(error_message(&json!({"code": 1})).is_none());
    }

    #[test]
    fn service_name_is_reported() {
        let err = CoreError::network("backend", "down");
        assert_eq!(err.to_string(), "Network error for 'backend': down");
    }
}
