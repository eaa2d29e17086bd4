//! Embedding generation for learning logs.
//!
//! Vectors come from an OpenAI-compatible `/v1/embeddings` endpoint. When the
//! request names a log, the vector is written back to that row with the
//! backend service key.

use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::task::JoinHandle;

use crate::backend::{self, BackendClient};
use crate::error::EmbeddingError;
use crate::storage::EmbeddingConfig;

type Result<T> = std::result::Result<T, EmbeddingError>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    #[serde(default, rename = "logId", alias = "log_id")]
    pub log_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl EmbeddingRequest {
    pub fn new(log_id: Option<String>, content: impl Into<String>) -> Self {
        Self {
            log_id,
            content: Some(content.into()),
        }
    }

    /// Content to embed, rejecting missing or blank input.
    pub fn content(&self) -> Result<&str> {
        match self.content.as_deref() {
            Some(c) if !c.trim().is_empty() => Ok(c),
            _ => Err(EmbeddingError::MissingContent),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Where to store vectors for requests that carry a `log_id`.
#[derive(Debug, Clone)]
struct WriteBack {
    backend: BackendClient,
    service_key: String,
}

#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    http: Client,
    api_base: String,
    model: String,
    api_key: String,
    write_back: Option<WriteBack>,
}

impl EmbeddingClient {
    pub fn new(api_base: &str, model: &str, api_key: &str) -> Self {
        Self {
            http: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            write_back: None,
        }
    }

    /// Reads the API key from the env var named in the config.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| EmbeddingError::MissingApiKey {
                env_var: config.api_key_env.clone(),
            })?;
        Ok(Self::new(&config.api_base, &config.model, &api_key))
    }

    pub fn with_write_back(mut self, backend: BackendClient, service_key: &str) -> Self {
        self.write_back = Some(WriteBack {
            backend,
            service_key: service_key.to_string(),
        });
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Generate the vector, then store it if the request names a log.
    pub async fn embed(&self, request: &EmbeddingRequest) -> Result<Vec<f32>> {
        let content = request.content()?;
        let embedding = self.generate(content).await?;

        if let Some(log_id) = &request.log_id {
            self.store(log_id, &embedding).await?;
        }
        Ok(embedding)
    }

    async fn generate(&self, content: &str) -> Result<Vec<f32>> {
        let resp = self
            .http
            .post(format!("{}/v1/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": content }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
            let message = body
                .get("error")
                .and_then(backend::error_message)
                .or_else(|| backend::error_message(&body))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(EmbeddingError::Upstream { message });
        }

        let parsed: EmbeddingResponse = resp.json().await?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| EmbeddingError::Upstream {
                message: "embedding response had no data".into(),
            })
    }

    async fn store(&self, log_id: &str, embedding: &[f32]) -> Result<()> {
        let Some(write_back) = &self.write_back else {
            tracing::debug!(log_id, "no write-back target configured; skipping store");
            return Ok(());
        };
        let upstream = |message: String| EmbeddingError::Upstream { message };

        let mut url = write_back
            .backend
            .endpoint("/rest/v1/learning_logs")
            .map_err(|e| upstream(e.to_string()))?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{log_id}"));

        let request = write_back
            .backend
            .request_as(Method::PATCH, url, &write_back.service_key)
            .json(&json!({ "embedding": embedding }));
        let resp = backend::send("embedding", request)
            .await
            .map_err(|e| upstream(e.to_string()))?;
        backend::json_or_error("embedding", resp)
            .await
            .map_err(|e| upstream(e.to_string()))?;
        tracing::debug!(log_id, dims = embedding.len(), "stored embedding");
        Ok(())
    }
}

/// Fire-and-forget: embed in the background and log failures.
pub fn spawn_embedding_job(client: EmbeddingClient, request: EmbeddingRequest) -> JoinHandle<()> {
    tokio::spawn(async move {
        match client.embed(&request).await {
            Ok(v) => tracing::info!(log_id = ?request.log_id, dims = v.len(), "embedding generated"),
            Err(e) => tracing::warn!(log_id = ?request.log_id, "embedding generation failed: {e}"),
        }
    })
}
