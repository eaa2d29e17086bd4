//! Read access to the user's learning logs and the knowledge-graph view.
//!
//! Storage and similarity ranking live in the hosted database. This module
//! only fetches rows and shapes them for display.

use chrono::{DateTime, Utc};
use rand::Rng;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::{self, BackendClient};
use crate::error::{CoreError, Result};

const SERVICE: &str = "knowledge";

pub const DEFAULT_RECENT_LIMIT: usize = 50;
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MATCH_COUNT: usize = 10;

const TOOLTIP_CHARS: usize = 50;
const LINK_PROBABILITY: f64 = 0.3;

/// One row of `learning_logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchMatch {
    pub id: String,
    pub content: String,
    pub similarity: f32,
}

impl SearchMatch {
    /// e.g. `87% Match`
    pub fn label(&self) -> String {
        format!("{:.0}% Match", self.similarity * 100.0)
    }
}

#[derive(Debug, Clone)]
pub struct KnowledgeStore {
    backend: BackendClient,
    access_token: Option<String>,
}

impl KnowledgeStore {
    /// Without an access token requests go out with the anon key and row
    /// level security decides what comes back.
    pub fn new(backend: BackendClient, access_token: Option<String>) -> Self {
        Self {
            backend,
            access_token,
        }
    }

    fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.backend.endpoint(path)?;
        Ok(match &self.access_token {
            Some(token) => self.backend.request_as(method, url, token),
            None => self.backend.request(method, url),
        })
    }

    /// Most recent logs first.
    pub async fn recent_logs(&self, limit: usize) -> Result<Vec<LogRecord>> {
        let path = format!(
            "/rest/v1/learning_logs?select=id,content,created_at&order=created_at.desc&limit={limit}"
        );
        let resp = backend::send(SERVICE, self.request(Method::GET, &path)?).await?;
        let body = backend::json_or_error(SERVICE, resp).await?;
        let logs: Vec<LogRecord> = serde_json::from_value(body)
            .map_err(|e| CoreError::network(SERVICE, format!("unexpected log payload: {e}")))?;
        tracing::debug!(count = logs.len(), "fetched learning logs");
        Ok(logs)
    }

    /// Similarity search, ranked by the database.
    pub async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        count: usize,
    ) -> Result<Vec<SearchMatch>> {
        let request = self
            .request(Method::POST, "/rest/v1/rpc/match_learning_logs")?
            .json(&json!({
                "query_embedding": query_embedding,
                "match_threshold": threshold,
                "match_count": count,
            }));
        let resp = backend::send(SERVICE, request).await?;
        let body = backend::json_or_error(SERVICE, resp).await?;
        serde_json::from_value(body)
            .map_err(|e| CoreError::network(SERVICE, format!("unexpected match payload: {e}")))
    }
}

// ── Graph view ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub name: String,
    pub group: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphLink {
    pub source: String,
    pub target: String,
    pub value: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeGraph {
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
}

impl KnowledgeGraph {
    /// One node per log. Adjacent logs are linked at random, so the
    /// caller supplies the RNG.
    pub fn from_logs<R: Rng>(logs: &[LogRecord], rng: &mut R) -> Self {
        let nodes: Vec<GraphNode> = logs
            .iter()
            .map(|log| GraphNode {
                id: log.id.clone(),
                name: tooltip(&log.content),
                group: 1,
            })
            .collect();

        let links = nodes
            .windows(2)
            .filter(|_| rng.gen::<f64>() < LINK_PROBABILITY)
            .map(|pair| GraphLink {
                source: pair[0].id.clone(),
                target: pair[1].id.clone(),
                value: 1,
            })
            .collect();

        Self { nodes, links }
    }
}

fn tooltip(content: &str) -> String {
    let head: String = content.chars().take(TOOLTIP_CHARS).collect();
    format!("{head}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64;

    fn log(id: &str, content: &str) -> LogRecord {
        LogRecord {
            id: id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn tooltip_truncates_on_chars() {
        let long = "é".repeat(80);
        let tip = tooltip(&long);
        assert_eq!(tip.chars().count(), TOOLTIP_CHARS + 3);
        assert!(tip.ends_with("..."));
        assert_eq!(tooltip("short"), "short...");
    }

    #[test]
    fn graph_links_only_adjacent_nodes() {
        let logs: Vec<_> = (0..200).map(|i| log(&i.to_string(), "note")).collect();
        let mut rng = Pcg64::seed_from_u64(7);
        let graph = KnowledgeGraph::from_logs(&logs, &mut rng);

        assert_eq!(graph.nodes.len(), 200);
        assert!(graph.nodes.iter().all(|n| n.group == 1));
        for link in &graph.links {
            let s: usize = link.source.parse().unwrap();
            let t: usize = link.target.parse().unwrap();
            assert_eq!(t, s + 1);
            assert_eq!(link.value, 1);
        }
        // 199 candidate pairs at p = 0.3
        assert!(graph.links.len() > 30 && graph.links.len() < 90);
    }

    #[test]
    fn graph_is_deterministic_for_a_seed() {
        let logs: Vec<_> = (0..20).map(|i| log(&i.to_string(), "x")).collect();
        let a = KnowledgeGraph::from_logs(&logs, &mut Pcg64::seed_from_u64(1));
        let b = KnowledgeGraph::from_logs(&logs, &mut Pcg64::seed_from_u64(1));
        assert_eq!(a, b);
    }

    #[test]
    fn empty_and_single_logs_have_no_links() {
        let mut rng = Pcg64::seed_from_u64(0);
        assert_eq!(KnowledgeGraph::from_logs(&[], &mut rng), KnowledgeGraph::default());
        let one = KnowledgeGraph::from_logs(&[log("a", "b")], &mut rng);
        assert_eq!(one.nodes.len(), 1);
        assert!(one.links.is_empty());
    }

    #[test]
    fn match_label_rounds_percent() {
        let m = SearchMatch {
            id: "1".into(),
            content: "c".into(),
            similarity: 0.873,
        };
        assert_eq!(m.label(), "87% Match");
    }

    #[tokio::test]
    async fn recent_logs_queries_by_recency() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/learning_logs")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("select".into(), "id,content,created_at".into()),
                mockito::Matcher::UrlEncoded("order".into(), "created_at.desc".into()),
                mockito::Matcher::UrlEncoded("limit".into(), "2".into()),
            ]))
            .match_header("authorization", "Bearer user-token")
            .with_status(200)
            .with_body(
                r#"[{"id":"b","content":"newer","created_at":"2024-05-02T10:00:00Z"},
                    {"id":"a","content":"older","created_at":"2024-05-01T10:00:00Z"}]"#,
            )
            .create_async()
            .await;

        let store = KnowledgeStore::new(
            BackendClient::new(&server.url(), "anon").unwrap(),
            Some("user-token".into()),
        );
        let logs = store.recent_logs(2).await.unwrap();
        assert_eq!(logs.iter().map(|l| l.id.as_str()).collect::<Vec<_>>(), ["b", "a"]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn search_posts_embedding_to_rpc() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/rpc/match_learning_logs")
            .match_body(mockito::Matcher::PartialJson(json!({
                "match_threshold": 0.5,
                "match_count": 3,
            })))
            .with_status(200)
            .with_body(r#"[{"id":"a","content":"rust notes","similarity":0.91}]"#)
            .create_async()
            .await;

        let store = KnowledgeStore::new(BackendClient::new(&server.url(), "anon").unwrap(), None);
        let matches = store.search(&[0.1, 0.2], 0.5, 3).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].label(), "91% Match");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn upstream_error_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/rest/v1/learning_logs")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .with_body(r#"{"message":"JWT expired"}"#)
            .create_async()
            .await;

        let store = KnowledgeStore::new(BackendClient::new(&server.url(), "anon").unwrap(), None);
        let err = store.recent_logs(10).await.unwrap_err();
        assert_eq!(err.to_string(), "Network error for 'knowledge': JWT expired");
    }
}
