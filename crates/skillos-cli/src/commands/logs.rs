use clap::Subcommand;
use rand::rngs::StdRng;
use rand::SeedableRng;
use skillos_core::auth;
use skillos_core::embedding::{spawn_embedding_job, EmbeddingClient, EmbeddingRequest};
use skillos_core::knowledge::{
    KnowledgeGraph, KnowledgeStore, LogRecord, DEFAULT_MATCH_COUNT, DEFAULT_MATCH_THRESHOLD,
    DEFAULT_RECENT_LIMIT,
};
use skillos_core::{BackendClient, Config};

use super::CmdResult;

#[derive(Subcommand)]
pub enum LogsAction {
    /// List the most recent learning logs
    List {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Print the knowledge graph (nodes and links) as JSON
    Graph {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
        /// Seed for the link layout, for reproducible output
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Semantic search over logs
    Search {
        query: String,
        #[arg(long, default_value_t = DEFAULT_MATCH_THRESHOLD)]
        threshold: f32,
        #[arg(long, default_value_t = DEFAULT_MATCH_COUNT)]
        count: usize,
    },
    /// Generate an embedding for a piece of text, optionally storing it on a log
    Embed {
        content: String,
        #[arg(long)]
        log_id: Option<String>,
    },
    /// Regenerate embeddings for recent logs in the background
    Reindex {
        #[arg(long, default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },
}

fn store(config: &Config) -> Result<KnowledgeStore, Box<dyn std::error::Error>> {
    let backend = BackendClient::from_config(&config.backend)?;
    let token = auth::stored_access_token().unwrap_or_else(|e| {
        tracing::debug!("no stored session: {e}");
        None
    });
    Ok(KnowledgeStore::new(backend, token))
}

/// Embedding client, with write-back when the service key env var is set.
fn embedder(config: &Config) -> Result<EmbeddingClient, Box<dyn std::error::Error>> {
    let client = EmbeddingClient::from_config(&config.embedding)?;
    match std::env::var(&config.embedding.service_key_env) {
        Ok(key) if !key.is_empty() => {
            let backend = BackendClient::from_config(&config.backend)?;
            Ok(client.with_write_back(backend, &key))
        }
        _ => Ok(client),
    }
}

fn first_line(log: &LogRecord) -> &str {
    log.content.lines().next().unwrap_or_default()
}

pub async fn run(action: LogsAction) -> CmdResult {
    let config = Config::load()?;
    match action {
        LogsAction::List { limit, json } => {
            let logs = store(&config)?.recent_logs(limit).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&logs)?);
            } else if logs.is_empty() {
                println!("no logs yet");
            } else {
                for log in &logs {
                    println!(
                        "{}  {}  {}",
                        log.created_at.format("%Y-%m-%d %H:%M"),
                        log.id,
                        first_line(log)
                    );
                }
            }
        }
        LogsAction::Graph { limit, seed } => {
            let logs = store(&config)?.recent_logs(limit).await?;
            let graph = match seed {
                Some(seed) => KnowledgeGraph::from_logs(&logs, &mut StdRng::seed_from_u64(seed)),
                None => KnowledgeGraph::from_logs(&logs, &mut rand::thread_rng()),
            };
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        LogsAction::Search {
            query,
            threshold,
            count,
        } => {
            let embedding = embedder(&config)?
                .embed(&EmbeddingRequest::new(None, query))
                .await?;
            let matches = store(&config)?.search(&embedding, threshold, count).await?;
            if matches.is_empty() {
                println!("no matches");
            }
            for m in &matches {
                println!("{:>10}  {}", m.label(), m.content);
            }
        }
        LogsAction::Embed { content, log_id } => {
            let request = EmbeddingRequest::new(log_id, content);
            let embedding = embedder(&config)?.embed(&request).await?;
            println!("{} dimensions", embedding.len());
        }
        LogsAction::Reindex { limit } => {
            let client = embedder(&config)?;
            let logs = store(&config)?.recent_logs(limit).await?;
            let jobs: Vec<_> = logs
                .into_iter()
                .map(|log| {
                    spawn_embedding_job(client.clone(), EmbeddingRequest::new(Some(log.id), log.content))
                })
                .collect();
            let total = jobs.len();
            for job in jobs {
                if let Err(e) = job.await {
                    tracing::warn!("embedding job panicked: {e}");
                }
            }
            println!("reindexed {total} logs");
        }
    }
    Ok(())
}
