use crate::chunking::TextChunk;
use crate::provider::Embedding;
use anyhow::{Context, Result};
use log::{info, warn};
use qdrant_client::qdrant::UpsertPointsBuilder;
use qdrant_client::qdrant::{CreateCollectionBuilder, Distance, PointStruct, Value, VectorParams};
use qdrant_client::Qdrant;
use std::collections::HashMap;
use std::env;

/// A stored chunk together with its similarity to a query
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Storage backend for (chunk, embedding) pairs.
///
/// `search` returns at most `limit` chunks ordered by descending similarity,
/// ties broken by insertion order.
#[allow(async_fn_in_trait)]
pub trait VectorStore {
    /// Replace the store contents with `entries`
    async fn rebuild(&mut self, entries: Vec<(TextChunk, Embedding)>) -> Result<()>;

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Cosine similarity; zero vectors are similar to nothing
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Brute-force in-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Vec<(TextChunk, Embedding)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for MemoryStore {
    async fn rebuild(&mut self, entries: Vec<(TextChunk, Embedding)>) -> Result<()> {
        self.entries = entries;
        Ok(())
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        let mut scored: Vec<ScoredChunk> = self
            .entries
            .iter()
            .map(|(chunk, embedding)| ScoredChunk {
                chunk: chunk.clone(),
                score: cosine_similarity(&query.values, &embedding.values),
            })
            .collect();

        // sort_by is stable, so equal scores keep insertion order
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(limit);
        Ok(scored)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Configuration for Qdrant
pub struct QdrantConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl QdrantConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let url = env::var("QDRANT_URL").context("QDRANT_URL not set")?;
        let api_key = env::var("QDRANT_API_KEY").ok();

        Ok(QdrantConfig { url, api_key })
    }
}

/// Store backed by a Qdrant collection that lives for one run
pub struct QdrantStore {
    client: Qdrant,
    collection_name: String,
    len: usize,
}

impl QdrantStore {
    /// Create a new Qdrant store; `label` names the collection
    pub fn new(config: QdrantConfig, label: &str) -> Result<Self> {
        let config_builder = Qdrant::from_url(&config.url);
        let config_builder = if let Some(api_key) = config.api_key {
            config_builder.api_key(api_key)
        } else {
            config_builder
        };

        let client = config_builder
            .build()
            .context("Failed to initialize Qdrant client")?;

        Ok(QdrantStore {
            client,
            collection_name: get_collection_name(label),
            len: 0,
        })
    }

    /// Check if the collection exists
    pub async fn collection_exists(&self) -> Result<bool> {
        match self.client.collection_info(&self.collection_name).await {
            Ok(_) => Ok(true),
            Err(qdrant_client::QdrantError::ResponseError { status })
                if status.code() == tonic::Code::NotFound =>
            {
                Ok(false)
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to check collection existence: {}",
                e
            )),
        }
    }

    async fn create_collection(&self, dimension: usize) -> Result<()> {
        let create_collection = CreateCollectionBuilder::new(self.collection_name.clone())
            .vectors_config(VectorParams {
                size: dimension as u64,
                distance: Distance::Cosine.into(),
                ..Default::default()
            });

        self.client
            .create_collection(create_collection)
            .await
            .with_context(|| format!("Failed to create collection {}", self.collection_name))?;

        Ok(())
    }

    async fn delete_collection(&self) -> Result<()> {
        self.client
            .delete_collection(self.collection_name.clone())
            .await
            .with_context(|| format!("Failed to delete collection {}", self.collection_name))?;

        Ok(())
    }

    async fn store_points(&self, entries: Vec<(TextChunk, Embedding)>) -> Result<()> {
        let points: Vec<PointStruct> = entries
            .into_iter()
            .enumerate()
            .map(|(order, (chunk, embedding))| {
                let mut payload: HashMap<String, Value> = HashMap::new();
                payload.insert("text".to_string(), Value::from(chunk.text));
                payload.insert("source".to_string(), Value::from(chunk.source));
                payload.insert(
                    "chunk_index".to_string(),
                    Value::from(chunk.chunk_index as i64),
                );
                payload.insert(
                    "start_position".to_string(),
                    Value::from(chunk.start_position as i64),
                );
                payload.insert("order".to_string(), Value::from(order as i64));

                PointStruct::new(order as u64, embedding.values, payload)
            })
            .collect();

        let upsert_request =
            UpsertPointsBuilder::new(self.collection_name.clone(), points).wait(true);

        self.client
            .upsert_points(upsert_request)
            .await
            .with_context(|| {
                format!(
                    "Failed to upsert points in collection {}",
                    self.collection_name
                )
            })?;

        Ok(())
    }
}

impl VectorStore for QdrantStore {
    async fn rebuild(&mut self, entries: Vec<(TextChunk, Embedding)>) -> Result<()> {
        if self.collection_exists().await? {
            info!("Replacing existing collection: {}", self.collection_name);
            self.delete_collection().await?;
        }
        self.len = 0;

        let Some(dimension) = entries.first().map(|(_, e)| e.dimension()) else {
            return Ok(());
        };
        let count = entries.len();

        self.create_collection(dimension).await?;
        if let Err(err) = self.store_points(entries).await {
            // A half-filled collection must never be searched
            if let Err(cleanup) = self.delete_collection().await {
                warn!("Failed to drop partial collection: {:#}", cleanup);
            }
            return Err(err);
        }

        self.len = count;
        Ok(())
    }

    async fn search(&self, query: &Embedding, limit: usize) -> Result<Vec<ScoredChunk>> {
        use qdrant_client::qdrant::{with_payload_selector, SearchPoints, WithPayloadSelector};

        if self.len == 0 {
            return Ok(Vec::new());
        }

        let search_request = SearchPoints {
            collection_name: self.collection_name.clone(),
            vector: query.values.clone(),
            limit: limit as u64,
            with_payload: Some(WithPayloadSelector {
                selector_options: Some(with_payload_selector::SelectorOptions::Enable(true)),
            }),
            ..Default::default()
        };

        let search_response = self
            .client
            .search_points(search_request)
            .await
            .with_context(|| format!("Failed to search collection {}", self.collection_name))?;

        let mut hits = search_response
            .result
            .into_iter()
            .map(|scored_point| stored_chunk(&scored_point.payload, scored_point.score))
            .collect::<Result<Vec<(i64, ScoredChunk)>>>()
            .with_context(|| format!("Malformed point in collection {}", self.collection_name))?;

        hits.sort_by(|(order_a, a), (order_b, b)| {
            b.score.total_cmp(&a.score).then(order_a.cmp(order_b))
        });
        Ok(hits.into_iter().map(|(_, hit)| hit).collect())
    }

    fn len(&self) -> usize {
        self.len
    }
}

/// Rebuild a chunk from a search hit's payload, with its insertion order
fn stored_chunk(payload: &HashMap<String, Value>, score: f32) -> Result<(i64, ScoredChunk)> {
    let text = payload
        .get("text")
        .and_then(|v| v.as_str())
        .context("point has no text payload")?
        .to_string();
    let source = payload
        .get("source")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .unwrap_or_default();
    let integer = |key: &str| payload.get(key).and_then(|v| v.as_integer());

    let chunk = TextChunk {
        text,
        source,
        chunk_index: integer("chunk_index").unwrap_or(0) as usize,
        start_position: integer("start_position").unwrap_or(0) as usize,
    };
    let order = integer("order").unwrap_or(i64::MAX);
    Ok((order, ScoredChunk { chunk, score }))
}

/// Generate a collection name from a label
fn get_collection_name(label: &str) -> String {
    // Replace non-alphanumeric characters with underscores and convert to lowercase
    let name = label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .to_lowercase();

    format!("deck_{}", name)
}
