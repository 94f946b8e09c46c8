use crate::chunking::{estimate_token_count, TextChunk};
use crate::database::{ScoredChunk, VectorStore};
use crate::error::PipelineError;
use crate::provider::{Embedding, EmbeddingProvider};
use log::{debug, info};
use std::time::Duration;

/// Chunks most similar to a query, best first
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Textual rendering used inside generation prompts
    pub fn render(&self) -> String {
        self.chunks
            .iter()
            .map(|hit| hit.chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n\n")
    }
}

/// Searchable set of (chunk, embedding) pairs. Read-only once built.
pub struct EmbeddingIndex<S> {
    store: S,
    dimension: usize,
}

impl<S: VectorStore> EmbeddingIndex<S> {
    /// Embed every chunk and load the pairs into `store`.
    ///
    /// Any provider failure or malformed vector aborts the build; the store is
    /// only written once every embedding has been computed.
    pub async fn build<E, I>(
        provider: &E,
        mut store: S,
        chunks: I,
        timeout: Duration,
    ) -> Result<Self, PipelineError>
    where
        E: EmbeddingProvider,
        I: IntoIterator<Item = TextChunk>,
    {
        let mut entries = Vec::new();
        let mut dimension = None;

        for chunk in chunks {
            let embedding = embed_with_timeout(provider, &chunk.text, timeout).await?;
            let expected = *dimension.get_or_insert(embedding.dimension());
            check_embedding(&embedding, expected)?;
            debug!(
                "Embedded chunk {} of {} (~{} tokens)",
                chunk.chunk_index,
                chunk.source,
                estimate_token_count(&chunk.text)
            );
            entries.push((chunk, embedding));
        }

        let count = entries.len();
        store
            .rebuild(entries)
            .await
            .map_err(PipelineError::Embedding)?;
        info!("Built index with {} chunks", count);

        Ok(EmbeddingIndex {
            store,
            dimension: dimension.unwrap_or(0),
        })
    }

    /// Return the `k` chunks most similar to `text`; `k` is clamped to the index size
    pub async fn query<E: EmbeddingProvider>(
        &self,
        provider: &E,
        text: &str,
        k: usize,
        timeout: Duration,
    ) -> Result<RetrievalResult, PipelineError> {
        if k == 0 {
            return Err(PipelineError::Config("k must be at least 1".into()));
        }
        if self.store.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let embedding = embed_with_timeout(provider, text, timeout).await?;
        check_embedding(&embedding, self.dimension)?;

        let limit = k.min(self.store.len());
        let chunks = self
            .store
            .search(&embedding, limit)
            .await
            .map_err(PipelineError::Embedding)?;
        Ok(RetrievalResult { chunks })
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

async fn embed_with_timeout<E: EmbeddingProvider>(
    provider: &E,
    text: &str,
    timeout: Duration,
) -> Result<Embedding, PipelineError> {
    match tokio::time::timeout(timeout, provider.embed(text)).await {
        Ok(Ok(embedding)) => Ok(embedding),
        Ok(Err(err)) => Err(PipelineError::Embedding(err)),
        Err(_) => Err(PipelineError::Embedding(anyhow::anyhow!(
            "embedding request timed out after {:?}",
            timeout
        ))),
    }
}

fn check_embedding(embedding: &Embedding, expected: usize) -> Result<(), PipelineError> {
    if embedding.values.is_empty() {
        return Err(PipelineError::Embedding(anyhow::anyhow!(
            "provider returned an empty vector"
        )));
    }
    if embedding.dimension() != expected {
        return Err(PipelineError::Embedding(anyhow::anyhow!(
            "provider returned a {}-dimensional vector, expected {}",
            embedding.dimension(),
            expected
        )));
    }
    if embedding.values.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::Embedding(anyhow::anyhow!(
            "provider returned a vector with non-finite values"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Letter-frequency vectors: deterministic and similarity-meaningful
    struct LetterEmbedder {
        calls: AtomicUsize,
        fail_on_call: Option<usize>,
        short_on_call: Option<usize>,
    }

    impl LetterEmbedder {
        fn new() -> Self {
            LetterEmbedder {
                calls: AtomicUsize::new(0),
                fail_on_call: None,
                short_on_call: None,
            }
        }
    }

    impl EmbeddingProvider for LetterEmbedder {
        async fn embed(&self, text: &str) -> anyhow::Result<Embedding> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                anyhow::bail!("rate limited");
            }
            let mut values = vec![0.0f32; 26];
            for c in text.to_ascii_lowercase().chars() {
                if c.is_ascii_lowercase() {
                    values[(c as u8 - b'a') as usize] += 1.0;
                }
            }
            if self.short_on_call == Some(call) {
                values.truncate(3);
            }
            Ok(Embedding::new(values))
        }
    }

    struct SlowEmbedder;

    impl EmbeddingProvider for SlowEmbedder {
        async fn embed(&self, _text: &str) -> anyhow::Result<Embedding> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(Embedding::new(vec![1.0]))
        }
    }

    fn chunks(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| TextChunk {
                text: text.to_string(),
                source: "corpus.txt".to_string(),
                chunk_index: i,
                start_position: 0,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_query_returns_most_similar_first() {
        let provider = LetterEmbedder::new();
        let index = EmbeddingIndex::build(
            &provider,
            MemoryStore::new(),
            chunks(&["zzzz", "abc abc", "xyz"]),
            TIMEOUT,
        )
        .await
        .unwrap();

        let result = index.query(&provider, "abcab", 1, TIMEOUT).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.chunks[0].chunk.text, "abc abc");
    }

    #[tokio::test]
    async fn test_k_larger_than_index_is_clamped() {
        let provider = LetterEmbedder::new();
        let index = EmbeddingIndex::build(
            &provider,
            MemoryStore::new(),
            chunks(&["one", "two", "three"]),
            TIMEOUT,
        )
        .await
        .unwrap();

        let result = index.query(&provider, "tone", 10, TIMEOUT).await.unwrap();
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn test_query_is_deterministic() {
        let provider = LetterEmbedder::new();
        let index = EmbeddingIndex::build(
            &provider,
            MemoryStore::new(),
            chunks(&["same", "same", "other", "mesa"]),
            TIMEOUT,
        )
        .await
        .unwrap();

        let first = index.query(&provider, "same", 4, TIMEOUT).await.unwrap();
        let second = index.query(&provider, "same", 4, TIMEOUT).await.unwrap();
        let order = |r: &RetrievalResult| {
            r.chunks
                .iter()
                .map(|h| h.chunk.chunk_index)
                .collect::<Vec<_>>()
        };
        assert_eq!(order(&first), order(&second));
        // Identical vectors keep their insertion order
        assert_eq!(&order(&first)[..2], &[0, 1]);
    }

    #[tokio::test]
    async fn test_zero_k_is_rejected() {
        let provider = LetterEmbedder::new();
        let index = EmbeddingIndex::build(&provider, MemoryStore::new(), chunks(&["a"]), TIMEOUT)
            .await
            .unwrap();
        let err = index.query(&provider, "a", 0, TIMEOUT).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test]
    async fn test_provider_failure_aborts_build() {
        let provider = LetterEmbedder {
            fail_on_call: Some(1),
            ..LetterEmbedder::new()
        };
        let result = EmbeddingIndex::build(
            &provider,
            MemoryStore::new(),
            chunks(&["a", "b", "c"]),
            TIMEOUT,
        )
        .await;
        assert_eq!(result.err().unwrap().kind(), ErrorKind::Embedding);
        // The remaining chunks are never sent
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_wrong_dimension_aborts_build() {
        let provider = LetterEmbedder {
            short_on_call: Some(2),
            ..LetterEmbedder::new()
        };
        let result = EmbeddingIndex::build(
            &provider,
            MemoryStore::new(),
            chunks(&["a", "b", "c"]),
            TIMEOUT,
        )
        .await;
        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Embedding);
        assert!(err.to_string().contains("expected 26"));
    }

    #[tokio::test]
    async fn test_timeout_is_an_embedding_error() {
        let result = EmbeddingIndex::build(
            &SlowEmbedder,
            MemoryStore::new(),
            chunks(&["a"]),
            Duration::from_millis(20),
        )
        .await;
        let err = result.err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Embedding);
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_empty_index_returns_no_context() {
        let provider = LetterEmbedder::new();
        let index = EmbeddingIndex::build(&provider, MemoryStore::new(), Vec::new(), TIMEOUT)
            .await
            .unwrap();
        let result = index.query(&provider, "topic", 1, TIMEOUT).await.unwrap();
        assert!(result.is_empty());
        assert_eq!(result.render(), "");
    }
}
