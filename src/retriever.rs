use crate::database::VectorStore;
use crate::embeddings::{EmbeddingIndex, RetrievalResult};
use crate::error::PipelineError;
use crate::provider::EmbeddingProvider;
use log::debug;
use std::time::Duration;

/// Fixed-k retrieval over a built index
pub struct Retriever<'a, E, S> {
    index: &'a EmbeddingIndex<S>,
    provider: &'a E,
    k: usize,
    timeout: Duration,
}

impl<'a, E, S> Retriever<'a, E, S>
where
    E: EmbeddingProvider,
    S: VectorStore,
{
    pub fn new(
        index: &'a EmbeddingIndex<S>,
        provider: &'a E,
        k: usize,
        timeout: Duration,
    ) -> Self {
        Retriever {
            index,
            provider,
            k,
            timeout,
        }
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult, PipelineError> {
        let result = self
            .index
            .query(self.provider, query, self.k, self.timeout)
            .await?;
        debug!("Retrieved {} chunks for {:?}", result.len(), query);
        Ok(result)
    }
}
