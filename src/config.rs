use crate::error::PipelineError;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 20;
pub const DEFAULT_TOP_K: usize = 1;
pub const DEFAULT_SLIDE_COUNT: usize = 5;

/// How retrieved context is shared between the outline and the slide bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextPolicy {
    /// No retrieval at all; the corpus is never loaded
    None,
    /// Retrieve once for the topic and reuse it for every prompt
    Shared,
    /// Outline uses the topic's context, every slide re-queries with its own title
    #[default]
    PerSlide,
}

/// Run configuration. Built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for source documents
    pub corpus_dir: PathBuf,
    /// Directory the presentation file is written to
    pub output_dir: PathBuf,
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks of a document
    pub chunk_overlap: usize,
    /// Number of chunks returned per retrieval
    pub top_k: usize,
    /// Number of slide titles requested from the generator
    pub slide_count: usize,
    pub outline_max_tokens: u32,
    pub content_max_tokens: u32,
    /// Upper bound on in-flight content generation requests
    pub concurrency: usize,
    /// Deadline applied to every provider call
    pub request_timeout: Duration,
    pub context_policy: ContextPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            corpus_dir: PathBuf::from("doc"),
            output_dir: PathBuf::from("doc"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            slide_count: DEFAULT_SLIDE_COUNT,
            outline_max_tokens: 200,
            content_max_tokens: 500,
            concurrency: 4,
            request_timeout: Duration::from_secs(60),
            context_policy: ContextPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Reject parameter combinations that would make a stage degenerate
    pub fn validate(&self) -> Result<(), PipelineError> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(PipelineError::Config("top-k must be at least 1".into()));
        }
        if self.concurrency == 0 {
            return Err(PipelineError::Config(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(PipelineError::Config(
                "request timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Overlap must be strictly less than the chunk size
pub fn validate_chunking(chunk_size: usize, overlap: usize) -> Result<(), PipelineError> {
    if overlap >= chunk_size {
        return Err(PipelineError::Config(format!(
            "chunk overlap ({}) must be smaller than chunk size ({})",
            overlap, chunk_size
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 20);
        assert_eq!(config.top_k, 1);
        assert_eq!(config.context_policy, ContextPolicy::PerSlide);
    }

    #[test]
    fn test_overlap_not_below_chunk_size_is_rejected() {
        for (size, overlap) in [(10, 10), (10, 11), (0, 0), (1, 5)] {
            let err = validate_chunking(size, overlap).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Config);
        }
        assert!(validate_chunking(10, 9).is_ok());
        assert!(validate_chunking(1, 0).is_ok());
    }

    #[test]
    fn test_zero_top_k_is_rejected() {
        let config = PipelineConfig {
            top_k: 0,
            ..PipelineConfig::default()
        };
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Config);
    }
}
