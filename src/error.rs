use std::fmt;
use thiserror::Error;

/// Failure of a pipeline run. Every stage aborts the whole run on its first error.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The corpus directory is missing or unreadable
    #[error("failed to load corpus: {0:#}")]
    Load(anyhow::Error),
    /// Invalid chunking or pipeline parameters
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Embedding provider failure during index build or query
    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),
    /// Text generation provider failure during outline or content generation
    #[error("generation failed: {0:#}")]
    Generation(anyhow::Error),
    /// The presentation artifact could not be written
    #[error("failed to assemble presentation: {0:#}")]
    Assembly(anyhow::Error),
}

/// The error kind reported with a terminal failure signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Load,
    Config,
    Embedding,
    Generation,
    Assembly,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Load(_) => ErrorKind::Load,
            PipelineError::Config(_) => ErrorKind::Config,
            PipelineError::Embedding(_) => ErrorKind::Embedding,
            PipelineError::Generation(_) => ErrorKind::Generation,
            PipelineError::Assembly(_) => ErrorKind::Assembly,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Load => "LoadError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Embedding => "EmbeddingError",
            ErrorKind::Generation => "GenerationError",
            ErrorKind::Assembly => "AssemblyError",
        };
        f.write_str(name)
    }
}
