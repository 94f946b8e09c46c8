//! Capability interfaces over the hosted model APIs.

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Representation of a vector embedding
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Embedding {
    pub values: Vec<f32>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Embedding { values }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }
}

/// Turns text into a fixed-dimension vector
#[allow(async_fn_in_trait)]
pub trait EmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Completes a prompt with generated text
#[allow(async_fn_in_trait)]
pub trait TextGenerator {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
}

impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for &T {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        (**self).embed(text).await
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        (**self).complete(prompt, max_tokens).await
    }
}
