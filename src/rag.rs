use crate::chunking::split_documents;
use crate::config::{ContextPolicy, PipelineConfig};
use crate::database::VectorStore;
use crate::document::load_corpus;
use crate::embeddings::EmbeddingIndex;
use crate::error::PipelineError;
use crate::events::{DownloadLink, RunEvent};
use crate::generation::{ContentGenerator, OutlineGenerator};
use crate::presentation::{assemble, output_path, save, Artifact, SlideSpec};
use crate::provider::{EmbeddingProvider, TextGenerator};
use crate::retriever::Retriever;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::info;
use std::path::PathBuf;

/// A presentation written to disk
#[derive(Debug, Clone)]
pub struct GeneratedDeck {
    pub path: PathBuf,
    pub artifact: Artifact,
}

impl GeneratedDeck {
    pub fn slide_count(&self) -> usize {
        self.artifact.presentation.slides.len()
    }

    pub fn download_link(&self) -> DownloadLink {
        DownloadLink::new(&self.path, &self.artifact.bytes)
    }
}

/// Retrieval-augmented presentation generator.
///
/// The index is built once by [`RagPipeline::build`] and only read afterwards;
/// each call to [`RagPipeline::generate`] processes one topic to completion.
pub struct RagPipeline<E, G, S> {
    config: PipelineConfig,
    embedder: E,
    generator: G,
    index: Option<EmbeddingIndex<S>>,
}

impl<E, G, S> RagPipeline<E, G, S>
where
    E: EmbeddingProvider,
    G: TextGenerator,
    S: VectorStore,
{
    /// Load the corpus, chunk it and build the index
    pub async fn build(
        config: PipelineConfig,
        embedder: E,
        generator: G,
        store: S,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let index = if config.context_policy == ContextPolicy::None {
            info!("Retrieval disabled; skipping corpus indexing");
            None
        } else {
            let documents = load_corpus(&config.corpus_dir)?;
            let chunks = split_documents(documents, config.chunk_size, config.chunk_overlap)?;
            let index =
                EmbeddingIndex::build(&embedder, store, chunks, config.request_timeout).await?;
            Some(index)
        };

        Ok(RagPipeline {
            config,
            embedder,
            generator,
            index,
        })
    }

    /// Number of indexed chunks, if retrieval is enabled
    pub fn indexed_chunks(&self) -> Option<usize> {
        self.index.as_ref().map(|index| index.len())
    }

    /// Generate and save a presentation for `topic`.
    ///
    /// A blank topic is a no-op and returns `Ok(None)`. Any failure aborts the
    /// run before anything is written.
    pub async fn generate(&self, topic: &str) -> Result<Option<GeneratedDeck>, PipelineError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Ok(None);
        }

        let retriever = self.index.as_ref().map(|index| {
            Retriever::new(
                index,
                &self.embedder,
                self.config.top_k,
                self.config.request_timeout,
            )
        });

        let topic_context = match &retriever {
            Some(retriever) => retriever.retrieve(topic).await?.render(),
            None => String::new(),
        };

        let outline = OutlineGenerator::new(
            &self.generator,
            self.config.slide_count,
            self.config.outline_max_tokens,
            self.config.request_timeout,
        );
        let titles = outline.generate_outline(topic, &topic_context).await?;
        info!("Slide titles: {:?}", titles);

        let content = ContentGenerator::new(
            &self.generator,
            self.config.content_max_tokens,
            self.config.request_timeout,
        );
        let retriever = retriever.as_ref();
        let topic_context = topic_context.as_str();
        let content = &content;
        let policy = self.config.context_policy;

        // buffered() yields results in title order whatever order they finish in
        let bodies: Vec<String> = stream::iter(titles.iter())
            .map(move |title| async move {
                let context = match (policy, retriever) {
                    (ContextPolicy::PerSlide, Some(retriever)) => {
                        retriever.retrieve(title).await?.render()
                    }
                    _ => topic_context.to_string(),
                };
                content.generate_content(title, &context).await
            })
            .buffered(self.config.concurrency)
            .try_collect()
            .await?;
        info!("Generated content for {} slides", bodies.len());

        let specs: Vec<SlideSpec> = titles
            .into_iter()
            .zip(bodies)
            .map(|(title, body)| SlideSpec { title, body })
            .collect();

        let artifact = assemble(topic, &specs)?;
        let path = output_path(&self.config.output_dir, topic);
        save(&artifact, &path)?;

        Ok(Some(GeneratedDeck { path, artifact }))
    }

    /// Like [`RagPipeline::generate`], reporting progress through `on_event`
    pub async fn run<F>(
        &self,
        topic: &str,
        mut on_event: F,
    ) -> Result<Option<GeneratedDeck>, PipelineError>
    where
        F: FnMut(RunEvent),
    {
        if topic.trim().is_empty() {
            return Ok(None);
        }

        on_event(RunEvent::Started {
            topic: topic.trim().to_string(),
        });
        match self.generate(topic).await {
            Ok(Some(deck)) => {
                on_event(RunEvent::Succeeded {
                    path: deck.path.clone(),
                    slide_count: deck.slide_count(),
                    download: deck.download_link(),
                });
                Ok(Some(deck))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                on_event(RunEvent::failed(&err));
                Err(err)
            }
        }
    }
}
