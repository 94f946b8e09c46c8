use crate::error::PipelineError;
use crate::provider::TextGenerator;
use log::debug;
use std::time::Duration;

/// Produces an ordered list of slide titles for a topic
pub struct OutlineGenerator<'a, G> {
    generator: &'a G,
    slide_count: usize,
    max_tokens: u32,
    timeout: Duration,
}

impl<'a, G: TextGenerator> OutlineGenerator<'a, G> {
    pub fn new(generator: &'a G, slide_count: usize, max_tokens: u32, timeout: Duration) -> Self {
        OutlineGenerator {
            generator,
            slide_count,
            max_tokens,
            timeout,
        }
    }

    /// Ask for `slide_count` titles. The provider may return any number of them.
    pub async fn generate_outline(
        &self,
        topic: &str,
        context: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let prompt = outline_prompt(topic, context, self.slide_count);
        let raw = complete_with_timeout(self.generator, &prompt, self.max_tokens, self.timeout)
            .await?;
        debug!("Raw outline response: {:?}", raw);
        Ok(parse_titles(&raw))
    }
}

/// Produces the body text of one slide
pub struct ContentGenerator<'a, G> {
    generator: &'a G,
    max_tokens: u32,
    timeout: Duration,
}

impl<'a, G: TextGenerator> ContentGenerator<'a, G> {
    pub fn new(generator: &'a G, max_tokens: u32, timeout: Duration) -> Self {
        ContentGenerator {
            generator,
            max_tokens,
            timeout,
        }
    }

    pub async fn generate_content(
        &self,
        title: &str,
        context: &str,
    ) -> Result<String, PipelineError> {
        let prompt = content_prompt(title, context);
        let body = complete_with_timeout(self.generator, &prompt, self.max_tokens, self.timeout)
            .await?;
        Ok(body.trim().to_string())
    }
}

/// One title per line; whitespace is stripped and blank lines dropped
pub fn parse_titles(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn outline_prompt(topic: &str, context: &str, slide_count: usize) -> String {
    let mut prompt = format!(
        "Generate {} slide titles for a presentation on the topic '{}'.",
        slide_count, topic
    );
    if !context.trim().is_empty() {
        prompt.push_str(&format!(
            "\nBase the titles on the following excerpts from the reference documents:\n<context>\n{}\n</context>",
            context
        ));
    }
    prompt.push_str("\nAnswer with one title per line and nothing else.");
    prompt
}

pub fn content_prompt(title: &str, context: &str) -> String {
    let mut prompt = format!("Generate content for the slide: '{}'.", title);
    if !context.trim().is_empty() {
        prompt.push_str(&format!(
            "\nUse information from the following excerpts of the reference documents:\n<context>\n{}\n</context>",
            context
        ));
    }
    prompt
}

async fn complete_with_timeout<G: TextGenerator>(
    generator: &G,
    prompt: &str,
    max_tokens: u32,
    timeout: Duration,
) -> Result<String, PipelineError> {
    match tokio::time::timeout(timeout, generator.complete(prompt, max_tokens)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(err)) => Err(PipelineError::Generation(err)),
        Err(_) => Err(PipelineError::Generation(anyhow::anyhow!(
            "generation request timed out after {:?}",
            timeout
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::Mutex;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct CannedGenerator {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<(String, u32)>>,
    }

    impl CannedGenerator {
        fn replying(reply: &str) -> Self {
            CannedGenerator {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for CannedGenerator {
        async fn complete(&self, prompt: &str, max_tokens: u32) -> anyhow::Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), max_tokens));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(err) => Err(anyhow::anyhow!("{}", err)),
            }
        }
    }

    #[test]
    fn test_parse_titles_drops_blank_lines() {
        assert_eq!(parse_titles("A\n\n  \nB\nC"), vec!["A", "B", "C"]);
        assert_eq!(parse_titles("  Intro  \r\n\tHistory\n"), vec!["Intro", "History"]);
        assert!(parse_titles("\n \n").is_empty());
    }

    #[tokio::test]
    async fn test_outline_prompt_carries_topic_context_and_count() {
        let generator = CannedGenerator::replying("Overview\n\nLight Reactions\n");
        let outline = OutlineGenerator::new(&generator, 5, 200, TIMEOUT);
        let titles = outline
            .generate_outline("Photosynthesis", "Chlorophyll absorbs light.")
            .await
            .unwrap();
        assert_eq!(titles, vec!["Overview", "Light Reactions"]);

        let prompts = generator.prompts.lock().unwrap();
        let (prompt, max_tokens) = &prompts[0];
        assert_eq!(*max_tokens, 200);
        assert!(prompt.contains("Generate 5 slide titles"));
        assert!(prompt.contains("'Photosynthesis'"));
        assert!(prompt.contains("Chlorophyll absorbs light."));
    }

    #[test]
    fn test_prompts_without_context() {
        assert!(!outline_prompt("Rust", "", 5).contains("<context>"));
        assert_eq!(
            content_prompt("Ownership", "  "),
            "Generate content for the slide: 'Ownership'."
        );
    }

    #[tokio::test]
    async fn test_provider_error_is_generation_error() {
        let generator = CannedGenerator {
            reply: Err(anyhow::anyhow!("401 Unauthorized")),
            prompts: Mutex::new(Vec::new()),
        };
        let content = ContentGenerator::new(&generator, 500, TIMEOUT);
        let err = content.generate_content("Overview", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_content_is_trimmed() {
        let generator = CannedGenerator::replying("\n\nPlants convert light.\n");
        let content = ContentGenerator::new(&generator, 500, TIMEOUT);
        let body = content.generate_content("Overview", "").await.unwrap();
        assert_eq!(body, "Plants convert light.");
        assert_eq!(generator.prompts.lock().unwrap()[0].1, 500);
    }

    struct SlowGenerator;

    impl TextGenerator for SlowGenerator {
        async fn complete(&self, _prompt: &str, _max_tokens: u32) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok("too late".to_string())
        }
    }

    #[tokio::test]
    async fn test_timeout_is_a_generation_error() {
        let timeout = Duration::from_millis(20);

        let outline = OutlineGenerator::new(&SlowGenerator, 5, 200, timeout);
        let err = outline.generate_outline("Rust", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.to_string().contains("timed out"));

        let content = ContentGenerator::new(&SlowGenerator, 500, timeout);
        let err = content.generate_content("Ownership", "").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Generation);
        assert!(err.to_string().contains("timed out"));
    }
}
