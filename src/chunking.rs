use crate::config::validate_chunking;
use crate::document::Document;
use crate::error::PipelineError;

/// Represents a text chunk with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// The actual text content of this chunk
    pub text: String,
    /// Source identifier of the document this chunk belongs to
    pub source: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Starting character position of this chunk in the original document
    pub start_position: usize,
}

/// Split documents into overlapping chunks of at most `chunk_size` characters.
///
/// The returned iterator is lazy and yields chunks in document order, then in
/// order within each document. Consecutive chunks of one document share exactly
/// `overlap` characters. Empty documents produce no chunks.
pub fn split_documents<I>(
    documents: I,
    chunk_size: usize,
    overlap: usize,
) -> Result<Chunks<I::IntoIter>, PipelineError>
where
    I: IntoIterator<Item = Document>,
{
    validate_chunking(chunk_size, overlap)?;
    Ok(Chunks {
        documents: documents.into_iter(),
        chunk_size,
        overlap,
        current: None,
    })
}

/// Lazy chunk sequence produced by [`split_documents`]
pub struct Chunks<I> {
    documents: I,
    chunk_size: usize,
    overlap: usize,
    current: Option<Cursor>,
}

struct Cursor {
    source: String,
    chars: Vec<char>,
    next_start: usize,
    chunk_index: usize,
    done: bool,
}

impl Cursor {
    fn new(document: Document) -> Self {
        Cursor {
            source: document.source,
            chars: document.content.chars().collect(),
            next_start: 0,
            chunk_index: 0,
            done: false,
        }
    }

    fn next_chunk(&mut self, chunk_size: usize, overlap: usize) -> Option<TextChunk> {
        if self.done || self.chars.is_empty() {
            return None;
        }

        let total = self.chars.len();
        let start = self.next_start;
        let hard_end = (start + chunk_size).min(total);
        let end = if hard_end == total {
            total
        } else {
            self.break_point(start + overlap, hard_end)
        };

        let chunk = TextChunk {
            text: self.chars[start..end].iter().collect(),
            source: self.source.clone(),
            chunk_index: self.chunk_index,
            start_position: start,
        };
        self.chunk_index += 1;

        if end == total {
            self.done = true;
        } else {
            self.next_start = end - overlap;
        }
        Some(chunk)
    }

    /// Latest whitespace position in `(floor, hard_end]`, falling back to a hard cut.
    /// Staying above `floor` keeps every step moving forward past the overlap.
    fn break_point(&self, floor: usize, hard_end: usize) -> usize {
        (floor + 1..=hard_end)
            .rev()
            .find(|&pos| self.chars[pos].is_whitespace())
            .unwrap_or(hard_end)
    }
}

impl<I> Iterator for Chunks<I>
where
    I: Iterator<Item = Document>,
{
    type Item = TextChunk;

    fn next(&mut self) -> Option<TextChunk> {
        loop {
            if let Some(cursor) = self.current.as_mut() {
                if let Some(chunk) = cursor.next_chunk(self.chunk_size, self.overlap) {
                    return Some(chunk);
                }
                self.current = None;
            }

            let document = self.documents.next()?;
            self.current = Some(Cursor::new(document));
        }
    }
}

/// Calculate approximate token count for a text
/// This is a very simple estimation - words plus punctuation
pub fn estimate_token_count(text: &str) -> usize {
    let words = text.split_whitespace().count();
    let punctuation = text.chars().filter(|c| c.is_ascii_punctuation()).count();
    words + punctuation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn doc(source: &str, content: &str) -> Document {
        Document {
            content: content.to_string(),
            source: source.to_string(),
            mime_type: "text/plain".to_string(),
        }
    }

    fn sample_text(len: usize) -> String {
        let words = ["leaf", "light", "chlorophyll", "water", "sugar", "oxygen"];
        let mut text = String::new();
        let mut i = 0;
        while text.chars().count() < len {
            text.push_str(words[i % words.len()]);
            text.push(if i % 7 == 6 { '\n' } else { ' ' });
            i += 1;
        }
        text.chars().take(len).collect()
    }

    fn tail(text: &str, n: usize) -> String {
        let chars: Vec<char> = text.chars().collect();
        chars[chars.len() - n..].iter().collect()
    }

    fn head(text: &str, n: usize) -> String {
        text.chars().take(n).collect()
    }

    #[test]
    fn test_chunks_are_bounded_and_overlap_exactly() {
        for (size, overlap) in [(500, 20), (50, 10), (10, 0), (8, 7), (1, 0), (30, 29)] {
            for len in [0, 1, 7, 49, 50, 51, 333, 1200] {
                let text = sample_text(len);
                let chunks: Vec<TextChunk> =
                    split_documents(vec![doc("a.txt", &text)], size, overlap)
                        .unwrap()
                        .collect();

                if len == 0 {
                    assert!(chunks.is_empty());
                    continue;
                }

                for chunk in &chunks {
                    assert!(chunk.text.chars().count() <= size);
                }
                for pair in chunks.windows(2) {
                    assert_eq!(tail(&pair[0].text, overlap), head(&pair[1].text, overlap));
                    assert_eq!(
                        pair[1].start_position,
                        pair[0].start_position + pair[0].text.chars().count() - overlap
                    );
                }

                // The chunks cover the whole document
                let last = chunks.last().unwrap();
                assert_eq!(last.start_position + last.text.chars().count(), len);
                assert_eq!(chunks[0].start_position, 0);
            }
        }
    }

    #[test]
    fn test_short_document_is_a_single_chunk() {
        let chunks: Vec<TextChunk> = split_documents(vec![doc("a.txt", "short note")], 500, 20)
            .unwrap()
            .collect();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short note");
        assert_eq!(chunks[0].chunk_index, 0);
    }

    #[test]
    fn test_prefers_whitespace_breaks() {
        let chunks: Vec<TextChunk> =
            split_documents(vec![doc("a.txt", "alpha beta gamma delta")], 12, 2)
                .unwrap()
                .collect();
        assert_eq!(chunks[0].text, "alpha beta");
        assert_eq!(head(&chunks[1].text, 2), "ta");
    }

    #[test]
    fn test_preserves_document_order() {
        let documents = vec![
            doc("one.txt", &sample_text(120)),
            doc("two.txt", "tiny"),
            doc("three.txt", &sample_text(60)),
        ];
        let chunks: Vec<TextChunk> = split_documents(documents, 50, 5).unwrap().collect();

        let sources: Vec<&str> = chunks.iter().map(|c| c.source.as_str()).collect();
        let first_two = sources.iter().position(|s| *s == "two.txt").unwrap();
        let first_three = sources.iter().position(|s| *s == "three.txt").unwrap();
        assert!(sources[..first_two].iter().all(|s| *s == "one.txt"));
        assert_eq!(sources[first_two], "two.txt");
        assert_eq!(first_three, first_two + 1);

        let indexes: Vec<usize> = chunks
            .iter()
            .filter(|c| c.source == "one.txt")
            .map(|c| c.chunk_index)
            .collect();
        assert_eq!(indexes, (0..indexes.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_multibyte_text_is_split_on_characters() {
        let text = "光合作用は植物が光を使って糖を作る過程です";
        let chunks: Vec<TextChunk> = split_documents(vec![doc("jp.txt", text)], 8, 2)
            .unwrap()
            .collect();
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 8);
        }
    }

    #[test]
    fn test_invalid_overlap_is_config_error() {
        let result = split_documents(vec![doc("a.txt", "text")], 20, 20);
        assert_eq!(result.err().unwrap().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_estimate_token_count() {
        assert_eq!(estimate_token_count("Hello, world."), 4);
    }
}
