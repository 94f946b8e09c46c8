//! Slide content model, typography and artifact output.

use crate::error::PipelineError;
use crate::pptx;
use anyhow::Context;
use log::info;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const PRESENTATION_EXTENSION: &str = "pptx";
pub const PRESENTATION_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";

/// Font size for slide titles
pub const TITLE_FONT_SIZE: FontSize = FontSize::from_points(30);
/// Font size for every other paragraph
pub const SLIDE_FONT_SIZE: FontSize = FontSize::from_points(16);

/// Font size stored in hundredths of a point, as OOXML expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FontSize(u32);

impl FontSize {
    pub const fn from_points(points: u32) -> Self {
        FontSize(points * 100)
    }

    pub fn points(&self) -> u32 {
        self.0 / 100
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }
}

/// Title and body of one content slide, before layout
#[derive(Debug, Clone, PartialEq)]
pub struct SlideSpec {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideLayout {
    /// Opening slide carrying only the topic
    Title,
    /// Title placeholder plus body placeholder
    TitleAndContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    CenteredTitle,
    Title,
    Body,
}

impl Placeholder {
    pub fn is_title(&self) -> bool {
        matches!(self, Placeholder::CenteredTitle | Placeholder::Title)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub text: String,
    pub font_size: FontSize,
}

/// A placeholder shape with a text frame
#[derive(Debug, Clone, PartialEq)]
pub struct TextShape {
    pub placeholder: Placeholder,
    pub paragraphs: Vec<Paragraph>,
}

impl TextShape {
    fn new(placeholder: Placeholder, text: &str) -> Self {
        let paragraphs = text
            .split('\n')
            .map(|line| Paragraph {
                text: line.trim_end_matches('\r').to_string(),
                font_size: SLIDE_FONT_SIZE,
            })
            .collect();
        TextShape {
            placeholder,
            paragraphs,
        }
    }

    pub fn text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub layout: SlideLayout,
    pub shapes: Vec<TextShape>,
}

impl Slide {
    pub fn title(&self) -> Option<&TextShape> {
        self.shapes.iter().find(|s| s.placeholder.is_title())
    }

    pub fn body(&self) -> Option<&TextShape> {
        self.shapes
            .iter()
            .find(|s| s.placeholder == Placeholder::Body)
    }
}

/// Title slide followed by one content slide per [`SlideSpec`]
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub topic: String,
    pub slides: Vec<Slide>,
}

impl Presentation {
    pub fn new(topic: &str, specs: &[SlideSpec]) -> Self {
        let mut slides = Vec::with_capacity(specs.len() + 1);
        slides.push(Slide {
            layout: SlideLayout::Title,
            shapes: vec![TextShape::new(Placeholder::CenteredTitle, topic)],
        });
        for spec in specs {
            slides.push(Slide {
                layout: SlideLayout::TitleAndContent,
                shapes: vec![
                    TextShape::new(Placeholder::Title, &spec.title),
                    TextShape::new(Placeholder::Body, &spec.body),
                ],
            });
        }

        let mut presentation = Presentation {
            topic: topic.to_string(),
            slides,
        };
        presentation.apply_typography();
        presentation
    }

    /// Titles get the title size, every other paragraph on every slide the body size
    fn apply_typography(&mut self) {
        for shape in self.slides.iter_mut().flat_map(|s| s.shapes.iter_mut()) {
            let size = if shape.placeholder.is_title() {
                TITLE_FONT_SIZE
            } else {
                SLIDE_FONT_SIZE
            };
            for paragraph in &mut shape.paragraphs {
                paragraph.font_size = size;
            }
        }
    }
}

/// A serialized presentation ready to be written
#[derive(Debug, Clone)]
pub struct Artifact {
    pub presentation: Presentation,
    pub bytes: Vec<u8>,
}

/// Lay out the slides and serialize them to .pptx bytes
pub fn assemble(topic: &str, specs: &[SlideSpec]) -> Result<Artifact, PipelineError> {
    let presentation = Presentation::new(topic, specs);
    let bytes = pptx::write_presentation(&presentation).map_err(PipelineError::Assembly)?;
    Ok(Artifact {
        presentation,
        bytes,
    })
}

/// `<output_dir>/<topic>_presentation.pptx`, with path-hostile characters replaced
pub fn output_path(output_dir: &Path, topic: &str) -> PathBuf {
    let stem: String = topic
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    output_dir.join(format!("{}_presentation.{}", stem, PRESENTATION_EXTENSION))
}

/// Write the artifact, replacing any previous file at `path`.
///
/// The bytes go to a temporary file in the same directory which is then
/// renamed over `path`, so a failed write never clobbers the last good deck.
pub fn save(artifact: &Artifact, path: &Path) -> Result<(), PipelineError> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create output directory {}", parent.display()))
        .map_err(PipelineError::Assembly)?;

    let mut file = NamedTempFile::new_in(parent)
        .and_then(|mut file| file.write_all(&artifact.bytes).map(|_| file))
        .with_context(|| format!("Failed to write presentation {}", path.display()))
        .map_err(PipelineError::Assembly)?;
    file.as_file_mut()
        .sync_all()
        .with_context(|| format!("Failed to flush presentation {}", path.display()))
        .map_err(PipelineError::Assembly)?;
    // Dropping the returned temp file on failure removes it
    file.persist(path)
        .map_err(|err| err.error)
        .with_context(|| format!("Failed to replace presentation {}", path.display()))
        .map_err(PipelineError::Assembly)?;
    info!("Saved presentation to {}", path.display());
    Ok(())
}
