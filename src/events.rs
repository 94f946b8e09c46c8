use crate::error::{ErrorKind, PipelineError};
use crate::pptx::escape_xml;
use crate::presentation::PRESENTATION_MIME_TYPE;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::{Path, PathBuf};

/// Downloadable encoding of a saved presentation
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadLink {
    pub file_name: String,
    pub data_uri: String,
}

impl DownloadLink {
    pub fn new(path: &Path, bytes: &[u8]) -> Self {
        DownloadLink {
            file_name: path.display().to_string(),
            data_uri: format!(
                "data:{};base64,{}",
                PRESENTATION_MIME_TYPE,
                STANDARD.encode(bytes)
            ),
        }
    }

    /// HTML anchor that downloads the presentation
    pub fn to_html(&self) -> String {
        format!(
            r#"<a href="{}" download="{}">Download the PowerPoint Presentation</a>"#,
            self.data_uri,
            escape_xml(&self.file_name)
        )
    }
}

/// Signals reported to the caller during a run. A run that starts ends with
/// exactly one of `Succeeded` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    Started {
        topic: String,
    },
    Succeeded {
        path: PathBuf,
        slide_count: usize,
        download: DownloadLink,
    },
    Failed {
        kind: ErrorKind,
        message: String,
    },
}

impl RunEvent {
    pub fn failed(err: &PipelineError) -> Self {
        RunEvent::Failed {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
