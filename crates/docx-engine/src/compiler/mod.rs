//! Template rendering entry points and error reporting

pub mod errors;
pub mod output;
pub mod render;

pub use errors::{EngineError, TagError, TagErrorKind};
pub use output::{DOCX_EXTENSION, DOCX_MIME_TYPE};
pub use render::render_document;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How template markup is interpreted
///
/// Templates are authored assuming both policies are on, so the default
/// enables them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    /// A section whose opening and closing tags sit alone in their own
    /// paragraphs repeats the paragraphs between them, and the two tag
    /// paragraphs are removed from the output.
    pub paragraph_loop: bool,
    /// A newline inside a substituted value becomes a hard line break.
    pub linebreaks: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            paragraph_loop: true,
            linebreaks: true,
        }
    }
}

/// A document engine turns template bytes plus a data record into
/// rendered document bytes.
pub trait DocumentEngine: Send + Sync {
    fn render(&self, template: &[u8], data: &Value) -> Result<Vec<u8>, EngineError>;
}

/// Engine for Office Open XML word-processing packages
#[derive(Debug, Clone, Default)]
pub struct DocxEngine {
    options: RenderOptions,
}

impl DocxEngine {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }
}

impl DocumentEngine for DocxEngine {
    fn render(&self, template: &[u8], data: &Value) -> Result<Vec<u8>, EngineError> {
        render_document(template, data, &self.options)
    }
}
