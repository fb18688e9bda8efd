//! DOCX template rendering engine
//!
//! This crate merges a JSON data record into a Word (`.docx`) template:
//! - Package I/O (the ZIP container and its XML parts)
//! - Tag discovery across split Word runs
//! - Value substitution, sections, inverted sections and loops
//! - Collect-all error reporting for unresolved or malformed tags
//! - Text extraction for checking rendered output
//!
//! # Example
//! ```no_run
//! use docx_engine::{DocumentEngine, DocxEngine};
//! use serde_json::json;
//!
//! # fn example(template: &[u8]) -> Result<(), docx_engine::EngineError> {
//! let engine = DocxEngine::default();
//! let rendered = engine.render(template, &json!({ "Company": "Acme" }))?;
//! let text = docx_engine::extract_text(&rendered)?;
//! assert!(text.contains("Acme"));
//! # Ok(())
//! # }
//! ```

pub mod compiler;
pub mod extract;
pub mod package;
pub mod template;

pub use compiler::{
    render_document, DocumentEngine, DocxEngine, EngineError, RenderOptions, TagError,
    TagErrorKind, DOCX_EXTENSION, DOCX_MIME_TYPE,
};
pub use extract::extract_text;
pub use package::TemplatePackage;
