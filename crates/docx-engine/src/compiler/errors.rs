//! Error types for template rendering

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a tag could not be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagErrorKind {
    /// The tag name resolves to nothing in the data
    UndefinedTag,
    /// A value tag resolves to a list or an object
    ValueTypeMismatch,
    /// A section tag resolves to a string or a number
    LoopTypeMismatch,
    UnclosedTag,
    UnopenedTag,
    EmptyTag,
    UnclosedLoop,
    UnopenedLoop,
    ClosingTagDoesNotMatchOpeningTag,
    /// The markup between a section's tags does not repeat cleanly, e.g.
    /// a loop opened inside a table cell and closed after the table
    UnbalancedLoop,
    /// Sections are nested deeper than the engine renders
    NestingTooDeep,
}

impl TagErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagErrorKind::UndefinedTag => "undefined_tag",
            TagErrorKind::ValueTypeMismatch => "value_type_mismatch",
            TagErrorKind::LoopTypeMismatch => "loop_type_mismatch",
            TagErrorKind::UnclosedTag => "unclosed_tag",
            TagErrorKind::UnopenedTag => "unopened_tag",
            TagErrorKind::EmptyTag => "empty_tag",
            TagErrorKind::UnclosedLoop => "unclosed_loop",
            TagErrorKind::UnopenedLoop => "unopened_loop",
            TagErrorKind::ClosingTagDoesNotMatchOpeningTag => {
                "closing_tag_does_not_match_opening_tag"
            }
            TagErrorKind::UnbalancedLoop => "unbalanced_loop",
            TagErrorKind::NestingTooDeep => "nesting_too_deep",
        }
    }
}

impl std::fmt::Display for TagErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single tag problem found while rendering (caller-actionable)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagError {
    /// Stable identifier of the problem class
    pub id: TagErrorKind,
    /// Tag name as written in the template, without delimiters or prefix
    pub tag: String,
    /// Human-readable reason
    pub explanation: String,
    /// Package part the tag lives in, e.g. `word/document.xml`
    pub part: String,
}

impl TagError {
    pub fn new(
        id: TagErrorKind,
        tag: impl Into<String>,
        explanation: impl Into<String>,
        part: impl Into<String>,
    ) -> Self {
        Self {
            id,
            tag: tag.into(),
            explanation: explanation.into(),
            part: part.into(),
        }
    }

    pub fn undefined(tag: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::UndefinedTag,
            tag,
            format!("The tag \"{}\" has no value in the supplied data", tag),
            part,
        )
    }

    pub fn value_type_mismatch(tag: &str, found: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::ValueTypeMismatch,
            tag,
            format!(
                "The tag \"{}\" resolves to {} which cannot be rendered as text",
                tag, found
            ),
            part,
        )
    }

    pub fn loop_type_mismatch(tag: &str, found: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::LoopTypeMismatch,
            tag,
            format!(
                "The section \"{}\" resolves to {}; expected a list, an object or a boolean",
                tag, found
            ),
            part,
        )
    }

    pub fn unclosed_tag(text: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::UnclosedTag,
            text,
            format!("The tag beginning with \"{{{}\" is not closed", text),
            part,
        )
    }

    pub fn unopened_tag(text: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::UnopenedTag,
            text,
            format!("The tag ending with \"{}}}\" has no opening delimiter", text),
            part,
        )
    }

    pub fn empty_tag(text: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::EmptyTag,
            text,
            format!("The tag \"{{{}}}\" has no name", text),
            part,
        )
    }

    pub fn unclosed_loop(tag: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::UnclosedLoop,
            tag,
            format!("The section \"{}\" is opened but never closed", tag),
            part,
        )
    }

    pub fn unopened_loop(tag: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::UnopenedLoop,
            tag,
            format!("The section \"{}\" is closed but was never opened", tag),
            part,
        )
    }

    pub fn closing_mismatch(opened: &str, closed: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::ClosingTagDoesNotMatchOpeningTag,
            closed,
            format!(
                "The section \"{}\" is closed by \"{{/{}}}\"",
                opened, closed
            ),
            part,
        )
    }

    pub fn unbalanced_loop(tag: &str, part: &str) -> Self {
        Self::new(
            TagErrorKind::UnbalancedLoop,
            tag,
            format!(
                "The section \"{}\" spans document structure it does not close, \
                 move both tags into the same paragraph, cell or row",
                tag
            ),
            part,
        )
    }

    pub fn nesting_too_deep(tag: &str, limit: usize, part: &str) -> Self {
        Self::new(
            TagErrorKind::NestingTooDeep,
            tag,
            format!(
                "The section \"{}\" is nested more than {} levels deep",
                tag, limit
            ),
            part,
        )
    }
}

/// Engine failures, one variant per failure class
#[derive(Error, Debug)]
pub enum EngineError {
    /// The template bytes are not a usable Word package
    #[error("Invalid archive: {0}")]
    InvalidArchive(String),

    /// One or more tags could not be rendered; every problem is listed
    #[error("Template has {} unresolved or invalid tag(s)", .0.len())]
    Template(Vec<TagError>),

    /// Re-packing the rendered document failed
    #[error("Failed to write document package: {0}")]
    Serialize(String),
}

impl EngineError {
    /// Tag details for template errors, empty otherwise
    pub fn tag_errors(&self) -> &[TagError] {
        match self {
            EngineError::Template(errors) => errors,
            _ => &[],
        }
    }
}
