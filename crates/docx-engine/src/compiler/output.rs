//! Output document format

/// MIME type of a rendered Word document
pub const DOCX_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// File extension of a rendered Word document, without the dot
pub const DOCX_EXTENSION: &str = "docx";
