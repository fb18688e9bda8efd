//! Visible text extraction from a rendered package
//!
//! Reads the main document part and returns its text with one line per
//! paragraph. Hard line breaks (`<w:br/>`) become `\n` as well.

use crate::compiler::EngineError;
use crate::package::{TemplatePackage, MAIN_DOCUMENT_PART};
use crate::template::xml::{self, Element, XmlToken};

/// Extract the text of the main document
pub fn extract_text(bytes: &[u8]) -> Result<String, EngineError> {
    let package = TemplatePackage::open(bytes)?;
    let source = package.xml_part(MAIN_DOCUMENT_PART)?;
    Ok(text_of(source))
}

/// Text of a WordprocessingML part
pub fn text_of(source: &str) -> String {
    let mut text = String::new();
    let mut in_text = false;

    for token in xml::tokenize(source) {
        match token {
            XmlToken::Markup(markup) => match xml::classify(markup) {
                Element::TextStart => in_text = true,
                Element::TextEnd => in_text = false,
                Element::Break => text.push('\n'),
                Element::ParagraphEnd => text.push('\n'),
                _ => {}
            },
            XmlToken::Text(chars) if in_text => text.push_str(&xml::unescape(chars)),
            XmlToken::Text(_) => {}
        }
    }

    text
}
