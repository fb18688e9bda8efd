//! Tag discovery inside WordprocessingML
//!
//! Word splits text into runs wherever formatting, spell-check state or
//! revision marks change, so `{Name}` is often stored as `{`, `Na`, `me}`
//! in three `<w:t>` elements. The lexer walks the character data of every
//! `<w:t>` in order, reassembles delimiters across runs, and leaves each
//! complete tag at the position of its opening brace. The characters that
//! followed in later runs are removed from those runs.
//!
//! Paragraph and table-row boundaries are recorded so that section tags
//! can later be widened to whole paragraphs or rows.

use super::xml::{self, Element, XmlToken};
use crate::compiler::TagError;

/// Role of a tag, given by its prefix character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// `{name}`
    Value,
    /// `{#name}`
    SectionOpen,
    /// `{^name}`
    InvertedOpen,
    /// `{/name}`
    SectionClose,
}

/// A complete tag found in the template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagToken {
    pub kind: TagKind,
    /// Name without prefix, trimmed and unescaped
    pub name: String,
    /// Innermost enclosing paragraph
    pub paragraph: Option<usize>,
    /// Innermost enclosing table row
    pub row: Option<usize>,
    /// Innermost enclosing table cell
    pub cell: Option<usize>,
}

impl TagToken {
    pub fn is_open(&self) -> bool {
        matches!(self.kind, TagKind::SectionOpen | TagKind::InvertedOpen)
    }
}

/// Parse the text between delimiters into a kind and a name
pub fn parse_tag(text: &str) -> Option<(TagKind, &str)> {
    let text = text.trim();
    let (kind, name) = if let Some(rest) = text.strip_prefix('#') {
        (TagKind::SectionOpen, rest)
    } else if let Some(rest) = text.strip_prefix('^') {
        (TagKind::InvertedOpen, rest)
    } else if let Some(rest) = text.strip_prefix('/') {
        (TagKind::SectionClose, rest)
    } else {
        (TagKind::Value, text)
    };

    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some((kind, name))
    }
}

/// Lexer output unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Markup or character data copied to the output verbatim
    Xml(String),
    Tag(TagToken),
}

/// Token range of a paragraph or a table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Index of the start element token
    pub start: usize,
    /// Index of the end element token, `None` when never closed
    pub end: Option<usize>,
    /// Number of tags directly inside
    pub tags: usize,
    /// Whether any non-whitespace text sits outside tags
    pub has_text: bool,
}

impl Span {
    fn open(start: usize) -> Self {
        Self {
            start,
            end: None,
            tags: 0,
            has_text: false,
        }
    }

    /// A closed paragraph holding one tag and nothing else
    pub fn holds_single_tag(&self) -> bool {
        self.end.is_some() && self.tags == 1 && !self.has_text
    }
}

/// Result of lexing one XML part
#[derive(Debug, Clone)]
pub struct LexedPart {
    pub tokens: Vec<Token>,
    pub paragraphs: Vec<Span>,
    pub rows: Vec<Span>,
    pub errors: Vec<TagError>,
}

/// A tag whose closing delimiter has not been seen yet
struct PendingTag {
    /// Token index reserved for the finished tag
    slot: usize,
    /// Token index of the `<w:t>` holding the opening brace
    text_start: Option<usize>,
    raw: String,
    paragraph: Option<usize>,
    row: Option<usize>,
    cell: Option<usize>,
}

struct Lexer<'p> {
    part: &'p str,
    tokens: Vec<Token>,
    paragraphs: Vec<Span>,
    rows: Vec<Span>,
    errors: Vec<TagError>,
    open_paragraphs: Vec<usize>,
    open_rows: Vec<usize>,
    open_cells: Vec<usize>,
    cell_count: usize,
    in_text: bool,
    text_start: Option<usize>,
    pending: Option<PendingTag>,
}

/// Lex an XML part into verbatim XML and tags
pub fn lex(part: &str, source: &str) -> LexedPart {
    let mut lexer = Lexer {
        part,
        tokens: Vec::new(),
        paragraphs: Vec::new(),
        rows: Vec::new(),
        errors: Vec::new(),
        open_paragraphs: Vec::new(),
        open_rows: Vec::new(),
        open_cells: Vec::new(),
        cell_count: 0,
        in_text: false,
        text_start: None,
        pending: None,
    };

    for token in xml::tokenize(source) {
        match token {
            XmlToken::Markup(markup) => lexer.markup(markup),
            XmlToken::Text(text) => lexer.text(text),
        }
    }
    lexer.abandon_pending();

    LexedPart {
        tokens: lexer.tokens,
        paragraphs: lexer.paragraphs,
        rows: lexer.rows,
        errors: lexer.errors,
    }
}

impl Lexer<'_> {
    fn markup(&mut self, markup: &str) {
        let index = self.tokens.len();

        match xml::classify(markup) {
            Element::ParagraphStart => {
                self.open_paragraphs.push(self.paragraphs.len());
                self.paragraphs.push(Span::open(index));
            }
            Element::ParagraphEnd => {
                // Tags never span paragraphs
                self.abandon_pending();
                if let Some(id) = self.open_paragraphs.pop() {
                    self.paragraphs[id].end = Some(index);
                }
            }
            Element::TextStart => {
                self.in_text = true;
                self.text_start = Some(index);
            }
            Element::TextEnd => {
                self.in_text = false;
                self.text_start = None;
            }
            Element::RowStart => {
                self.open_rows.push(self.rows.len());
                self.rows.push(Span::open(index));
            }
            Element::RowEnd => {
                if let Some(id) = self.open_rows.pop() {
                    self.rows[id].end = Some(index);
                }
            }
            Element::CellStart => {
                self.open_cells.push(self.cell_count);
                self.cell_count += 1;
            }
            Element::CellEnd => {
                self.open_cells.pop();
            }
            Element::Break | Element::Other => {}
        }

        self.tokens.push(Token::Xml(markup.to_string()));
    }

    fn text(&mut self, text: &str) {
        if !self.in_text {
            self.tokens.push(Token::Xml(text.to_string()));
            return;
        }

        let mut plain_start = 0;
        for (i, c) in text.char_indices() {
            match c {
                '{' => {
                    match self.pending.take() {
                        Some(pending) => self.report_unclosed(pending),
                        None => self.plain(&text[plain_start..i]),
                    }
                    self.begin_tag();
                    plain_start = i + 1;
                }
                '}' => match self.pending.take() {
                    Some(pending) => {
                        self.finish_tag(pending);
                        plain_start = i + 1;
                    }
                    None => {
                        let before = xml::unescape(&text[plain_start..i]);
                        self.errors
                            .push(TagError::unopened_tag(before.trim(), self.part));
                    }
                },
                _ => {
                    if let Some(pending) = self.pending.as_mut() {
                        pending.raw.push(c);
                    }
                }
            }
        }

        if self.pending.is_none() {
            self.plain(&text[plain_start..]);
        }
    }

    fn plain(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if !text.trim().is_empty() {
            if let Some(&id) = self.open_paragraphs.last() {
                self.paragraphs[id].has_text = true;
            }
        }
        self.tokens.push(Token::Xml(text.to_string()));
    }

    fn begin_tag(&mut self) {
        let slot = self.tokens.len();
        self.tokens.push(Token::Xml(String::new()));
        self.pending = Some(PendingTag {
            slot,
            text_start: self.text_start,
            raw: String::new(),
            paragraph: self.open_paragraphs.last().copied(),
            row: self.open_rows.last().copied(),
            cell: self.open_cells.last().copied(),
        });
    }

    fn finish_tag(&mut self, pending: PendingTag) {
        let text = xml::unescape(&pending.raw);
        let Some((kind, name)) = parse_tag(&text) else {
            self.errors
                .push(TagError::empty_tag(text.trim(), self.part));
            return;
        };

        self.tokens[pending.slot] = Token::Tag(TagToken {
            kind,
            name: name.to_string(),
            paragraph: pending.paragraph,
            row: pending.row,
            cell: pending.cell,
        });

        if let Some(id) = pending.paragraph {
            self.paragraphs[id].tags += 1;
        }
        if let Some(Token::Xml(markup)) = pending.text_start.map(|i| &mut self.tokens[i]) {
            xml::preserve_space(markup);
        }
    }

    fn report_unclosed(&mut self, pending: PendingTag) {
        let text = xml::unescape(&pending.raw);
        self.errors
            .push(TagError::unclosed_tag(text.trim(), self.part));
    }

    fn abandon_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.report_unclosed(pending);
        }
    }
}
