//! Byte-level XML tokenizer
//!
//! Splits an XML part into markup and character data without building a
//! tree. Every byte of the input ends up in exactly one token, so joining
//! the tokens reproduces the part unchanged.

/// A raw slice of an XML part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlToken<'a> {
    /// Anything between `<` and the matching `>`, delimiters included
    Markup(&'a str),
    /// Character data, still entity-escaped
    Text(&'a str),
}

/// WordprocessingML elements the engine cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element {
    ParagraphStart,
    ParagraphEnd,
    TextStart,
    TextEnd,
    RowStart,
    RowEnd,
    CellStart,
    CellEnd,
    Break,
    Other,
}

/// Which side of an element a markup token is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Open,
    Close,
    /// Self-closing, e.g. `<w:p/>`
    Empty,
}

/// Tokenize an XML document
pub fn tokenize(xml: &str) -> Vec<XmlToken<'_>> {
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < xml.len() {
        if xml.as_bytes()[pos] == b'<' {
            let end = markup_end(xml, pos);
            tokens.push(XmlToken::Markup(&xml[pos..end]));
            pos = end;
        } else {
            let next = xml[pos..].find('<').map_or(xml.len(), |i| pos + i);
            tokens.push(XmlToken::Text(&xml[pos..next]));
            pos = next;
        }
    }

    tokens
}

/// Find the byte offset just past the markup starting at `start`
fn markup_end(xml: &str, start: usize) -> usize {
    let rest = &xml[start..];

    let terminator = if rest.starts_with("<!--") {
        Some("-->")
    } else if rest.starts_with("<![CDATA[") {
        Some("]]>")
    } else if rest.starts_with("<?") {
        Some("?>")
    } else {
        None
    };
    if let Some(terminator) = terminator {
        return rest
            .find(terminator)
            .map_or(xml.len(), |i| start + i + terminator.len());
    }

    // Attribute values may legally contain '>'
    let mut quote: Option<u8> = None;
    for (offset, &byte) in rest.as_bytes().iter().enumerate().skip(1) {
        match quote {
            Some(q) if byte == q => quote = None,
            Some(_) => {}
            None if byte == b'"' || byte == b'\'' => quote = Some(byte),
            None if byte == b'>' => return start + offset + 1,
            None => {}
        }
    }

    xml.len()
}

/// Element name and edge of a markup token
///
/// Comments, CDATA sections, declarations and processing instructions
/// have no edge.
pub fn element_edge(markup: &str) -> Option<(&str, Edge)> {
    let inner = markup.strip_prefix('<')?;
    if inner.starts_with('!') || inner.starts_with('?') {
        return None;
    }

    let (edge, inner) = match inner.strip_prefix('/') {
        Some(rest) => (Edge::Close, rest),
        None if markup.ends_with("/>") => (Edge::Empty, inner),
        None => (Edge::Open, inner),
    };
    let name = inner
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or("");

    if name.is_empty() {
        None
    } else {
        Some((name, edge))
    }
}

/// Classify a markup token
pub fn classify(markup: &str) -> Element {
    let Some((name, edge)) = element_edge(markup) else {
        return Element::Other;
    };

    match (name, edge) {
        ("w:br", Edge::Empty) => Element::Break,
        (_, Edge::Empty) => Element::Other,
        ("w:p", Edge::Open) => Element::ParagraphStart,
        ("w:p", Edge::Close) => Element::ParagraphEnd,
        ("w:t", Edge::Open) => Element::TextStart,
        ("w:t", Edge::Close) => Element::TextEnd,
        ("w:tr", Edge::Open) => Element::RowStart,
        ("w:tr", Edge::Close) => Element::RowEnd,
        ("w:tc", Edge::Open) => Element::CellStart,
        ("w:tc", Edge::Close) => Element::CellEnd,
        _ => Element::Other,
    }
}

/// Give every table cell left without a paragraph an empty one
///
/// A `<w:tc>` must contain at least one paragraph, and a section that
/// repeats zero times can remove all of them.
pub fn ensure_cell_paragraphs(xml: String) -> String {
    if !xml.contains("<w:tc") {
        return xml;
    }

    let mut out = String::with_capacity(xml.len() + 16);
    let mut cells: Vec<bool> = Vec::new();

    for token in tokenize(&xml) {
        let raw = match token {
            XmlToken::Markup(markup) => {
                match element_edge(markup) {
                    Some(("w:tc", Edge::Open)) => cells.push(false),
                    Some(("w:p", Edge::Open | Edge::Empty)) => {
                        if let Some(has_paragraph) = cells.last_mut() {
                            *has_paragraph = true;
                        }
                    }
                    Some(("w:tc", Edge::Close)) => {
                        if cells.pop() == Some(false) {
                            out.push_str("<w:p/>");
                        }
                    }
                    _ => {}
                }
                markup
            }
            XmlToken::Text(text) => text,
        };
        out.push_str(raw);
    }

    out
}

/// Add `xml:space="preserve"` to a `<w:t>` start tag that lacks it
pub fn preserve_space(markup: &mut String) {
    if markup.contains("xml:space") {
        return;
    }
    let insert_at = if markup.ends_with("/>") {
        markup.len() - 2
    } else {
        markup.len() - 1
    };
    markup.insert_str(insert_at, " xml:space=\"preserve\"");
}

/// Escape character data for inclusion in a text node
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// Resolve the predefined and numeric entities of escaped character data
///
/// Unknown entities are kept verbatim.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp..];

        let decoded = after.find(';').and_then(|semi| {
            let entity = &after[1..semi];
            let c = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse().ok()))
                    .and_then(char::from_u32),
            };
            c.map(|c| (c, semi + 1))
        });

        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = &after[1..];
            }
        }
    }

    out.push_str(rest);
    out
}
