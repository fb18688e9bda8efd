//! Section tree construction
//!
//! Turns the flat token stream into nested sections. Structural problems
//! are recorded and parsing continues, so one pass reports every
//! unbalanced section of the part.

use super::lexer::{TagKind, TagToken, Token};
use super::xml::{element_edge, tokenize, Edge, XmlToken};
use crate::compiler::TagError;

/// Deepest accepted section nesting
pub const MAX_SECTION_DEPTH: usize = 256;

/// A node of the parsed template
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Verbatim XML
    Xml(String),
    /// `{name}`
    Value(TagToken),
    /// `{#name}…{/name}` or `{^name}…{/name}`
    Section {
        tag: TagToken,
        inverted: bool,
        body: Vec<Node>,
    },
}

/// Element structure crossed by a section body
///
/// A body may close elements opened before the section and reopen the
/// same ones before its end, which is what an inline section spanning
/// paragraphs looks like. Anything else would duplicate or drop markup
/// when the section repeats.
#[derive(Debug, Default)]
struct Balance {
    opened: Vec<String>,
    closed_outside: Vec<String>,
    broken: bool,
}

impl Balance {
    fn track(&mut self, xml: &str) {
        if self.broken {
            return;
        }
        for token in tokenize(xml) {
            let XmlToken::Markup(markup) = token else {
                continue;
            };
            match element_edge(markup) {
                Some((name, Edge::Open)) => self.opened.push(name.to_string()),
                Some((name, Edge::Close)) => match self.opened.last() {
                    None => self.closed_outside.push(name.to_string()),
                    Some(top) if top == name => {
                        self.opened.pop();
                    }
                    Some(_) => {
                        self.broken = true;
                        return;
                    }
                },
                _ => {}
            }
        }
    }

    fn is_balanced(&self) -> bool {
        !self.broken && self.opened.iter().eq(self.closed_outside.iter().rev())
    }
}

struct OpenSection {
    tag: TagToken,
    body: Vec<Node>,
    balance: Balance,
}

impl OpenSection {
    fn close(self) -> Node {
        let inverted = self.tag.kind == TagKind::InvertedOpen;
        Node::Section {
            tag: self.tag,
            inverted,
            body: self.body,
        }
    }
}

/// Parse tokens into a section tree
pub fn parse(part: &str, tokens: Vec<Token>) -> (Vec<Node>, Vec<TagError>) {
    let mut root = Vec::new();
    let mut stack: Vec<OpenSection> = Vec::new();
    let mut errors = Vec::new();
    // Sections dropped for exceeding the depth limit and not yet closed
    let mut too_deep = 0usize;

    for token in tokens {
        let node = match token {
            Token::Xml(xml) if xml.is_empty() => continue,
            Token::Xml(xml) => {
                if let Some(open) = stack.last_mut() {
                    open.balance.track(&xml);
                }
                Node::Xml(xml)
            }
            Token::Tag(tag) => match tag.kind {
                TagKind::Value => Node::Value(tag),
                TagKind::SectionOpen | TagKind::InvertedOpen => {
                    if stack.len() >= MAX_SECTION_DEPTH {
                        errors.push(TagError::nesting_too_deep(
                            &tag.name,
                            MAX_SECTION_DEPTH,
                            part,
                        ));
                        too_deep += 1;
                        continue;
                    }
                    stack.push(OpenSection {
                        tag,
                        body: Vec::new(),
                        balance: Balance::default(),
                    });
                    continue;
                }
                TagKind::SectionClose if too_deep > 0 => {
                    too_deep -= 1;
                    continue;
                }
                TagKind::SectionClose => {
                    let Some(open) = stack.pop() else {
                        errors.push(TagError::unopened_loop(&tag.name, part));
                        continue;
                    };
                    if open.tag.name != tag.name {
                        errors.push(TagError::closing_mismatch(&open.tag.name, &tag.name, part));
                    } else if !open.balance.is_balanced() {
                        errors.push(TagError::unbalanced_loop(&open.tag.name, part));
                    }
                    open.close()
                }
            },
        };

        match stack.last_mut() {
            Some(open) => open.body.push(node),
            None => root.push(node),
        }
    }

    // Fold anything left open back into the tree after reporting it
    let mut unclosed = Vec::new();
    while let Some(open) = stack.pop() {
        unclosed.push(TagError::unclosed_loop(&open.tag.name, part));
        let node = open.close();
        match stack.last_mut() {
            Some(parent) => parent.body.push(node),
            None => root.push(node),
        }
    }
    unclosed.reverse();
    errors.extend(unclosed);

    (root, errors)
}
