//! Section boundary widening
//!
//! A section normally repeats exactly the markup between its two tags.
//! Two layouts are widened before parsing:
//!
//! - table-row loop: the tags sit in different cells of one table row, so
//!   the whole row repeats.
//! - paragraph loop: each tag is alone in its own paragraph, so the tag
//!   paragraphs are dropped and the paragraphs between them repeat.

use std::collections::HashMap;

use super::lexer::{LexedPart, Span, TagKind, TagToken, Token};
use crate::compiler::RenderOptions;

/// Token moves and drops to apply in one pass
struct Plan {
    dropped: Vec<bool>,
    moved: Vec<bool>,
    before: HashMap<usize, Vec<usize>>,
    after: HashMap<usize, Vec<usize>>,
}

impl Plan {
    fn new(len: usize) -> Self {
        Self {
            dropped: vec![false; len],
            moved: vec![false; len],
            before: HashMap::new(),
            after: HashMap::new(),
        }
    }

    fn move_before(&mut self, anchor: usize, token: usize) {
        self.moved[token] = true;
        self.before.entry(anchor).or_default().push(token);
    }

    fn move_after(&mut self, anchor: usize, token: usize) {
        self.moved[token] = true;
        // Later (inner) sections close first
        self.after.entry(anchor).or_default().insert(0, token);
    }

    fn drop_range(&mut self, start: usize, end: usize) {
        for flag in &mut self.dropped[start..=end] {
            *flag = true;
        }
    }

    fn apply(self, tokens: Vec<Token>) -> Vec<Token> {
        let mut slots: Vec<Option<Token>> = tokens.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(slots.len());

        for i in 0..slots.len() {
            if let Some(list) = self.before.get(&i) {
                out.extend(list.iter().filter_map(|&j| slots[j].take()));
            }
            if !self.dropped[i] && !self.moved[i] {
                if let Some(token) = slots[i].take() {
                    out.push(token);
                }
            }
            if let Some(list) = self.after.get(&i) {
                out.extend(list.iter().filter_map(|&j| slots[j].take()));
            }
        }

        out
    }
}

/// Pair well-nested section tags by token index, ordered by opening tag
fn section_pairs(tokens: &[Token]) -> Vec<(usize, usize)> {
    let mut stack: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();

    for (index, token) in tokens.iter().enumerate() {
        let Token::Tag(tag) = token else { continue };
        if tag.is_open() {
            stack.push(index);
        } else if tag.kind == TagKind::SectionClose {
            let matches_top = stack
                .last()
                .and_then(|&open| tag_at(tokens, open))
                .is_some_and(|open| open.name == tag.name);
            if matches_top {
                if let Some(open) = stack.pop() {
                    pairs.push((open, index));
                }
            }
        }
    }

    pairs.sort_unstable();
    pairs
}

fn tag_at(tokens: &[Token], index: usize) -> Option<&TagToken> {
    match tokens.get(index) {
        Some(Token::Tag(tag)) => Some(tag),
        _ => None,
    }
}

fn closed_span(spans: &[Span], id: Option<usize>) -> Option<(&Span, usize)> {
    let span = spans.get(id?)?;
    span.end.map(|end| (span, end))
}

/// Widen sections to rows or paragraphs where the layout calls for it
pub fn widen_sections(lexed: LexedPart, options: &RenderOptions) -> Vec<Token> {
    let LexedPart {
        tokens,
        paragraphs,
        rows,
        ..
    } = lexed;

    let pairs = section_pairs(&tokens);
    if pairs.is_empty() {
        return tokens;
    }

    let mut plan = Plan::new(tokens.len());

    for (open_index, close_index) in pairs {
        let (Some(open), Some(close)) = (tag_at(&tokens, open_index), tag_at(&tokens, close_index))
        else {
            continue;
        };

        if open.row.is_some() && open.row == close.row && open.cell != close.cell {
            if let Some((row, end)) = closed_span(&rows, open.row) {
                plan.move_before(row.start, open_index);
                plan.move_after(end, close_index);
                continue;
            }
        }

        if options.paragraph_loop && open.paragraph != close.paragraph {
            if let (Some((first, first_end)), Some((last, last_end))) = (
                closed_span(&paragraphs, open.paragraph),
                closed_span(&paragraphs, close.paragraph),
            ) {
                if first.holds_single_tag() && last.holds_single_tag() && first_end < last.start {
                    plan.drop_range(first.start, first_end);
                    plan.move_before(first.start, open_index);
                    plan.drop_range(last.start, last_end);
                    plan.move_before(last.start, close_index);
                }
            }
        }
    }

    plan.apply(tokens)
}
