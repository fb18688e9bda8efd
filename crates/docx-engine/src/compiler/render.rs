//! Core rendering logic
//!
//! Opens the package, renders every templated part against the data
//! record and re-packs the result. Tag problems from all parts are
//! collected and returned together; nothing is written unless every
//! part rendered cleanly.

use serde_json::Value;
use tracing::{debug, warn};

use super::errors::{EngineError, TagError};
use super::RenderOptions;
use crate::package::TemplatePackage;
use crate::template::expand::widen_sections;
use crate::template::lexer::{lex, TagToken};
use crate::template::parser::{parse, Node};
use crate::template::{scope, xml};

/// Markup that ends the current text element, breaks the line, and
/// reopens a text element
const LINE_BREAK: &str = r#"</w:t><w:br/><w:t xml:space="preserve">"#;

/// Render a template package with a data record
pub fn render_document(
    template: &[u8],
    data: &Value,
    options: &RenderOptions,
) -> Result<Vec<u8>, EngineError> {
    let mut package = TemplatePackage::open(template)?;

    let mut errors = Vec::new();
    let mut rendered = Vec::new();

    for name in package.templated_parts() {
        let source = package.xml_part(&name)?;
        match render_part(&name, source, data, options) {
            Ok(output) => rendered.push((name, output)),
            Err(mut part_errors) => errors.append(&mut part_errors),
        }
    }

    if !errors.is_empty() {
        warn!("Template render failed with {} tag error(s)", errors.len());
        return Err(EngineError::Template(errors));
    }

    for (name, output) in rendered {
        debug!("Rendered part {} ({} bytes)", name, output.len());
        package.insert_part(&name, output.into_bytes());
    }

    package.save()
}

/// Render one XML part, returning every tag problem found in it
pub fn render_part(
    part: &str,
    source: &str,
    data: &Value,
    options: &RenderOptions,
) -> Result<String, Vec<TagError>> {
    let mut lexed = lex(part, source);
    let mut errors = std::mem::take(&mut lexed.errors);

    let (nodes, structure_errors) = parse(part, widen_sections(lexed, options));
    errors.extend(structure_errors);

    let mut renderer = PartRenderer {
        part,
        linebreaks: options.linebreaks,
        errors,
    };
    let mut output = String::with_capacity(source.len());
    let mut scopes = vec![data];
    renderer.render(&nodes, &mut scopes, &mut output);

    if renderer.errors.is_empty() {
        Ok(xml::ensure_cell_paragraphs(output))
    } else {
        Err(renderer.errors)
    }
}

struct PartRenderer<'p> {
    part: &'p str,
    linebreaks: bool,
    errors: Vec<TagError>,
}

impl PartRenderer<'_> {
    fn render<'d>(&mut self, nodes: &[Node], scopes: &mut Vec<&'d Value>, out: &mut String) {
        for node in nodes {
            match node {
                Node::Xml(raw) => out.push_str(raw),
                Node::Value(tag) => self.render_value(tag, scopes, out),
                Node::Section {
                    tag,
                    inverted,
                    body,
                } => self.render_section(tag, *inverted, body, scopes, out),
            }
        }
    }

    fn render_value(&mut self, tag: &TagToken, scopes: &[&Value], out: &mut String) {
        let text = match scope::lookup(scopes, &tag.name) {
            None => {
                self.errors.push(TagError::undefined(&tag.name, self.part));
                return;
            }
            Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Bool(b)) => b.to_string(),
            Some(value @ (Value::Array(_) | Value::Object(_))) => {
                self.errors.push(TagError::value_type_mismatch(
                    &tag.name,
                    scope::describe(value),
                    self.part,
                ));
                return;
            }
        };

        self.write_text(&text, out);
    }

    fn render_section<'d>(
        &mut self,
        tag: &TagToken,
        inverted: bool,
        body: &[Node],
        scopes: &mut Vec<&'d Value>,
        out: &mut String,
    ) {
        let value = scope::lookup(scopes, &tag.name);

        if inverted {
            if scope::is_falsy(value) {
                self.render(body, scopes, out);
            }
            return;
        }

        match value {
            None => self.errors.push(TagError::undefined(&tag.name, self.part)),
            Some(Value::Null) | Some(Value::Bool(false)) => {}
            Some(Value::Bool(true)) => self.render(body, scopes, out),
            Some(Value::Array(items)) => {
                for item in items {
                    scopes.push(item);
                    self.render(body, scopes, out);
                    scopes.pop();
                }
            }
            Some(object @ Value::Object(_)) => {
                scopes.push(object);
                self.render(body, scopes, out);
                scopes.pop();
            }
            Some(other @ (Value::String(_) | Value::Number(_))) => {
                self.errors.push(TagError::loop_type_mismatch(
                    &tag.name,
                    scope::describe(other),
                    self.part,
                ));
            }
        }
    }

    fn write_text(&self, text: &str, out: &mut String) {
        if !self.linebreaks {
            out.push_str(&xml::escape(text));
            return;
        }

        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                out.push_str(LINE_BREAK);
            }
            out.push_str(&xml::escape(line.strip_suffix('\r').unwrap_or(line)));
        }
    }
}
