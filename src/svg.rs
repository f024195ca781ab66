//! SVG document model used by image optimization and the sprite task.
//!
//! Documents are read with `quick-xml` into a small element tree, rewritten
//! in place, and serialized back. Comments, processing instructions, the XML
//! declaration, doctypes and whitespace-only text never make it into the
//! tree.

use crate::config::SvgOptions;
use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::HashSet;
use thiserror::Error;

pub const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Namespace prefixes written by vector editors.
const EDITOR_PREFIXES: &[&str] = &["sodipodi", "inkscape", "sketch", "serif"];

/// Error reading or writing an SVG document
#[derive(Debug, Error)]
pub enum SvgError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("invalid attribute: {0}")]
    Attribute(#[from] AttrError),
    #[error("write error: {0}")]
    Io(#[from] std::io::Error),
    #[error("document has no root element")]
    NoRoot,
    #[error("unexpected closing tag </{0}>")]
    UnbalancedTag(String),
}

/// A node in the document tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    /// Escaped character data, written back as-is
    Text(String),
    CData(String),
}

/// An element with ordered attributes (values unescaped)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: &str) -> Self {
        Self { name: name.to_string(), attributes: Vec::new(), children: Vec::new() }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value in place.
    pub fn set_attr(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        let pos = self.attributes.iter().position(|(k, _)| k == key)?;
        Some(self.attributes.remove(pos).1)
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Apply `f` to this element and every descendant, parents first.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.walk_mut(f);
            }
        }
    }

    /// Drop every descendant element for which `keep` returns false.
    pub fn retain_elements(&mut self, keep: &impl Fn(&Element) -> bool) {
        self.children.retain(|n| match n {
            Node::Element(e) => keep(e),
            _ => true,
        });
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.retain_elements(keep);
            }
        }
    }

    /// The element's viewBox, or one derived from plain numeric width/height.
    pub fn view_box(&self) -> Option<String> {
        if let Some(vb) = self.attr("viewBox") {
            return Some(vb.to_string());
        }
        let width = parse_length(self.attr("width")?)?;
        let height = parse_length(self.attr("height")?)?;
        Some(format!("0 0 {} {}", format_number(width), format_number(height)))
    }
}

fn parse_length(value: &str) -> Option<f64> {
    value.trim().trim_end_matches("px").parse().ok()
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn name_of(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn element_from(start: &BytesStart<'_>) -> Result<Element, SvgError> {
    let mut element = Element::new(&name_of(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr?;
        let value = attr.unescape_value()?;
        element.attributes.push((name_of(attr.key.as_ref()), value.into_owned()));
    }
    Ok(element)
}

/// Parse a document into its root element.
pub fn parse(source: &str) -> Result<Element, SvgError> {
    let mut reader = Reader::from_str(source);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let node = match reader.read_event()? {
            Event::Start(start) => {
                stack.push(element_from(&start)?);
                continue;
            }
            Event::End(end) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| SvgError::UnbalancedTag(name_of(end.name().as_ref())))?;
                Node::Element(element)
            }
            Event::Empty(start) => Node::Element(element_from(&start)?),
            Event::Text(text) => Node::Text(String::from_utf8_lossy(&text).into_owned()),
            Event::CData(data) => Node::CData(String::from_utf8_lossy(&data).into_owned()),
            Event::Eof => break,
            _ => continue,
        };

        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None => {
                if let Node::Element(element) = node {
                    if root.is_none() {
                        root = Some(element);
                    }
                }
            }
        }
    }

    root.ok_or(SvgError::NoRoot)
}

/// Serialize an element tree. `indent` of `None` writes compact markup.
pub fn write(root: &Element, indent: Option<usize>) -> Result<String, SvgError> {
    let mut writer = match indent {
        Some(n) => Writer::new_with_indent(Vec::new(), b' ', n),
        None => Writer::new(Vec::new()),
    };
    write_element(&mut writer, root)?;
    let mut out = String::from_utf8_lossy(&writer.into_inner()).into_owned();
    out.push('\n');
    Ok(out)
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<(), SvgError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(text) => writer.write_event(Event::Text(BytesText::from_escaped(text.as_str())))?,
            Node::CData(data) => writer.write_event(Event::CData(BytesCData::new(data.as_str())))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;
    Ok(())
}

fn is_editor_name(name: &str) -> bool {
    let name = name.strip_prefix("xmlns:").unwrap_or(name);
    let prefix = name.split_once(':').map_or(name, |(p, _)| p);
    EDITOR_PREFIXES.contains(&prefix)
}

/// Remove editor metadata elements, editor namespaces and their attributes.
pub fn strip_editor_data(root: &mut Element) {
    root.retain_elements(&|e| e.name != "metadata" && !is_editor_name(&e.name));
    root.walk_mut(&mut |e| e.attributes.retain(|(k, _)| !is_editor_name(k)));
}

/// Drop a root viewBox that only restates `0 0 width height`.
pub fn remove_redundant_view_box(root: &mut Element) {
    let (Some(width), Some(height)) =
        (root.attr("width").and_then(parse_length), root.attr("height").and_then(parse_length))
    else {
        return;
    };
    let Some(view_box) = root.attr("viewBox") else {
        return;
    };
    let parts: Vec<f64> = view_box
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    if parts == [0.0, 0.0, width, height] {
        root.remove_attr("viewBox");
    }
}

/// Collect ids referenced via `#id` from attribute values and text.
fn referenced_ids(root: &Element) -> HashSet<String> {
    fn scan(value: &str, ids: &mut HashSet<String>) {
        for (i, _) in value.match_indices('#') {
            let id: String = value[i + 1..]
                .chars()
                .take_while(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
                .collect();
            if !id.is_empty() {
                ids.insert(id);
            }
        }
    }
    fn visit(element: &Element, ids: &mut HashSet<String>) {
        for (_, value) in &element.attributes {
            scan(value, ids);
        }
        for child in &element.children {
            match child {
                Node::Element(e) => visit(e, ids),
                Node::Text(t) | Node::CData(t) => scan(t, ids),
            }
        }
    }
    let mut ids = HashSet::new();
    visit(root, &mut ids);
    ids
}

/// Remove `id` attributes nothing in the document references.
pub fn cleanup_ids(root: &mut Element) {
    let used = referenced_ids(root);
    root.walk_mut(&mut |e| {
        if e.attr("id").is_some_and(|id| !used.contains(id)) {
            e.remove_attr("id");
        }
    });
}

/// Drop named elements (with their subtree) and named attributes everywhere.
pub fn strip(root: &mut Element, elements: &[String], attributes: &[String]) {
    root.retain_elements(&|e| !elements.iter().any(|n| *n == e.name));
    root.walk_mut(&mut |e| e.attributes.retain(|(k, _)| !attributes.iter().any(|a| a == k)));
}

/// Structurally simplify a standalone SVG file.
pub fn optimize(source: &str, options: SvgOptions) -> Result<String, SvgError> {
    let mut root = parse(source)?;
    strip_editor_data(&mut root);
    if options.remove_viewbox {
        remove_redundant_view_box(&mut root);
    }
    if options.cleanup_ids {
        cleanup_ids(&mut root);
    }
    write(&root, None)
}
