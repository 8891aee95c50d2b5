//! Minimal owned element tree for DBGp response documents.
//!
//! Responses are small, so the whole payload is parsed into [`Element`]s
//! with `quick-xml` and walked afterwards.

use quick_xml::escape::{resolve_predefined_entity, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DbgpError;

/// One XML element with its attributes, text content and child elements.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Qualified tag name as written (e.g. `xdebug:message`).
    pub name: String,
    /// Attributes in document order, values unescaped.
    pub attributes: Vec<(String, String)>,
    /// Concatenated text and CDATA content, `None` when empty.
    pub text: Option<String>,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Create an element without attributes or content.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builder: add an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Builder: set the text content.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder: append a child element.
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Tag name without a namespace prefix.
    pub fn local_name(&self) -> &str {
        match self.name.rsplit_once(':') {
            Some((_, local)) => local,
            None => &self.name,
        }
    }

    /// Look up an attribute value.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Children whose local name matches `local`.
    pub fn children_named<'a>(&'a self, local: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.local_name() == local)
    }

    /// First child with the exact qualified name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

/// Parse a complete document and return its root element.
pub fn parse_document(xml: &str) -> Result<Element, DbgpError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    // Open elements; the root is the bottom of the stack.
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| DbgpError::Xml(format!("at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(ref e) => {
                stack.push(open_element(e)?);
            }
            Event::Empty(ref e) => {
                let element = open_element(e)?;
                close_element(element, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DbgpError::Xml("unexpected closing tag".into()))?;
                close_element(element, &mut stack, &mut root)?;
            }
            Event::Text(ref e) => {
                let raw = String::from_utf8_lossy(e.as_ref());
                let text = unescape(&raw).map_err(|e| DbgpError::Xml(e.to_string()))?;
                append_text(&mut stack, &text);
            }
            Event::CData(ref e) => {
                append_text(&mut stack, &String::from_utf8_lossy(e.as_ref()));
            }
            Event::GeneralRef(ref e) => {
                let name = String::from_utf8_lossy(e.as_ref());
                let resolved = resolve_reference(&name)
                    .ok_or_else(|| DbgpError::Xml(format!("unknown entity '&{name};'")))?;
                append_text(&mut stack, &resolved);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(DbgpError::Xml("unexpected end of document".into()));
    }
    root.ok_or_else(|| DbgpError::Xml("document has no root element".into()))
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, DbgpError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DbgpError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw).map_err(|e| DbgpError::Xml(e.to_string()))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn close_element(
    mut element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), DbgpError> {
    // Indentation between child elements is not content; leaf text is kept as is.
    if !element.children.is_empty()
        && element.text.as_deref().is_some_and(|t| t.trim().is_empty())
    {
        element.text = None;
    }
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(DbgpError::Xml("multiple root elements".into())),
    }
    Ok(())
}

fn append_text(stack: &mut [Element], text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(current) = stack.last_mut() {
        current.text.get_or_insert_with(String::new).push_str(text);
    }
}

/// Resolve `amp`, `lt`, ... and numeric `#38` / `#x26` references.
fn resolve_reference(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_predefined_entity(name).map(str::to_string)
}
