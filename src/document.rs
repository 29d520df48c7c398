//! Map documents as XML trees
//!
//! The adapter does not interpret the map schema. It only needs to turn
//! the text stored by the backend into a tree the editor can walk, and back.

use crate::error::{PersistenceError, Result};
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

/// A node inside an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

/// An XML element with ordered attributes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(XmlNode::Element(child));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(&text.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Direct child elements
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    // Adjacent text (including resolved entities) is kept as one node.
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(XmlNode::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    fn write_to(&self, writer: &mut Writer<Vec<u8>>) -> Result<()> {
        let start = BytesStart::new(self.name.as_str()).with_attributes(
            self.attributes
                .iter()
                .map(|(key, value)| (key.as_str(), value.as_str())),
        );

        if self.children.is_empty() {
            return write_event(writer, Event::Empty(start));
        }

        write_event(writer, Event::Start(start))?;
        for child in &self.children {
            match child {
                XmlNode::Element(element) => element.write_to(writer)?,
                XmlNode::Text(text) => write_event(writer, Event::Text(BytesText::new(text)))?,
            }
        }
        write_event(writer, Event::End(BytesEnd::new(self.name.as_str())))
    }
}

/// A parsed map document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDocument {
    root: XmlElement,
}

impl MapDocument {
    pub fn new(root: XmlElement) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &XmlElement {
        &self.root
    }

    pub fn into_root(self) -> XmlElement {
        self.root
    }

    /// Parse serialized XML text
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| malformed(reader.buffer_position(), e))?;

            match event {
                Event::Start(start) => {
                    ensure_single_root(&root, &stack)?;
                    stack.push(element_from(&start)?);
                }
                Event::Empty(start) => {
                    ensure_single_root(&root, &stack)?;
                    let element = element_from(&start)?;
                    attach(element, &mut stack, &mut root);
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| {
                        PersistenceError::Document("unexpected closing tag".to_string())
                    })?;
                    attach(element, &mut stack, &mut root);
                }
                Event::Text(text) => {
                    let text = text
                        .decode()
                        .map_err(|e| malformed(reader.buffer_position(), e))?;
                    push_text(&mut stack, &text)?;
                }
                Event::CData(cdata) => {
                    let bytes = cdata.into_inner();
                    let text = std::str::from_utf8(&bytes)
                        .map_err(|e| malformed(reader.buffer_position(), e))?;
                    push_text(&mut stack, text)?;
                }
                Event::GeneralRef(reference) => {
                    let resolved = match reference
                        .resolve_char_ref()
                        .map_err(|e| malformed(reader.buffer_position(), e))?
                    {
                        Some(ch) => ch.to_string(),
                        None => {
                            let name = reference
                                .decode()
                                .map_err(|e| malformed(reader.buffer_position(), e))?;
                            resolve_predefined_entity(&name)
                                .ok_or_else(|| {
                                    PersistenceError::Document(format!(
                                        "unknown entity &{};",
                                        name
                                    ))
                                })?
                                .to_string()
                        }
                    };
                    push_text(&mut stack, &resolved)?;
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions, doctype
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(PersistenceError::Document(format!(
                "unclosed element <{}>",
                open.name
            )));
        }
        root.map(Self::new)
            .ok_or_else(|| PersistenceError::Document("document has no root element".to_string()))
    }

    /// Serialize to XML text
    pub fn to_xml(&self) -> Result<String> {
        let mut writer = Writer::new(Vec::new());
        self.root.write_to(&mut writer)?;
        String::from_utf8(writer.into_inner())
            .map_err(|e| PersistenceError::Document(e.to_string()))
    }
}

impl std::str::FromStr for MapDocument {
    type Err = PersistenceError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| PersistenceError::Document(e.to_string()))?
        .to_string();

    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| PersistenceError::Document(e.to_string()))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| PersistenceError::Document(e.to_string()))?
            .to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| PersistenceError::Document(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(element: XmlElement, stack: &mut [XmlElement], root: &mut Option<XmlElement>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(element)),
        None => *root = Some(element),
    }
}

fn ensure_single_root(root: &Option<XmlElement>, stack: &[XmlElement]) -> Result<()> {
    if root.is_some() && stack.is_empty() {
        return Err(PersistenceError::Document(
            "document has more than one root element".to_string(),
        ));
    }
    Ok(())
}

// Whitespace around the root is ignored, anything else there is an error.
fn push_text(stack: &mut [XmlElement], text: &str) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(PersistenceError::Document(
            "text outside of the root element".to_string(),
        )),
    }
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| PersistenceError::Document(e.to_string()))
}

fn malformed(position: u64, err: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::Document(format!("malformed XML at byte {}: {}", position, err))
}
