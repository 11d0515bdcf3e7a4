//! Minimal element tree over `quick-xml`
//!
//! The package registry document only needs element names, attributes and
//! child ordering, so text content, comments and processing instructions are
//! dropped while the tree is built.

use quick_xml::events::attributes::AttrError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Failed to parse XML: {0}")]
    ParseError(#[from] quick_xml::Error),
    #[error("Malformed attribute: {0}")]
    AttrError(#[from] AttrError),
    #[error("Invalid UTF-8 in element or attribute name: {0}")]
    EncodingError(#[from] std::str::Utf8Error),
    #[error("Unclosed element <{0}> at end of document")]
    Unclosed(String),
    #[error("Document has more than one root element (second is <{0}>)")]
    MultipleRoots(String),
    #[error("Document has no root element")]
    NoRoot,
}

/// A single element with its attributes and child elements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlNode {
    /// Create an element with no attributes or children
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style attribute append, mostly useful for constructing trees in code
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((key.into(), value.into()));
        self
    }

    /// Builder-style child append
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Parse a document and return its root element
    pub fn parse(xml: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => stack.push(Self::from_start(&e)?),
                Event::Empty(e) => {
                    let node = Self::from_start(&e)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    // quick-xml rejects mismatched end tags, so a pop here is
                    // always the element being closed
                    if let Some(node) = stack.pop() {
                        Self::attach(&mut stack, &mut root, node)?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(open) = stack.pop() {
            return Err(XmlError::Unclosed(open.name));
        }
        root.ok_or(XmlError::NoRoot)
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self, XmlError> {
        let mut node = XmlNode::new(std::str::from_utf8(e.name().as_ref())?);
        for attr in e.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let value = attr.unescape_value()?.into_owned();
            node.attrs.push((key, value));
        }
        Ok(node)
    }

    fn attach(
        stack: &mut [XmlNode],
        root: &mut Option<XmlNode>,
        node: XmlNode,
    ) -> Result<(), XmlError> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_some() => return Err(XmlError::MultipleRoots(node.name)),
            None => *root = Some(node),
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Attributes in document order
    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of the first attribute with the given name
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// First child element with the given tag
    pub fn child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == tag)
    }

    /// All child elements with the given tag, in document order
    pub fn children<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == tag)
    }

    /// All child elements regardless of tag
    pub fn all_children(&self) -> &[XmlNode] {
        &self.children
    }
}
