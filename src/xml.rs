//! Minimal XML element tree used by the BCF readers and writers.
//!
//! BCF documents are small, so they are read fully into an [`Element`] tree
//! instead of being processed as a stream. Parsing drops namespace prefixes
//! from element and attribute names, trims text content and ignores the XML
//! declaration, comments and processing instructions.

use crate::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;

/// A parsed XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// Local element name (namespace prefix removed)
    pub name: String,
    /// Attributes in document order, keyed by local name
    pub attributes: Vec<(String, String)>,
    /// Child elements in document order
    pub children: Vec<Element>,
    /// Trimmed text content
    pub text: String,
}

impl Element {
    /// Parse a document and return its root element.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(Error::from)? {
                Event::Start(start) => stack.push(Element::from_start(&start)?),
                Event::Empty(start) => {
                    let element = Element::from_start(&start)?;
                    attach(&mut stack, &mut root, element);
                }
                Event::End(_) => {
                    if let Some(mut element) = stack.pop() {
                        let trimmed = element.text.trim();
                        if trimmed.len() != element.text.len() {
                            element.text = trimmed.to_string();
                        }
                        attach(&mut stack, &mut root, element);
                    }
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let value = text.unescape().map_err(quick_xml::Error::from)?;
                        current.text.push_str(&value);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        current
                            .text
                            .push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::InvalidArchive(
                "XML document ended before its root element was closed".to_string(),
            ));
        }
        root.ok_or_else(|| Error::InvalidArchive("XML document has no root element".to_string()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Element> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(quick_xml::Error::from)?;
            if attr.key.as_ref().starts_with(b"xmlns") {
                continue;
            }
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
            attributes.push((key, value.trim().to_string()));
        }
        Ok(Element {
            name,
            attributes,
            children: Vec::new(),
            text: String::new(),
        })
    }

    /// First child element with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All child elements with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attribute value by local name. Blank values count as absent.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.is_empty())
    }

    /// Text of the first child with the given name. Blank text counts as absent.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.as_str())
            .filter(|text| !text.is_empty())
    }

    /// A named value that BCF producers write either as an attribute or as a
    /// child element. The attribute wins when both are present.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.attr(name).or_else(|| self.child_text(name))
    }

    /// Follow a path of child names, e.g. `["Topic", "Labels"]`.
    pub fn path(&self, names: &[&str]) -> Option<&Element> {
        names
            .iter()
            .try_fold(self, |element, name| element.child(name))
    }
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

/// Escape text or attribute content.
pub fn escape(value: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(value)
}

/// `<name>value</name>`, or nothing when the value is absent or blank.
pub fn text_tag(name: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => format!("<{name}>{}</{name}>", escape(v)),
        _ => String::new(),
    }
}

/// ` name="value"`, or nothing when the value is absent or blank.
pub fn attr_pair(name: &str, value: Option<&str>) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => format!(" {name}=\"{}\"", escape(v)),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_document() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
            <Markup>
              <Topic Guid="t-1" TopicType="Clash">
                <Title>  Pipe clash  </Title>
                <Labels>A</Labels>
                <Labels>B</Labels>
              </Topic>
            </Markup>"#;
        let root = Element::parse(xml).unwrap();
        assert_eq!(root.name, "Markup");
        let topic = root.child("Topic").unwrap();
        assert_eq!(topic.attr("Guid"), Some("t-1"));
        assert_eq!(topic.value("TopicType"), Some("Clash"));
        assert_eq!(topic.child_text("Title"), Some("Pipe clash"));
        let labels: Vec<_> = topic.children_named("Labels").map(|l| l.text.as_str()).collect();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_strips_namespace_prefixes() {
        let xml = r#"<bcf:Version xmlns:bcf="urn:x" xmlns:xsi="urn:y" xsi:noNamespaceSchemaLocation="v.xsd" VersionId="3"></bcf:Version>"#;
        let root = Element::parse(xml).unwrap();
        assert_eq!(root.name, "Version");
        assert_eq!(root.attr("VersionId"), Some("3"));
        assert_eq!(root.attr("noNamespaceSchemaLocation"), Some("v.xsd"));
        assert!(root.attributes.iter().all(|(k, _)| k != "bcf" && k != "xsi"));
    }

    #[test]
    fn test_parse_unescapes_entities() {
        let root = Element::parse("<Comment a=\"x &amp; y\">1 &lt; 2</Comment>").unwrap();
        assert_eq!(root.text, "1 < 2");
        assert_eq!(root.attr("a"), Some("x & y"));
    }

    #[test]
    fn test_value_prefers_attribute() {
        let root = Element::parse("<A Guid=\"attr\"><Guid>child</Guid></A>").unwrap();
        assert_eq!(root.value("Guid"), Some("attr"));
        let root = Element::parse("<A><Guid>child</Guid></A>").unwrap();
        assert_eq!(root.value("Guid"), Some("child"));
    }

    #[test]
    fn test_path_lookup() {
        let root = Element::parse("<a><b><c>deep</c></b></a>").unwrap();
        assert_eq!(root.path(&["b", "c"]).map(|e| e.text.as_str()), Some("deep"));
        assert!(root.path(&["b", "x"]).is_none());
    }

    #[test]
    fn test_parse_rejects_mismatched_tags() {
        assert!(Element::parse("<a><b></a>").is_err());
    }

    #[test]
    fn test_parse_empty_document() {
        assert!(Element::parse("   ").is_err());
    }

    #[test]
    fn test_text_tag_omits_blank_values() {
        assert_eq!(text_tag("Title", Some("A & B")), "<Title>A &amp; B</Title>");
        assert_eq!(text_tag("Title", Some("  ")), "");
        assert_eq!(text_tag("Title", None), "");
        assert_eq!(attr_pair("Guid", Some("g")), " Guid=\"g\"");
        assert_eq!(attr_pair("Guid", None), "");
    }
}
