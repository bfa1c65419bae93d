//! Response content: XML element trees, JSON values, and raw bodies.
//!
//! # Design
//! The webservice answers in XML by default and in JSON when asked, and it
//! sometimes reports errors inside a `2xx` body. This module only turns a
//! body into a `Content` value and finds the embedded error message; the
//! decision about what the response means lives in the classifier.
//!
//! XML bodies are sanitized before parsing because the server can emit
//! control characters that no XML parser accepts. JSON bodies are parsed
//! as-is.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;

use crate::error::ContentError;

/// How a body should be parsed, decided by its `Content-Type` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Xml,
    Json,
    /// Any other media type: the body is passed through untouched.
    Other,
}

impl ContentKind {
    /// Categorize a `Content-Type` header value. Only the media type before
    /// the first `;` is considered.
    pub fn from_content_type(header: Option<&str>) -> Self {
        let media_type = header
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .unwrap_or("");
        if media_type.eq_ignore_ascii_case("text/xml") {
            ContentKind::Xml
        } else if media_type.eq_ignore_ascii_case("application/json") {
            ContentKind::Json
        } else {
            ContentKind::Other
        }
    }
}

/// A successfully interpreted response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    /// Root element of an XML document (`<prestashop>` for this API).
    Xml(XmlElement),
    Json(Value),
    /// Body of a response with an unrecognized media type.
    Raw(String),
}

impl Content {
    /// Parse `body` according to `kind`.
    pub fn parse(kind: ContentKind, body: &str) -> Result<Self, ContentError> {
        match kind {
            ContentKind::Xml => parse_xml(body).map(Content::Xml),
            ContentKind::Json => parse_json(body).map(Content::Json),
            ContentKind::Other => Ok(Content::Raw(body.to_string())),
        }
    }

    /// The error message the server embedded in the document, if any.
    ///
    /// XML documents are checked at `errors/error/message` below the root,
    /// JSON documents at `errors[0].message`. Raw bodies never carry one.
    pub fn embedded_error(&self) -> Option<String> {
        match self {
            Content::Xml(root) => root
                .path(&["errors", "error", "message"])
                .map(|message| message.text().to_string()),
            Content::Json(value) => match value.get("errors")?.get(0)?.get("message")? {
                Value::Null => None,
                Value::String(message) => Some(message.clone()),
                other => Some(other.to_string()),
            },
            Content::Raw(_) => None,
        }
    }

    pub fn xml(&self) -> Option<&XmlElement> {
        match self {
            Content::Xml(root) => Some(root),
            _ => None,
        }
    }

    pub fn json(&self) -> Option<&Value> {
        match self {
            Content::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn raw(&self) -> Option<&str> {
        match self {
            Content::Raw(body) => Some(body),
            _ => None,
        }
    }
}

/// One element of a parsed XML document.
///
/// Text and CDATA directly inside the element are concatenated into `text`
/// with surrounding whitespace trimmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    /// First child element called `name`.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Follow first-match children along `path`, starting below `self`.
    pub fn path(&self, path: &[&str]) -> Option<&XmlElement> {
        path.iter().try_fold(self, |element, name| element.child(name))
    }
}

fn is_xml_char(c: char) -> bool {
    matches!(c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}')
}

/// Replace every run of characters that XML 1.0 forbids with a single space.
///
/// Borrows the input untouched when it is already clean, so sanitizing is
/// idempotent. Invalid UTF-8 never reaches this point: transports decode
/// bodies lossily, turning stray bytes into U+FFFD, which is allowed.
pub fn sanitize_xml(input: &str) -> Cow<'_, str> {
    if input.chars().all(is_xml_char) {
        return Cow::Borrowed(input);
    }
    let mut cleaned = String::with_capacity(input.len());
    let mut in_run = false;
    for c in input.chars() {
        if is_xml_char(c) {
            cleaned.push(c);
            in_run = false;
        } else if !in_run {
            cleaned.push(' ');
            in_run = true;
        }
    }
    Cow::Owned(cleaned)
}

/// Parse an XML body into its root element.
///
/// Fails with `ContentError::Empty` when nothing but whitespace is left
/// after sanitizing, and with `ContentError::Unparsable` carrying every
/// problem found (joined with `; `) when the document is malformed.
pub fn parse_xml(body: &str) -> Result<XmlElement, ContentError> {
    let cleaned = sanitize_xml(body);
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return Err(ContentError::Empty);
    }

    let mut reader = Reader::from_str(trimmed);
    reader.trim_text(true);

    let mut tree = TreeBuilder::default();
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => match element_from(&start) {
                Ok(element) => tree.stack.push(element),
                Err(problem) => {
                    tree.problems.push(problem);
                    break;
                }
            },
            Ok(Event::Empty(start)) => match element_from(&start) {
                Ok(element) => tree.attach(element),
                Err(problem) => {
                    tree.problems.push(problem);
                    break;
                }
            },
            Ok(Event::End(end)) => match tree.stack.pop() {
                Some(element) => tree.attach(element),
                None => tree.problems.push(format!(
                    "unexpected closing tag </{}>",
                    String::from_utf8_lossy(end.name().as_ref())
                )),
            },
            Ok(Event::Text(text)) => match text.unescape() {
                Ok(text) => tree.push_text(&text),
                Err(err) => {
                    tree.problems.push(format!("{err} at byte {}", reader.buffer_position()));
                    break;
                }
            },
            Ok(Event::CData(cdata)) => {
                let text = String::from_utf8_lossy(&cdata.into_inner()).into_owned();
                tree.push_text(text.trim());
            }
            Ok(Event::Eof) => break,
            // Declarations, comments, processing instructions, doctype.
            Ok(_) => {}
            Err(err) => {
                tree.problems.push(format!("{err} at byte {}", reader.buffer_position()));
                break;
            }
        }
    }
    tree.finish()
}

/// Parse a JSON body. No sanitizing is applied.
pub fn parse_json(body: &str) -> Result<Value, ContentError> {
    if body.trim().is_empty() {
        return Err(ContentError::Empty);
    }
    serde_json::from_str(body).map_err(|err| ContentError::Unparsable(err.to_string()))
}

fn element_from(start: &BytesStart<'_>) -> Result<XmlElement, String> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| err.to_string())?;
        let value = attribute.unescape_value().map_err(|err| err.to_string())?;
        attributes.push((
            String::from_utf8_lossy(attribute.key.as_ref()).into_owned(),
            value.into_owned(),
        ));
    }
    Ok(XmlElement {
        name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        attributes,
        ..XmlElement::default()
    })
}

#[derive(Default)]
struct TreeBuilder {
    stack: Vec<XmlElement>,
    root: Option<XmlElement>,
    problems: Vec<String>,
}

impl TreeBuilder {
    fn attach(&mut self, element: XmlElement) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(element);
        } else if self.root.is_none() {
            self.root = Some(element);
        } else {
            self.problems
                .push(format!("extra content after the root element: <{}>", element.name));
        }
    }

    fn push_text(&mut self, text: &str) {
        match self.stack.last_mut() {
            Some(element) => element.text.push_str(text),
            None => self.problems.push("text outside the root element".to_string()),
        }
    }

    fn finish(mut self) -> Result<XmlElement, ContentError> {
        if let Some(open) = self.stack.last() {
            self.problems.push(format!("unclosed element <{}>", open.name));
        }
        match self.root {
            Some(root) if self.problems.is_empty() => Ok(root),
            None if self.problems.is_empty() => Err(ContentError::Unparsable(
                "document has no root element".to_string(),
            )),
            _ => Err(ContentError::Unparsable(self.problems.join("; "))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<prestashop xmlns:xlink="http://www.w3.org/1999/xlink">
  <customer>
    <id><![CDATA[7]]></id>
    <email><![CDATA[pub@prestashop.com]]></email>
    <associations>
      <groups nodeType="group" api="groups">
        <group xlink:href="http://shop.test/api/groups/3"><id>3</id></group>
      </groups>
    </associations>
  </customer>
</prestashop>"#;

    #[test]
    fn content_kind_uses_media_type_before_parameters() {
        assert_eq!(ContentKind::from_content_type(Some("text/xml;charset=utf-8")), ContentKind::Xml);
        assert_eq!(ContentKind::from_content_type(Some("application/json")), ContentKind::Json);
        assert_eq!(ContentKind::from_content_type(Some("text/html")), ContentKind::Other);
        assert_eq!(ContentKind::from_content_type(None), ContentKind::Other);
    }

    #[test]
    fn parse_xml_builds_tree_with_cdata_text() {
        let root = parse_xml(CUSTOMER).unwrap();
        assert_eq!(root.name, "prestashop");
        assert_eq!(root.path(&["customer", "id"]).unwrap().text(), "7");
        assert_eq!(
            root.path(&["customer", "email"]).unwrap().text(),
            "pub@prestashop.com"
        );
        let groups = root.path(&["customer", "associations", "groups"]).unwrap();
        assert_eq!(groups.attribute("api"), Some("groups"));
        let group = groups.children_named("group").next().unwrap();
        assert_eq!(group.attribute("xlink:href"), Some("http://shop.test/api/groups/3"));
    }

    #[test]
    fn parse_xml_unescapes_entities() {
        let root = parse_xml("<a><b>Fish &amp; Chips</b></a>").unwrap();
        assert_eq!(root.child("b").unwrap().text(), "Fish & Chips");
    }

    #[test]
    fn parse_xml_rejects_empty_body() {
        assert_eq!(parse_xml(""), Err(ContentError::Empty));
        assert_eq!(parse_xml("  \n "), Err(ContentError::Empty));
    }

    #[test]
    fn parse_xml_rejects_mismatched_tags() {
        assert!(matches!(parse_xml("<a><b></a>"), Err(ContentError::Unparsable(_))));
    }

    #[test]
    fn parse_xml_rejects_unclosed_root() {
        assert!(matches!(parse_xml("<a><b>x</b>"), Err(ContentError::Unparsable(_))));
    }

    #[test]
    fn parse_xml_aggregates_problems() {
        let err = parse_xml("<a/><b/><c/>").unwrap_err();
        let ContentError::Unparsable(message) = err else {
            panic!("expected unparsable content");
        };
        assert!(message.contains("<b>"));
        assert!(message.contains("<c>"));
        assert!(message.contains("; "));
    }

    #[test]
    fn parse_xml_rejects_plain_text() {
        assert!(matches!(parse_xml("Internal error"), Err(ContentError::Unparsable(_))));
    }

    #[test]
    fn parse_xml_tolerates_control_characters() {
        let root = parse_xml("<a><b>bad\u{1}\u{2}value</b></a>").unwrap();
        assert_eq!(root.child("b").unwrap().text(), "bad value");
    }

    #[test]
    fn sanitize_replaces_each_run_with_one_space() {
        assert_eq!(sanitize_xml("a\u{0}\u{1}b\u{FFFF}c"), "a b c");
        assert_eq!(sanitize_xml("emoji \u{1F600}!"), "emoji  !");
    }

    #[test]
    fn sanitize_is_identity_on_clean_input() {
        let clean = "tab\tnewline\ncr\r text \u{D7FF}\u{E000}\u{FFFD}";
        assert!(matches!(sanitize_xml(clean), Cow::Borrowed(_)));
        assert_eq!(sanitize_xml(clean), clean);
        let once = sanitize_xml("x\u{7}y").into_owned();
        assert_eq!(sanitize_xml(&once), once);
    }

    #[test]
    fn parse_json_rejects_invalid_and_empty() {
        assert_eq!(parse_json(""), Err(ContentError::Empty));
        assert!(matches!(parse_json("{\"a\":"), Err(ContentError::Unparsable(_))));
        assert_eq!(parse_json("{\"a\":1}").unwrap()["a"], 1);
    }

    #[test]
    fn embedded_error_in_xml() {
        let body = "<prestashop><errors><error><code><![CDATA[90]]></code>\
                    <message><![CDATA[Invalid ID]]></message></error></errors></prestashop>";
        let content = Content::parse(ContentKind::Xml, body).unwrap();
        assert_eq!(content.embedded_error().as_deref(), Some("Invalid ID"));
    }

    #[test]
    fn embedded_error_in_json() {
        let content = Content::parse(
            ContentKind::Json,
            r#"{"errors":[{"code":90,"message":"Invalid ID"}]}"#,
        )
        .unwrap();
        assert_eq!(content.embedded_error().as_deref(), Some("Invalid ID"));

        let content = Content::parse(ContentKind::Json, r#"{"customer":{"id":7}}"#).unwrap();
        assert_eq!(content.embedded_error(), None);
    }

    #[test]
    fn raw_content_is_untouched() {
        let content = Content::parse(ContentKind::Other, "<not xml").unwrap();
        assert_eq!(content.raw(), Some("<not xml"));
        assert_eq!(content.embedded_error(), None);
    }
}
