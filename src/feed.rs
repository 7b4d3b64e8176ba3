//! RSS 2.0 feed document, read and written with quick-xml.
//!
//! Channel metadata, items (title, link, description, pubDate) and image
//! enclosures are typed. Everything else in an existing file is kept as
//! raw elements and written back after the typed fields of its parent.
use std::io::Write;
use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ChannelConfig;
use crate::error::Result;
use crate::text::sanitize_xml_text;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("XML parse error: {0}")]
    XmlParse(#[from] quick_xml::Error),

    #[error("Invalid attribute: {0}")]
    Attribute(#[from] quick_xml::events::attributes::AttrError),

    #[error("Malformed feed document: {0}")]
    Malformed(&'static str),

    #[error("Failed to read feed file: {0}")]
    Io(#[from] std::io::Error),
}

/// Markup carried through a run untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    /// Concatenated text of all descendants.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => out.push_str(t),
                XmlNode::Element(el) => el.collect_text(out),
            }
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn field_text(&self) -> String {
        self.text().trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enclosure {
    pub url: String,
    pub mime_type: String,
}

impl Enclosure {
    // Only a bare `url` + `type` enclosure is typed; anything richer stays raw.
    fn from_element(el: &XmlElement) -> Option<Self> {
        if !el.children.is_empty()
            || el.attributes.len() != 2
            || el.attributes.iter().any(|(k, _)| k != "url" && k != "type")
        {
            return None;
        }
        Some(Self {
            url: el.attribute("url")?.to_string(),
            mime_type: el.attribute("type")?.to_string(),
        })
    }
}

/// One `<item>`. Fields read from disk stay `None` when the element was absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<String>,
    pub enclosure: Option<Enclosure>,
    /// Children this model does not know (guid, category, ...), in document order.
    pub extra: Vec<XmlNode>,
}

impl FeedItem {
    fn from_element(el: XmlElement) -> Self {
        let mut item = FeedItem::default();
        for node in el.children {
            let child = match node {
                XmlNode::Element(child) => child,
                text => {
                    item.extra.push(text);
                    continue;
                }
            };
            match child.name.as_str() {
                "title" if item.title.is_none() => item.title = Some(child.field_text()),
                "link" if item.link.is_none() => item.link = Some(child.field_text()),
                "description" if item.description.is_none() => {
                    item.description = Some(child.field_text())
                }
                "pubDate" if item.pub_date.is_none() => item.pub_date = Some(child.field_text()),
                "enclosure" if item.enclosure.is_none() => match Enclosure::from_element(&child) {
                    Some(enclosure) => item.enclosure = Some(enclosure),
                    None => item.extra.push(XmlNode::Element(child)),
                },
                _ => item.extra.push(XmlNode::Element(child)),
            }
        }
        item
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Channel {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    /// Children other than metadata and items (language, image, ...).
    pub extra: Vec<XmlNode>,
    /// Oldest first; new items are appended at the end.
    pub items: Vec<FeedItem>,
}

impl Channel {
    pub fn new(meta: &ChannelConfig) -> Self {
        Self {
            title: Some(meta.title.clone()),
            link: Some(meta.link.clone()),
            description: Some(meta.description.clone()),
            extra: Vec::new(),
            items: Vec::new(),
        }
    }

    fn from_element(el: XmlElement) -> Self {
        let mut channel = Channel::default();
        for node in el.children {
            let child = match node {
                XmlNode::Element(child) => child,
                text => {
                    channel.extra.push(text);
                    continue;
                }
            };
            match child.name.as_str() {
                "title" if channel.title.is_none() => channel.title = Some(child.field_text()),
                "link" if channel.link.is_none() => channel.link = Some(child.field_text()),
                "description" if channel.description.is_none() => {
                    channel.description = Some(child.field_text())
                }
                "item" => channel.items.push(FeedItem::from_element(child)),
                _ => channel.extra.push(XmlNode::Element(child)),
            }
        }
        channel
    }

    /// Fill metadata children that are absent. Existing values are kept.
    fn fill_missing_metadata(&mut self, meta: &ChannelConfig) {
        self.title.get_or_insert_with(|| meta.title.clone());
        self.link.get_or_insert_with(|| meta.link.clone());
        self.description.get_or_insert_with(|| meta.description.clone());
    }

    /// Drop items from the front until at most `max` remain. Returns how many were dropped.
    pub fn trim_to(&mut self, max: usize) -> usize {
        let excess = self.items.len().saturating_sub(max);
        self.items.drain(..excess);
        excess
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedDocument {
    /// Attributes of the `<rss>` root as read (version, namespace declarations).
    pub root_attributes: Vec<(String, String)>,
    pub channel: Channel,
    /// Root children other than the first `<channel>`.
    pub extra: Vec<XmlNode>,
}

impl FeedDocument {
    pub fn new(meta: &ChannelConfig) -> Self {
        Self {
            channel: Channel::new(meta),
            ..Self::default()
        }
    }

    /// Load the feed at `path`. A missing or unparsable file yields a fresh
    /// channel; this never fails.
    pub fn load_or_default(path: &Path, meta: &ChannelConfig) -> Self {
        if !path.exists() {
            debug!(path = %path.display(), "no existing feed, starting fresh");
            return Self::new(meta);
        }

        match Self::load(path) {
            Ok(mut doc) => {
                doc.channel.fill_missing_metadata(meta);
                doc
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "existing feed is unreadable, starting fresh");
                Self::new(meta)
            }
        }
    }

    pub fn load(path: &Path) -> std::result::Result<Self, FeedError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse a feed document. A root without a `<channel>` yields an empty
    /// channel with no metadata.
    pub fn parse(xml: &str) -> std::result::Result<Self, FeedError> {
        let root = parse_tree(xml)?;

        let mut channel = None;
        let mut extra = Vec::new();
        for node in root.children {
            match node {
                XmlNode::Element(el) if el.name == "channel" && channel.is_none() => {
                    channel = Some(Channel::from_element(el))
                }
                other => extra.push(other),
            }
        }

        Ok(Self {
            root_attributes: root.attributes,
            channel: channel.unwrap_or_default(),
            extra,
        })
    }

    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut rss_start = BytesStart::new("rss");
        if !self.root_attributes.iter().any(|(k, _)| k == "version") {
            rss_start.push_attribute(("version", "2.0"));
        }
        push_attributes(&mut rss_start, &self.root_attributes);
        writer.write_event(Event::Start(rss_start))?;
        writer.write_event(Event::Start(BytesStart::new("channel")))?;

        let channel = &self.channel;
        write_optional(&mut writer, "title", channel.title.as_deref())?;
        write_optional(&mut writer, "link", channel.link.as_deref())?;
        write_optional(&mut writer, "description", channel.description.as_deref())?;
        write_nodes(&mut writer, &channel.extra)?;

        for it in &channel.items {
            writer.write_event(Event::Start(BytesStart::new("item")))?;
            write_optional(&mut writer, "title", it.title.as_deref())?;
            write_optional(&mut writer, "link", it.link.as_deref())?;
            write_optional(&mut writer, "description", it.description.as_deref())?;
            write_optional(&mut writer, "pubDate", it.pub_date.as_deref())?;
            if let Some(enc) = &it.enclosure {
                let mut el = BytesStart::new("enclosure");
                push_attributes(
                    &mut el,
                    &[
                        ("url".to_string(), enc.url.clone()),
                        ("type".to_string(), enc.mime_type.clone()),
                    ],
                );
                writer.write_event(Event::Empty(el))?;
            }
            write_nodes(&mut writer, &it.extra)?;
            writer.write_event(Event::End(BytesEnd::new("item")))?;
        }

        writer.write_event(Event::End(BytesEnd::new("channel")))?;
        write_nodes(&mut writer, &self.extra)?;
        writer.write_event(Event::End(BytesEnd::new("rss")))?;

        let mut out = writer.into_inner();
        out.write_all(b"\n")?;
        Ok(out)
    }

    /// Overwrite `path` with the full document.
    pub fn save(&self, path: &Path) -> Result<()> {
        let out = self.to_xml()?;
        std::fs::write(path, out)?;
        Ok(())
    }
}

// Whitespace-only text between elements is layout and is dropped; the writer re-indents.
fn parse_tree(xml: &str) -> std::result::Result<XmlElement, FeedError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if stack.is_empty() && root.is_some() {
                    return Err(FeedError::Malformed("more than one root element"));
                }
                stack.push(open_element(&e)?);
            }
            Event::Empty(e) => {
                let el = open_element(&e)?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::End(_) => {
                let el = stack
                    .pop()
                    .ok_or(FeedError::Malformed("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, el)?;
            }
            Event::Text(e) => {
                let text = e.unescape()?;
                if text.trim().is_empty() {
                    continue;
                }
                push_text(&mut stack, &text)?;
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                push_text(&mut stack, &text)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(FeedError::Malformed("unclosed element at end of document"));
    }
    root.ok_or(FeedError::Malformed("no root element"))
}

fn open_element(e: &BytesStart<'_>) -> std::result::Result<XmlElement, FeedError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|_| FeedError::Malformed("element name is not UTF-8"))?
        .to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|_| FeedError::Malformed("attribute name is not UTF-8"))?
            .to_string();
        attributes.push((key, attr.unescape_value()?.into_owned()));
    }
    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    el: XmlElement,
) -> std::result::Result<(), FeedError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(XmlNode::Element(el)),
        None if root.is_some() => return Err(FeedError::Malformed("more than one root element")),
        None => *root = Some(el),
    }
    Ok(())
}

// Adjacent text and CDATA runs merge into one node.
fn push_text(stack: &mut [XmlElement], text: &str) -> std::result::Result<(), FeedError> {
    let parent = stack
        .last_mut()
        .ok_or(FeedError::Malformed("text outside the root element"))?;
    match parent.children.last_mut() {
        Some(XmlNode::Text(prev)) => prev.push_str(text),
        _ => parent.children.push(XmlNode::Text(text.to_string())),
    }
    Ok(())
}

fn push_attributes(start: &mut BytesStart<'_>, attributes: &[(String, String)]) {
    for (key, value) in attributes {
        let value = sanitize_xml_text(value);
        start.push_attribute((key.as_str(), value.as_str()));
    }
}

fn write_nodes<W: Write>(w: &mut Writer<W>, nodes: &[XmlNode]) -> Result<()> {
    for node in nodes {
        match node {
            XmlNode::Text(text) => {
                w.write_event(Event::Text(BytesText::new(&sanitize_xml_text(text))))?;
            }
            XmlNode::Element(el) => {
                let mut start = BytesStart::new(el.name.as_str());
                push_attributes(&mut start, &el.attributes);
                if el.children.is_empty() {
                    w.write_event(Event::Empty(start))?;
                } else {
                    w.write_event(Event::Start(start))?;
                    write_nodes(w, &el.children)?;
                    w.write_event(Event::End(BytesEnd::new(el.name.as_str())))?;
                }
            }
        }
    }
    Ok(())
}

fn write_optional<W: Write>(w: &mut Writer<W>, name: &str, text: Option<&str>) -> Result<()> {
    let Some(text) = text else {
        return Ok(());
    };
    let s = sanitize_xml_text(text);
    if s.is_empty() {
        w.write_event(Event::Empty(BytesStart::new(name)))?;
    } else {
        w.write_event(Event::Start(BytesStart::new(name)))?;
        w.write_event(Event::Text(BytesText::new(&s)))?;
        w.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(link: &str) -> FeedItem {
        FeedItem {
            title: Some(format!("Title {link}")),
            link: Some(link.to_string()),
            description: Some(String::new()),
            pub_date: Some("Mon, 01 Jan 2024 00:00:00 +0000".to_string()),
            enclosure: None,
            extra: Vec::new(),
        }
    }

    #[test]
    fn test_parse_existing_feed() {
        let xml = r#"<?xml version='1.0' encoding='utf-8'?>
<rss version="2.0"><channel><title>Editorial</title><link>https://example.com/editorial</link><description>Latest editorial articles</description>
<item><title>A &amp; B</title><link> /editorial/a </link><description /><pubDate>Mon, 01 Jan 2024 00:00:00 +0000</pubDate><enclosure url="https://cdn.example.com/a.jpg?x=1&amp;y=2" type="image/jpeg" /></item>
<item><title><![CDATA[<b>Bold</b>]]></title><link>/editorial/b</link></item>
</channel></rss>"#;
        let doc = FeedDocument::parse(xml).unwrap();
        let channel = &doc.channel;
        assert_eq!(channel.title.as_deref(), Some("Editorial"));
        assert_eq!(channel.link.as_deref(), Some("https://example.com/editorial"));
        assert_eq!(channel.items.len(), 2);

        let a = &channel.items[0];
        assert_eq!(a.title.as_deref(), Some("A & B"));
        assert_eq!(a.link.as_deref(), Some("/editorial/a"));
        assert_eq!(a.description.as_deref(), Some(""));
        assert_eq!(
            a.enclosure,
            Some(Enclosure {
                url: "https://cdn.example.com/a.jpg?x=1&y=2".to_string(),
                mime_type: "image/jpeg".to_string(),
            })
        );

        let b = &channel.items[1];
        assert_eq!(b.title.as_deref(), Some("<b>Bold</b>"));
        assert_eq!(b.description, None);
        assert_eq!(b.pub_date, None);
    }

    #[test]
    fn test_mixed_content_field_keeps_all_text() {
        let xml = "<rss><channel><item><link>/editorial/x</link>\
                   <description>Intro text <b>bold</b> tail</description>\
                   <title>foo <![CDATA[bar]]></title></item></channel></rss>";
        let doc = FeedDocument::parse(xml).unwrap();
        let it = &doc.channel.items[0];
        assert_eq!(it.description.as_deref(), Some("Intro text bold tail"));
        assert_eq!(it.title.as_deref(), Some("foo bar"));
    }

    #[test]
    fn test_unknown_markup_survives_rewrite() {
        let xml = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
<channel><title>Editorial</title><language>bn</language>
<atom:link href="https://example.com/feed.xml" rel="self"/>
<item><title>A</title><link>/editorial/a</link><guid isPermaLink="false">g-1</guid>
<enclosure url="https://cdn.example.com/a.jpg" type="image/jpeg" length="1234"/></item>
</channel></rss>"#;
        let doc = FeedDocument::parse(xml).unwrap();
        assert_eq!(
            doc.root_attributes,
            vec![
                ("version".to_string(), "2.0".to_string()),
                ("xmlns:atom".to_string(), "http://www.w3.org/2005/Atom".to_string()),
            ]
        );
        assert_eq!(doc.channel.extra.len(), 2);
        let it = &doc.channel.items[0];
        assert_eq!(it.enclosure, None);
        assert_eq!(it.extra.len(), 2);

        let written = String::from_utf8(doc.to_xml().unwrap()).unwrap();
        assert!(written.contains("<rss version=\"2.0\" xmlns:atom=\"http://www.w3.org/2005/Atom\">"));
        assert!(written.contains("<language>bn</language>"));
        assert!(written.contains("<guid isPermaLink=\"false\">g-1</guid>"));
        assert!(written.contains("length=\"1234\""));

        let reparsed = FeedDocument::parse(&written).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn test_item_title_does_not_leak_into_channel() {
        let xml = "<rss><channel><item><title>Item</title></item></channel></rss>";
        let doc = FeedDocument::parse(xml).unwrap();
        assert_eq!(doc.channel.title, None);
        assert_eq!(doc.channel.items[0].title.as_deref(), Some("Item"));
    }

    #[test]
    fn test_rejects_malformed_documents() {
        for xml in [
            "",
            "not xml at all",
            "<rss><channel></rss>",
            "<rss><channel></channel>",
            "<rss/><rss/>",
            "<rss><channel><title>&bogus;</title></channel></rss>",
        ] {
            assert!(FeedDocument::parse(xml).is_err(), "accepted: {xml:?}");
        }
    }

    #[test]
    fn test_root_without_channel_parses_empty() {
        let doc = FeedDocument::parse("<feed><entry/></feed>").unwrap();
        assert_eq!(doc.channel, Channel::default());
    }

    #[test]
    fn test_write_then_parse_preserves_items() {
        let mut doc = FeedDocument::new(&ChannelConfig::default());
        doc.channel.items.push(item("/editorial/a"));
        let mut with_image = item("/editorial/b");
        with_image.enclosure = Some(Enclosure {
            url: "https://cdn.example.com/b.png".to_string(),
            mime_type: "image/jpeg".to_string(),
        });
        with_image.title = Some("Tom & \"Jerry\" <3".to_string());
        doc.channel.items.push(with_image);

        let xml = String::from_utf8(doc.to_xml().unwrap()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<rss version=\"2.0\">"));
        assert!(xml.contains("<description/>"));

        let reparsed = FeedDocument::parse(&xml).unwrap();
        assert_eq!(reparsed.channel, doc.channel);
    }

    #[test]
    fn test_writer_drops_illegal_control_chars() {
        let mut doc = FeedDocument::new(&ChannelConfig::default());
        let mut it = item("/editorial/a");
        it.title = Some("bad\u{0008}title".to_string());
        doc.channel.items.push(it);

        let reparsed = FeedDocument::parse(&String::from_utf8(doc.to_xml().unwrap()).unwrap()).unwrap();
        assert_eq!(reparsed.channel.items[0].title.as_deref(), Some("badtitle"));
    }

    #[test]
    fn test_trim_to_removes_oldest() {
        let mut channel = Channel::default();
        for i in 0..5 {
            channel.items.push(item(&format!("/editorial/{i}")));
        }
        assert_eq!(channel.trim_to(3), 2);
        let links: Vec<_> = channel.items.iter().filter_map(|i| i.link.as_deref()).collect();
        assert_eq!(links, vec!["/editorial/2", "/editorial/3", "/editorial/4"]);
        assert_eq!(channel.trim_to(10), 0);
        assert_eq!(channel.items.len(), 3);
    }

    #[test]
    fn test_load_or_default_repairs() {
        let dir = tempfile::tempdir().unwrap();
        let meta = ChannelConfig::default();

        let missing = dir.path().join("missing.xml");
        assert_eq!(FeedDocument::load_or_default(&missing, &meta), FeedDocument::new(&meta));

        let corrupt = dir.path().join("corrupt.xml");
        std::fs::write(&corrupt, "<rss><channel><item>").unwrap();
        assert_eq!(FeedDocument::load_or_default(&corrupt, &meta), FeedDocument::new(&meta));
    }

    #[test]
    fn test_load_or_default_keeps_existing_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.xml");
        std::fs::write(
            &path,
            "<rss version=\"2.0\"><channel><title>Custom</title><item><link>/editorial/a</link></item></channel></rss>",
        )
        .unwrap();

        let meta = ChannelConfig::default();
        let doc = FeedDocument::load_or_default(&path, &meta);
        assert_eq!(doc.channel.title.as_deref(), Some("Custom"));
        assert_eq!(doc.channel.link.as_deref(), Some(meta.link.as_str()));
        assert_eq!(doc.channel.description.as_deref(), Some(meta.description.as_str()));
        assert_eq!(doc.channel.items.len(), 1);
    }
}
