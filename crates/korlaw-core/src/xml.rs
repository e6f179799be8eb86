use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use crate::types::{FieldMap, Listing, Payload};

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct XmlParseError(String);

/// Minimal element tree: only what the shape extractors read.
#[derive(Debug, Default)]
struct Element {
    name: String,
    /// Text before the first child element. `None` when there was no
    /// text node at all (`<a/>`, `<a></a>`, `<a><b/></a>`).
    text: Option<String>,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    fn push_text(&mut self, chunk: &str) {
        if self.children.is_empty() {
            self.text.get_or_insert_with(String::new).push_str(chunk);
        }
    }
}

/// Remove one literal `<![CDATA[ ... ]]>` wrapper. Anything else is
/// returned unchanged.
pub fn strip_cdata(text: &str) -> &str {
    text.strip_prefix(CDATA_OPEN)
        .and_then(|inner| inner.strip_suffix(CDATA_CLOSE))
        .unwrap_or(text)
}

/// Parse `xml` and dispatch on its root tag.
pub fn extract_payload(xml: &str) -> Result<Payload, XmlParseError> {
    let root = parse_tree(xml)?;
    let payload = match root.name.as_str() {
        "PrecSearch" => Payload::PrecSearch(listing(&root, "prec")),
        "PrecService" => Payload::PrecService(field_map(&root)),
        "LawJosubService" => Payload::LawJosubService(field_map(&root)),
        "LawSearch" => Payload::LawSearch(listing(&root, "law")),
        _ => Payload::Unrecognized {
            root_tag: root.name,
            xml_content: xml.to_string(),
        },
    };
    Ok(payload)
}

fn field_map(el: &Element) -> FieldMap {
    let mut fields = FieldMap::new();
    for child in &el.children {
        if let Some(text) = &child.text {
            fields.insert(child.name.clone(), Value::String(strip_cdata(text).to_string()));
        }
    }
    fields
}

fn listing(root: &Element, item_tag: &str) -> Listing {
    let total_count = root
        .child("totalCnt")
        .and_then(|el| el.text.as_deref())
        .and_then(|t| strip_cdata(t).trim().parse().ok())
        .unwrap_or(0);
    let items = root
        .children
        .iter()
        .filter(|c| c.name == item_tag)
        .map(field_map)
        .collect();
    Listing { total_count, items }
}

fn parse_tree(xml: &str) -> Result<Element, XmlParseError> {
    let xml = xml.trim_start_matches('\u{feff}');
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(e) => {
                return Err(XmlParseError(format!(
                    "at position {}: {e}",
                    reader.error_position()
                )))
            }
        };
        let opens_scope = matches!(event, Event::Start(_));
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                if root.is_some() {
                    return Err(XmlParseError("junk after document element".into()));
                }
                let el = Element {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    ..Default::default()
                };
                if opens_scope {
                    stack.push(el);
                } else {
                    attach(&mut stack, &mut root, el);
                }
            }
            Event::End(_) => {
                let done = stack
                    .pop()
                    .ok_or_else(|| XmlParseError("unexpected closing tag".into()))?;
                attach(&mut stack, &mut root, done);
            }
            Event::Text(ref e) => {
                let text = e
                    .unescape()
                    .map_err(|err| XmlParseError(format!("invalid text: {err}")))?;
                match stack.last_mut() {
                    Some(parent) => parent.push_text(&text),
                    None if text.trim().is_empty() => {}
                    None => return Err(XmlParseError("text outside of root element".into())),
                }
            }
            Event::CData(ref e) => match stack.last_mut() {
                Some(parent) => parent.push_text(&String::from_utf8_lossy(e)),
                None => return Err(XmlParseError("CDATA outside of root element".into())),
            },
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if !stack.is_empty() {
        let unclosed: Vec<&str> = stack.iter().map(|el| el.name.as_str()).collect();
        return Err(XmlParseError(format!(
            "unclosed element(s): <{}>",
            unclosed.join(">, <")
        )));
    }
    root.ok_or_else(|| XmlParseError("no element found".into()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, el: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(el),
        None => *root = Some(el),
    }
}
