//! Arena-backed document tree for XML and lenient HTML.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::borrow::Cow;

use super::super::ParseError;

pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    Element {
        /// Qualified name as written, lower-cased for HTML.
        name: String,
        attributes: Vec<(String, String)>,
        /// Resolved namespace URI, if any.
        namespace: Option<String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Dom {
    nodes: Vec<Node>,
    /// Every `xmlns[:prefix]` declaration seen, first one per prefix wins.
    namespaces: Vec<(String, String)>,
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

impl Dom {
    pub const ROOT: NodeId = 0;

    pub fn parse_xml(text: &str) -> Result<Self, ParseError> {
        Self::parse(text, false)
    }

    /// Lenient parse: void elements, unclosed tags and stray end tags are
    /// tolerated; a syntax error ends the document where it occurred.
    pub fn parse_html(text: &str) -> Result<Self, ParseError> {
        Self::parse(text, true)
    }

    fn parse(text: &str, html: bool) -> Result<Self, ParseError> {
        let mut dom = Dom {
            nodes: vec![Node {
                kind: NodeKind::Document,
                parent: None,
                children: Vec::new(),
            }],
            namespaces: Vec::new(),
        };

        let mut reader = Reader::from_str(text);
        {
            let config = reader.config_mut();
            config.trim_text(false);
            config.check_end_names = !html;
            config.allow_unmatched_ends = html;
            config.check_comments = false;
        }

        // Open elements with their in-scope namespace bindings.
        let mut stack: Vec<(NodeId, Vec<(String, String)>)> = vec![(Self::ROOT, Vec::new())];
        let mut in_raw_text: Option<String> = None;

        loop {
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) if html => {
                    crate::ui::verbose(&format!("HTML parsing stopped early: {}", e));
                    break;
                }
                Err(e) => {
                    return Err(ParseError::Xml(format!(
                        "at byte {}: {}",
                        reader.buffer_position(),
                        e
                    )));
                }
            };

            match event {
                Event::Start(start) => {
                    let (name, attributes) = read_tag(&start, html);
                    if in_raw_text.is_some() {
                        // Inside <script>/<style>: keep markup as text.
                        let parent = stack.last().map(|(id, _)| *id).unwrap_or(Self::ROOT);
                        dom.push_text(parent, &format!("<{}>", name));
                        continue;
                    }
                    dom.open_element(&mut stack, name.clone(), attributes);
                    if html && VOID_ELEMENTS.contains(&name.as_str()) {
                        stack.pop();
                    } else if html && (name == "script" || name == "style") {
                        in_raw_text = Some(name);
                    }
                }
                Event::Empty(start) => {
                    if in_raw_text.is_some() {
                        continue;
                    }
                    let (name, attributes) = read_tag(&start, html);
                    dom.open_element(&mut stack, name, attributes);
                    stack.pop();
                }
                Event::End(end) => {
                    let name = decode_name(end.name().as_ref(), html);
                    if let Some(raw) = &in_raw_text {
                        if *raw != name {
                            continue;
                        }
                        in_raw_text = None;
                    }
                    if html {
                        // Close up to the matching element; ignore strays.
                        if let Some(depth) = stack
                            .iter()
                            .rposition(|(id, _)| dom.element_name(*id) == Some(name.as_str()))
                        {
                            stack.truncate(depth);
                        }
                    } else if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Event::Text(text) => {
                    let parent = stack.last().map(|(id, _)| *id).unwrap_or(Self::ROOT);
                    let raw = String::from_utf8_lossy(&text);
                    let value = if in_raw_text.is_some() {
                        raw.into_owned()
                    } else {
                        unescape(&raw)
                    };
                    dom.push_text(parent, &value);
                }
                Event::CData(data) => {
                    let parent = stack.last().map(|(id, _)| *id).unwrap_or(Self::ROOT);
                    dom.push_text(parent, &String::from_utf8_lossy(&data));
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !html && stack.len() > 1 {
            return Err(ParseError::Xml("unexpected end of document: unclosed elements".into()));
        }
        Ok(dom)
    }

    fn open_element(
        &mut self,
        stack: &mut Vec<(NodeId, Vec<(String, String)>)>,
        name: String,
        attributes: Vec<(String, String)>,
    ) {
        let (parent, inherited) = stack
            .last()
            .cloned()
            .unwrap_or((Self::ROOT, Vec::new()));

        let mut scope = inherited;
        for (key, value) in &attributes {
            let prefix = if key == "xmlns" {
                Some(String::new())
            } else {
                key.strip_prefix("xmlns:").map(str::to_string)
            };
            if let Some(prefix) = prefix {
                if !self.namespaces.iter().any(|(p, _)| *p == prefix) {
                    self.namespaces.push((prefix.clone(), value.clone()));
                }
                scope.retain(|(p, _)| *p != prefix);
                scope.push((prefix, value.clone()));
            }
        }

        let prefix = name.split_once(':').map(|(p, _)| p).unwrap_or("");
        let namespace = scope
            .iter()
            .rev()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone());

        let id = self.nodes.len();
        self.nodes.push(Node {
            kind: NodeKind::Element {
                name,
                attributes,
                namespace,
            },
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        stack.push((id, scope));
    }

    fn push_text(&mut self, parent: NodeId, text: &str) {
        if text.is_empty() {
            return;
        }
        // Merge adjacent text runs (entities split them).
        if let Some(&last) = self.nodes[parent].children.last()
            && let NodeKind::Text(existing) = &mut self.nodes[last].kind
        {
            existing.push_str(text);
            return;
        }
        let id = self.nodes.len();
        self.nodes.push(Node {
            kind: NodeKind::Text(text.to_string()),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn namespaces(&self) -> &[(String, String)] {
        &self.namespaces
    }

    /// URI bound to `prefix` anywhere in the document.
    pub fn namespace_uri(&self, prefix: &str) -> Option<&str> {
        self.namespaces
            .iter()
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.as_str())
    }

    pub fn element_name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id].kind {
            NodeKind::Element { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[(String, String)] {
        match &self.nodes[id].kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id].kind, NodeKind::Element { .. })
    }

    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id]
            .children
            .iter()
            .copied()
            .filter(|child| self.is_element(*child))
    }

    /// All descendants in document order, not including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[id].children.iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.nodes[next].children.iter().rev().copied());
        }
        out
    }

    /// Concatenated text of the node and its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.nodes[id].kind {
            NodeKind::Text(text) => text.clone(),
            _ => self
                .descendants(id)
                .into_iter()
                .filter_map(|d| match &self.nodes[d].kind {
                    NodeKind::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

fn decode_name(raw: &[u8], html: bool) -> String {
    let name = String::from_utf8_lossy(raw).into_owned();
    if html { name.to_lowercase() } else { name }
}

fn read_tag(start: &BytesStart<'_>, html: bool) -> (String, Vec<(String, String)>) {
    let name = decode_name(start.name().as_ref(), html);
    let mut attributes = if html {
        start.html_attributes()
    } else {
        start.attributes()
    };

    let pairs = attributes
        .with_checks(false)
        .filter_map(|attr| attr.ok())
        .map(|attr| {
            let key = decode_name(attr.key.as_ref(), html);
            let raw: Cow<'_, [u8]> = attr.value;
            (key, unescape(&String::from_utf8_lossy(&raw)))
        })
        .collect();
    (name, pairs)
}

/// Resolve character and common named entity references. Unknown entities
/// are kept verbatim.
pub fn unescape(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let Some(semi) = after.find(';').filter(|&s| s <= 10) else {
            out.push('&');
            rest = after;
            continue;
        };
        let entity = &after[..semi];
        match decode_entity(entity) {
            Some(c) => {
                out.push(c);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(num) = entity.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code);
    }
    Some(match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "mdash" => '—',
        "ndash" => '–',
        "hellip" => '…',
        "laquo" => '«',
        "raquo" => '»',
        "euro" => '€',
        "pound" => '£',
        "deg" => '°',
        "middot" => '·',
        _ => return None,
    })
}
