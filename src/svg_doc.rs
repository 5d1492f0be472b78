//! Owned, mutable SVG element tree.
//!
//! Fetched markup is parsed once per mount with `quick-xml`; the annotator,
//! viewport and layer toggle then work on stable `NodeId`s instead of
//! re-querying markup. Anything that is not an element or text (prolog,
//! comments, CDATA, processing instructions) is kept as an owned event and
//! written back unchanged.

use quick_xml::{
    Reader, Writer,
    events::{BytesEnd, BytesStart, BytesText, Event},
};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("Malformed SVG markup: {0}")]
    Xml(String),
    #[error("Document has no <svg> root element")]
    NoSvgRoot,
    #[error("Unexpected end of SVG markup inside <{0}>")]
    Unclosed(String),
    #[error("Could not serialize SVG document: {0}")]
    Write(String),
}

fn xml_error(e: impl std::fmt::Display) -> DocumentError {
    DocumentError::Xml(e.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl Element {
    pub fn local_name(&self) -> &str {
        self.name.rsplit(':').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element(Element),
    Text(String),
    Verbatim(Event<'static>),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct SvgDocument {
    nodes: Vec<Node>,
    prolog: Vec<Event<'static>>,
    root: NodeId,
}

impl SvgDocument {
    pub fn parse(markup: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(markup);
        let mut nodes: Vec<Node> = Vec::new();
        let mut prolog = Vec::new();
        let mut stack: Vec<NodeId> = Vec::new();
        let mut root: Option<NodeId> = None;

        loop {
            let event = reader.read_event().map_err(xml_error)?;
            match event {
                Event::Eof => break,
                // Trailing elements after the root are not part of the drawing.
                Event::Start(_) | Event::Empty(_) if root.is_some() && stack.is_empty() => {}
                Event::Start(start) => {
                    let id = push_element(&mut nodes, &stack, &start)?;
                    root.get_or_insert(id);
                    stack.push(id);
                }
                Event::Empty(start) => {
                    let id = push_element(&mut nodes, &stack, &start)?;
                    root.get_or_insert(id);
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Text(text) => {
                    let content = text.unescape().map_err(xml_error)?.into_owned();
                    if let Some(&parent) = stack.last() {
                        push_node(&mut nodes, Some(parent), NodeData::Text(content));
                    }
                }
                other => {
                    let owned = other.into_owned();
                    match stack.last() {
                        Some(&parent) => {
                            push_node(&mut nodes, Some(parent), NodeData::Verbatim(owned));
                        }
                        None if root.is_none() => prolog.push(owned),
                        None => {}
                    }
                }
            }
        }

        if let Some(&open) = stack.last() {
            let name = match &nodes[open.0].data {
                NodeData::Element(el) => el.name.clone(),
                _ => String::new(),
            };
            return Err(DocumentError::Unclosed(name));
        }
        let root = root.ok_or(DocumentError::NoSvgRoot)?;
        let doc = Self {
            nodes,
            prolog,
            root,
        };
        if doc.local_name(root) != Some("svg") {
            return Err(DocumentError::NoSvgRoot);
        }
        Ok(doc)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(id.0)?.data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn local_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(Element::local_name)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| self.element(c).is_some())
            .collect()
    }

    /// Attached elements below `id`, depth first, in document order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(next) = stack.pop() {
            if self.element(next).is_none() {
                continue;
            }
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&p| self.parent(p))
    }

    pub fn attr(&self, id: NodeId, key: &str) -> Option<&str> {
        self.element(id)?
            .attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, id: NodeId, key: &str, value: &str) {
        let Some(el) = self.element_mut(id) else {
            return;
        };
        match el.attributes.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, key: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attributes.retain(|(k, _)| k != key);
        }
    }

    /// A declaration from the inline `style` attribute, e.g. `fill` in
    /// `style="fill: red; stroke: none"`.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<&str> {
        let style = self.attr(id, "style")?;
        style.split(';').find_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            (name.trim().eq_ignore_ascii_case(property)).then(|| value.trim())
        })
    }

    /// Style declaration first, presentation attribute second.
    pub fn presentation(&self, id: NodeId, property: &str) -> Option<&str> {
        self.style_property(id, property)
            .or_else(|| self.attr(id, property))
            .filter(|v| !v.is_empty())
    }

    pub fn remove_style_property(&mut self, id: NodeId, property: &str) {
        let Some(style) = self.attr(id, "style") else {
            return;
        };
        let kept = style
            .split(';')
            .filter(|decl| {
                let name = decl.split_once(':').map(|(n, _)| n).unwrap_or(decl);
                !decl.trim().is_empty() && !name.trim().eq_ignore_ascii_case(property)
            })
            .map(str::trim)
            .collect::<Vec<_>>()
            .join("; ");
        if kept.is_empty() {
            self.remove_attr(id, "style");
        } else {
            self.set_attr(id, "style", &kept);
        }
    }

    pub fn class_list(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    /// Rendered text below `id`; `<title>` and `<desc>` metadata is skipped.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            match self.nodes.get(next.0).map(|n| &n.data) {
                Some(NodeData::Text(text)) => out.push_str(text),
                Some(NodeData::Element(el))
                    if next != id && matches!(el.local_name(), "title" | "desc") => {}
                Some(NodeData::Element(_)) => {
                    stack.extend(self.children(next).iter().rev().copied());
                }
                _ => {}
            }
        }
        out
    }

    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        std::iter::once(self.root)
            .chain(self.descendants(self.root))
            .find(|&n| self.attr(n, "id") == Some(element_id))
    }

    /// Removes `id` from its parent; the node stays in the arena but is no
    /// longer reachable from the root.
    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        self.nodes[parent.0].children.retain(|&c| c != id);
        self.nodes[id.0].parent = None;
    }

    pub fn prepend_element(&mut self, parent: NodeId, name: &str) -> NodeId {
        let id = push_node(
            &mut self.nodes,
            None,
            NodeData::Element(Element {
                name: name.to_string(),
                attributes: Vec::new(),
            }),
        );
        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(0, id);
        id
    }

    /// Replaces all children of `id` with a single text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        for child in self.children(id).to_vec() {
            self.nodes[child.0].parent = None;
        }
        self.nodes[id.0].children.clear();
        push_node(&mut self.nodes, Some(id), NodeData::Text(text.to_string()));
    }

    pub fn to_svg_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        let write_error = |e: std::io::Error| DocumentError::Write(e.to_string());
        for event in &self.prolog {
            writer.write_event(event.borrow()).map_err(write_error)?;
        }
        self.write_node(&mut writer, self.root)?;
        String::from_utf8(writer.into_inner()).map_err(|e| DocumentError::Write(e.to_string()))
    }

    fn write_node(&self, writer: &mut Writer<Vec<u8>>, id: NodeId) -> Result<(), DocumentError> {
        let write_error = |e: std::io::Error| DocumentError::Write(e.to_string());
        match &self.nodes[id.0].data {
            NodeData::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(write_error),
            NodeData::Verbatim(event) => writer.write_event(event.borrow()).map_err(write_error),
            NodeData::Element(el) => {
                let mut start = BytesStart::new(el.name.as_str());
                for (key, value) in &el.attributes {
                    start.push_attribute((key.as_str(), value.as_str()));
                }
                let children = self.children(id);
                if children.is_empty() {
                    return writer.write_event(Event::Empty(start)).map_err(write_error);
                }
                writer.write_event(Event::Start(start)).map_err(write_error)?;
                for &child in children {
                    self.write_node(writer, child)?;
                }
                writer
                    .write_event(Event::End(BytesEnd::new(el.name.as_str())))
                    .map_err(write_error)
            }
        }
    }
}

fn push_node(nodes: &mut Vec<Node>, parent: Option<NodeId>, data: NodeData) -> NodeId {
    let id = NodeId(nodes.len());
    nodes.push(Node {
        data,
        parent,
        children: Vec::new(),
    });
    if let Some(parent) = parent {
        nodes[parent.0].children.push(id);
    }
    id
}

fn push_element(
    nodes: &mut Vec<Node>,
    stack: &[NodeId],
    start: &BytesStart<'_>,
) -> Result<NodeId, DocumentError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(xml_error)?
        .to_string();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(xml_error)?
            .to_string();
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        attributes.push((key, value));
    }
    Ok(push_node(
        nodes,
        stack.last().copied(),
        NodeData::Element(Element { name, attributes }),
    ))
}
