use std::sync::{Arc, Mutex};

use restamp_core::{DomPage, RestampError, RestampResult};
use tokio::sync::broadcast;

use crate::parse::{escape_attr, escape_text, is_void, parse_fragment};

/// Handle to a node in a [`Document`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

impl NodeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct ElementData {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub kind: NodeKind,
}

impl Node {
    pub(crate) fn element_tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element(el) => Some(el.tag.as_str()),
            NodeKind::Text(_) => None,
        }
    }
}

/// One child-list batch, as a browser `MutationObserver` would report it.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub added_elements: usize,
}

pub type SharedDocument = Arc<Mutex<Document>>;

/// In-memory stand-in for the hosting page: a mutable element tree, the
/// current navigation URL, and a broadcast feed of child-list mutations.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    url: String,
    events: broadcast::Sender<Mutation>,
}

impl Document {
    pub fn parse(html: &str, url: &str) -> RestampResult<Self> {
        let mut nodes = Vec::new();
        let roots = parse_fragment(&mut nodes, html)?;
        let root = normalize_root(&mut nodes, roots);
        let (events, _) = broadcast::channel(64);
        Ok(Self {
            nodes,
            root,
            url: url.to_string(),
            events,
        })
    }

    /// A bare `<html><body></body></html>` document.
    pub fn empty(url: &str) -> Self {
        let mut nodes = Vec::new();
        let root = normalize_root(&mut nodes, Vec::new());
        let (events, _) = broadcast::channel(64);
        Self {
            nodes,
            root,
            url: url.to_string(),
            events,
        }
    }

    pub fn shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Mutation> {
        self.events.subscribe()
    }

    /// Simulate a client-side route change. Emits no mutation on its own;
    /// a real SPA navigation is always followed by re-render mutations.
    pub fn set_url(&mut self, url: &str) {
        self.url = url.to_string();
    }

    pub fn body(&self) -> NodeId {
        self.descendants(self.root)
            .into_iter()
            .find(|id| self.nodes[id.index()].element_tag() == Some("body"))
            .unwrap_or(self.root)
    }

    /// Parse `html` and append the resulting nodes under `parent`,
    /// emitting one mutation batch. This is how tests and the host
    /// environment model late rendering.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> RestampResult<Vec<NodeId>> {
        self.require_element(parent)?;
        let ids = parse_fragment(&mut self.nodes, html)?;
        for &id in &ids {
            self.nodes[id.index()].parent = Some(parent);
        }
        let mut children = std::mem::take(&mut self.nodes[parent.index()].children);
        children.extend(ids.iter().copied());
        self.nodes[parent.index()].children = children;
        if !ids.is_empty() {
            let added_elements = self.count_elements(&ids);
            let _ = self.events.send(Mutation { added_elements });
        }
        Ok(ids)
    }

    pub fn to_html(&self) -> String {
        self.outer_html(self.root)
    }

    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.index()].kind {
            NodeKind::Text(t) => out.push_str(&escape_text(t)),
            NodeKind::Element(el) => {
                out.push('<');
                out.push_str(&el.tag);
                for (name, value) in &el.attrs {
                    out.push(' ');
                    out.push_str(name);
                    if !value.is_empty() {
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                }
                out.push('>');
                if is_void(&el.tag) {
                    return;
                }
                for &child in &self.nodes[id.index()].children {
                    self.write_node(child, out);
                }
                out.push_str("</");
                out.push_str(&el.tag);
                out.push('>');
            }
        }
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk(id, &mut out);
        out
    }

    fn walk(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        for &child in &self.nodes[id.index()].children {
            self.walk(child, out);
        }
    }

    fn count_elements(&self, ids: &[NodeId]) -> usize {
        ids.iter()
            .filter(|id| self.nodes[id.index()].element_tag().is_some())
            .count()
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.nodes[id.index()].kind {
            NodeKind::Element(el) => Some(el),
            NodeKind::Text(_) => None,
        }
    }

    fn require_element(&self, id: NodeId) -> RestampResult<()> {
        match self.element(id) {
            Some(_) => Ok(()),
            None => Err(RestampError::Dom(format!(
                "node {} is not an element",
                id.index()
            ))),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> RestampResult<&mut ElementData> {
        match &mut self.nodes[id.index()].kind {
            NodeKind::Element(el) => Ok(el),
            NodeKind::Text(_) => Err(RestampError::Dom(format!(
                "node {} is not an element",
                id.index()
            ))),
        }
    }
}

impl DomPage for Document {
    type Handle = NodeId;

    fn elements(&self) -> Vec<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.nodes[id.index()].element_tag().is_some())
            .collect()
    }

    fn tag(&self, el: &NodeId) -> String {
        self.nodes[el.index()]
            .element_tag()
            .unwrap_or_default()
            .to_string()
    }

    fn attr(&self, el: &NodeId, name: &str) -> Option<String> {
        self.element(*el)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn has_class(&self, el: &NodeId, class: &str) -> bool {
        self.attr(el, "class")
            .is_some_and(|v| v.split_whitespace().any(|c| c == class))
    }

    fn text(&self, el: &NodeId) -> String {
        let mut out = String::new();
        for id in self.descendants(*el) {
            if let NodeKind::Text(t) = &self.nodes[id.index()].kind {
                out.push_str(t);
            }
        }
        out
    }

    fn closest(&self, el: &NodeId, tag: &str) -> Option<NodeId> {
        let mut cur = Some(*el);
        while let Some(id) = cur {
            if self.nodes[id.index()].element_tag() == Some(tag) {
                return Some(id);
            }
            cur = self.nodes[id.index()].parent;
        }
        None
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn remove_attr(&mut self, el: &NodeId, name: &str) -> RestampResult<()> {
        self.element_mut(*el)?.attrs.retain(|(n, _)| n != name);
        Ok(())
    }

    fn set_attr(&mut self, el: &NodeId, name: &str, value: &str) -> RestampResult<()> {
        let data = self.element_mut(*el)?;
        match data.attrs.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => data.attrs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    fn add_class(&mut self, el: &NodeId, class: &str) -> RestampResult<()> {
        if self.has_class(el, class) {
            return Ok(());
        }
        let existing = self.attr(el, "class").unwrap_or_default();
        let merged = if existing.is_empty() {
            class.to_string()
        } else {
            format!("{} {}", existing, class)
        };
        self.set_attr(el, "class", &merged)
    }

    fn set_inner_html(&mut self, el: &NodeId, html: &str) -> RestampResult<()> {
        self.require_element(*el)?;
        let ids = parse_fragment(&mut self.nodes, html)?;
        let old = std::mem::replace(&mut self.nodes[el.index()].children, ids.clone());
        for id in old {
            self.nodes[id.index()].parent = None;
        }
        for &id in &ids {
            self.nodes[id.index()].parent = Some(*el);
        }
        if !ids.is_empty() {
            let added_elements = self.count_elements(&ids);
            let _ = self.events.send(Mutation { added_elements });
        }
        Ok(())
    }

    fn set_style(&mut self, el: &NodeId, prop: &str, value: &str) -> RestampResult<()> {
        let mut props: Vec<(String, String)> = self
            .attr(el, "style")
            .unwrap_or_default()
            .split(';')
            .filter_map(|decl| {
                let (p, v) = decl.split_once(':')?;
                let p = p.trim();
                if p.is_empty() {
                    return None;
                }
                Some((p.to_string(), v.trim().to_string()))
            })
            .collect();
        match props.iter_mut().find(|(p, _)| p == prop) {
            Some(slot) => slot.1 = value.to_string(),
            None => props.push((prop.to_string(), value.to_string())),
        }
        let style = props
            .iter()
            .map(|(p, v)| format!("{}: {}", p, v))
            .collect::<Vec<_>>()
            .join("; ");
        self.set_attr(el, "style", &style)
    }
}

fn push_element(nodes: &mut Vec<Node>, tag: &str) -> NodeId {
    nodes.push(Node {
        parent: None,
        children: Vec::new(),
        kind: NodeKind::Element(ElementData {
            tag: tag.to_string(),
            attrs: Vec::new(),
        }),
    });
    NodeId::new(nodes.len() - 1)
}

/// Ensure the tree has a single `<html>` root with a body, wrapping loose
/// fragments the way a browser normalizes them.
fn normalize_root(nodes: &mut Vec<Node>, roots: Vec<NodeId>) -> NodeId {
    if roots.len() == 1 {
        match nodes[roots[0].index()].element_tag() {
            Some("html") => return roots[0],
            Some("body") => {
                let html = push_element(nodes, "html");
                nodes[roots[0].index()].parent = Some(html);
                nodes[html.index()].children.push(roots[0]);
                return html;
            }
            _ => {}
        }
    }
    let body = push_element(nodes, "body");
    for &id in &roots {
        nodes[id.index()].parent = Some(body);
        nodes[body.index()].children.push(id);
    }
    let html = push_element(nodes, "html");
    nodes[body.index()].parent = Some(html);
    nodes[html.index()].children.push(body);
    html
}
