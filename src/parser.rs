use std::borrow::Cow;

use quick_xml::Reader;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};

use crate::error::LoadError;
use crate::gpx_types::{ElementKind, GpxVersion};

type Result<T> = std::result::Result<T, LoadError>;

/// Namespace bound to prefixes that are tolerated without a declaration.
pub const IGNORED_NAMESPACE: &str = "urn:ignore";
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Index of an element in [`XmlTree`]. Ids follow document order.
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct Attribute {
    /// Qualified name as written in the document.
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Element(NodeId),
}

#[derive(Debug, Clone)]
pub struct Element {
    /// Qualified name as written in the document.
    pub name: String,
    /// Set only for elements in the document's GPX namespace.
    pub kind: Option<ElementKind>,
    pub attributes: Vec<Attribute>,
    pub content: Vec<Content>,
    parent: Option<NodeId>,
}

impl Element {
    /// Value of the first attribute with this local name.
    pub fn attribute(&self, local_name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| !is_namespace_declaration(&a.name) && local_part(&a.name) == local_name)
            .map(|a| a.value.as_str())
    }
}

/// A loaded and validated GPX document held as an element arena.
#[derive(Debug)]
pub struct XmlTree {
    nodes: Vec<Element>,
    version: GpxVersion,
}

impl XmlTree {
    pub fn root(&self) -> NodeId {
        0
    }

    pub fn version(&self) -> GpxVersion {
        self.version
    }

    pub fn element(&self, id: NodeId) -> &Element {
        &self.nodes[id]
    }

    /// Every element of `kind` anywhere in the document, in document order.
    pub fn elements_of_kind(&self, kind: ElementKind) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.kind == Some(kind))
            .map(|(id, _)| id)
    }

    /// Elements of any of `kinds`, in document order.
    pub fn elements_of_kinds<'a>(
        &'a self,
        kinds: &'a [ElementKind],
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.kind.is_some_and(|k| kinds.contains(&k)))
            .map(|(id, _)| id)
    }

    pub fn contains(&self, kind: ElementKind) -> bool {
        self.nodes.iter().any(|e| e.kind == Some(kind))
    }

    /// Direct children of `id` with the given kind.
    pub fn children(&self, id: NodeId, kind: ElementKind) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id].content.iter().filter_map(move |c| match c {
            Content::Element(child) if self.nodes[*child].kind == Some(kind) => Some(*child),
            _ => None,
        })
    }

    /// First direct child of `id` with the given kind.
    pub fn child(&self, id: NodeId, kind: ElementKind) -> Option<NodeId> {
        self.children(id, kind).next()
    }

    /// Concatenated text of the element and all of its descendants.
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        for content in &self.nodes[id].content {
            match content {
                Content::Text(text) => out.push_str(text),
                Content::Element(child) => self.collect_text(*child, out),
            }
        }
    }

    /// Serialize the subtree rooted at `id`. Namespace declarations made on
    /// ancestors are repeated on the top element so the fragment stands alone.
    pub fn to_xml(&self, id: NodeId) -> String {
        let mut inherited: Vec<&Attribute> = Vec::new();
        let mut ancestor = self.nodes[id].parent;
        while let Some(a) = ancestor {
            for attr in &self.nodes[a].attributes {
                let declared_below = self.nodes[id].attributes.iter().any(|x| x.name == attr.name)
                    || inherited.iter().any(|x| x.name == attr.name);
                if is_namespace_declaration(&attr.name) && !declared_below {
                    inherited.push(attr);
                }
            }
            ancestor = self.nodes[a].parent;
        }

        let mut out = String::new();
        self.write_element(id, &inherited, &mut out);
        out
    }

    fn write_element(&self, id: NodeId, extra: &[&Attribute], out: &mut String) {
        let element = &self.nodes[id];
        out.push('<');
        out.push_str(&element.name);
        for attr in element.attributes.iter().chain(extra.iter().copied()) {
            out.push(' ');
            out.push_str(&attr.name);
            out.push_str("=\"");
            out.push_str(&escape(attr.value.as_str()));
            out.push('"');
        }
        if element.content.is_empty() {
            out.push_str(" />");
            return;
        }
        out.push('>');
        for content in &element.content {
            match content {
                Content::Text(text) => out.push_str(&escape(text.as_str())),
                Content::Element(child) => self.write_element(*child, &[], out),
            }
        }
        out.push_str("</");
        out.push_str(&element.name);
        out.push('>');
    }
}

/// Parse and validate a GPX document.
///
/// Prefixes listed in `ignored_prefixes` may be used without being declared;
/// they are bound to [`IGNORED_NAMESPACE`]. Any other undeclared prefix is an
/// error, as are a root element other than `gpx` and a default namespace
/// other than GPX 1.0 or 1.1.
pub fn parse_document(bytes: &[u8], ignored_prefixes: &[String]) -> Result<XmlTree> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let xml = std::str::from_utf8(bytes)?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().expand_empty_elements = true;

    let mut base_scope: Vec<(String, String)> = ignored_prefixes
        .iter()
        .map(|p| (p.clone(), IGNORED_NAMESPACE.to_string()))
        .collect();
    base_scope.push(("xml".to_string(), XML_NAMESPACE.to_string()));

    let mut builder = TreeBuilder {
        nodes: Vec::new(),
        open: Vec::new(),
        scopes: vec![base_scope],
        pending_text: String::new(),
        version: None,
    };

    loop {
        match reader.read_event()? {
            Event::Start(e) => builder.start(&e)?,
            Event::End(_) => builder.end()?,
            Event::Text(e) => {
                builder.pending_text.push_str(std::str::from_utf8(e.as_ref())?);
            }
            Event::CData(e) => {
                builder.pending_text.push_str(std::str::from_utf8(e.as_ref())?);
            }
            Event::GeneralRef(e) => {
                if let Ok(Some(ch)) = e.resolve_char_ref() {
                    builder.pending_text.push(ch);
                } else {
                    match std::str::from_utf8(e.as_ref())? {
                        "amp" => builder.pending_text.push('&'),
                        "lt" => builder.pending_text.push('<'),
                        "gt" => builder.pending_text.push('>'),
                        "quot" => builder.pending_text.push('"'),
                        "apos" => builder.pending_text.push('\''),
                        _ => {}
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(&open) = builder.open.last() {
        return Err(LoadError::UnclosedElement(builder.nodes[open].name.clone()));
    }
    match builder.version {
        Some(version) => Ok(XmlTree {
            nodes: builder.nodes,
            version,
        }),
        None => Err(LoadError::NoRoot),
    }
}

struct TreeBuilder {
    nodes: Vec<Element>,
    open: Vec<NodeId>,
    scopes: Vec<Vec<(String, String)>>,
    pending_text: String,
    version: Option<GpxVersion>,
}

impl TreeBuilder {
    fn start(&mut self, e: &BytesStart<'_>) -> Result<()> {
        if self.open.is_empty() && !self.nodes.is_empty() {
            return Err(LoadError::MultipleRoots);
        }
        self.flush_text();

        let name = std::str::from_utf8(e.name().as_ref())?.to_string();
        let mut attributes = Vec::new();
        let mut declarations = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            let key = std::str::from_utf8(attr.key.as_ref())?.to_string();
            let raw = std::str::from_utf8(&attr.value)?;
            let value = unescape(raw).unwrap_or(Cow::Borrowed(raw)).into_owned();
            if key == "xmlns" {
                declarations.push((String::new(), value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                declarations.push((prefix.to_string(), value.clone()));
            }
            attributes.push(Attribute { name: key, value });
        }
        self.scopes.push(declarations);

        for attr in &attributes {
            if !is_namespace_declaration(&attr.name) {
                if let Some((prefix, _)) = attr.name.split_once(':') {
                    self.resolve(prefix)?;
                }
            }
        }

        let (prefix, local) = name.split_once(':').unwrap_or(("", name.as_str()));
        let namespace = if prefix.is_empty() {
            self.resolve("").ok()
        } else {
            Some(self.resolve(prefix)?)
        };

        let id = self.nodes.len();
        if id == 0 {
            if local != "gpx" {
                return Err(LoadError::NotGpx(name));
            }
            let default = self.resolve("").unwrap_or_default();
            let version = GpxVersion::from_namespace(&default)
                .ok_or_else(|| LoadError::UnsupportedNamespace(default.clone()))?;
            self.version = Some(version);
        }

        let kind = match (self.version, namespace) {
            (Some(version), Some(ns)) if ns == version.namespace() => {
                ElementKind::from_local_name(local.as_bytes())
            }
            _ => None,
        };

        let parent = self.open.last().copied();
        if let Some(parent) = parent {
            self.nodes[parent].content.push(Content::Element(id));
        }
        self.nodes.push(Element {
            name,
            kind,
            attributes,
            content: Vec::new(),
            parent,
        });
        self.open.push(id);
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.flush_text();
        self.scopes.pop();
        self.open.pop();
        Ok(())
    }

    /// Attach buffered character data to the open element. Whitespace-only
    /// runs between tags are dropped.
    fn flush_text(&mut self) {
        let text = std::mem::take(&mut self.pending_text);
        if text.trim().is_empty() {
            return;
        }
        if let Some(&open) = self.open.last() {
            self.nodes[open].content.push(Content::Text(text));
        }
    }

    fn resolve(&self, prefix: &str) -> Result<String> {
        self.scopes
            .iter()
            .rev()
            .flat_map(|scope| scope.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, uri)| uri.clone())
            .ok_or_else(|| LoadError::UndeclaredPrefix(prefix.to_string()))
    }
}

fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

fn local_part(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}
