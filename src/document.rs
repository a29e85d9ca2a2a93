//! Arena-backed document tree.
//!
//! The plotter only reads the tree, except for the persisted progress block
//! which the host asks us to write back. Nodes keep a parent link so
//! transforms can be composed by walking up from any node.

use crate::errors::DocumentError;
use std::collections::HashMap;

const INKSCAPE_NS: &str = "http://www.inkscape.org/namespaces/inkscape";
const SODIPODI_NS: &str = "http://sodipodi.sourceforge.net/DTD/sodipodi-0.dtd";
const XLINK_NS: &str = "http://www.w3.org/1999/xlink";
const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// Index of a node in its [`Document`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A scene graph: one `svg` root, element children, attributes as strings.
///
/// Attribute names of the Inkscape, Sodipodi and XLink namespaces keep
/// their conventional prefixes (`inkscape:label`, `xlink:href`).
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    ids: HashMap<String, NodeId>,
}

impl Document {
    /// Create a document holding only an `svg` root with the given attributes
    pub fn new<K, V>(root_attributes: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut doc = Document {
            nodes: Vec::new(),
            ids: HashMap::new(),
        };
        doc.push_node("svg".to_string(), collect_attributes(root_attributes), None);
        doc
    }

    /// Load an SVG document
    pub fn parse_svg(text: &str) -> Result<Self, DocumentError> {
        let xml = roxmltree::Document::parse(text)?;
        let root = xml.root_element();
        if root.tag_name().name() != "svg" {
            return Err(DocumentError::NotSvg {
                root: root.tag_name().name().to_string(),
            });
        }

        let mut doc = Document {
            nodes: Vec::new(),
            ids: HashMap::new(),
        };
        let root_id = doc.push_node("svg".to_string(), xml_attributes(root), None);
        let mut pending = vec![(root, root_id)];
        while let Some((xml_node, id)) = pending.pop() {
            for child in xml_node.children().filter(|n| n.is_element()) {
                let tag = qualified_name(child.tag_name().namespace(), child.tag_name().name());
                let child_id = doc.push_node(tag, xml_attributes(child), Some(id));
                pending.push((child, child_id));
            }
        }
        Ok(doc)
    }

    fn push_node(
        &mut self,
        tag: String,
        attributes: Vec<(String, String)>,
        parent: Option<NodeId>,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some((_, value)) = attributes.iter().find(|(name, _)| name == "id") {
            self.ids.entry(value.clone()).or_insert(id);
        }
        self.nodes.push(NodeData {
            tag,
            attributes,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            self.nodes[parent.0].children.push(id);
        }
        id
    }

    /// Append a new element under `parent`
    pub fn append_child<K, V>(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: impl IntoIterator<Item = (K, V)>,
    ) -> NodeId
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.push_node(tag.to_string(), collect_attributes(attributes), Some(parent))
    }

    /// Set or replace one attribute
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if name == "id" {
            self.ids.insert(value.clone(), id);
        }
        let attributes = &mut self.nodes[id.0].attributes;
        match attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => attributes.push((name.to_string(), value)),
        }
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(NodeId(0))
    }

    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { doc: self, id }
    }

    /// Look up an element by its `id` attribute
    pub fn find_by_id(&self, id: &str) -> Option<NodeRef<'_>> {
        self.ids.get(id).map(|&id| self.node(id))
    }

    /// All nodes in document order
    pub fn descendants(&self) -> impl Iterator<Item = NodeRef<'_>> {
        let mut stack = vec![NodeId(0)];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.nodes[id.0].children.iter().rev().copied());
            Some(self.node(id))
        })
    }
}

fn collect_attributes<K, V>(attributes: impl IntoIterator<Item = (K, V)>) -> Vec<(String, String)>
where
    K: Into<String>,
    V: Into<String>,
{
    attributes
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

fn qualified_name(namespace: Option<&str>, local: &str) -> String {
    match namespace {
        Some(INKSCAPE_NS) => format!("inkscape:{local}"),
        Some(SODIPODI_NS) => format!("sodipodi:{local}"),
        Some(XLINK_NS) => format!("xlink:{local}"),
        None | Some(SVG_NS) => local.to_string(),
        Some(_) => local.to_string(),
    }
}

fn xml_attributes(node: roxmltree::Node<'_, '_>) -> Vec<(String, String)> {
    node.attributes()
        .map(|a| (qualified_name(a.namespace(), a.name()), a.value().to_string()))
        .collect()
}

/// Borrowed handle to one node
#[derive(Clone, Copy)]
pub struct NodeRef<'d> {
    doc: &'d Document,
    id: NodeId,
}

impl std::fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}", self.tag())?;
        if let Some(id) = self.attr("id") {
            write!(f, " id={id:?}")?;
        }
        write!(f, ">")
    }
}

impl<'d> NodeRef<'d> {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'d Document {
        self.doc
    }

    fn data(&self) -> &'d NodeData {
        &self.doc.nodes[self.id.0]
    }

    pub fn tag(&self) -> &'d str {
        &self.data().tag
    }

    pub fn attr(&self, name: &str) -> Option<&'d str> {
        self.data()
            .attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn parent(&self) -> Option<NodeRef<'d>> {
        self.data().parent.map(|id| self.doc.node(id))
    }

    pub fn children(&self) -> impl DoubleEndedIterator<Item = NodeRef<'d>> + 'd {
        let doc = self.doc;
        self.data().children.iter().map(move |&id| doc.node(id))
    }

    /// Ancestors from the parent outward
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'d>> + 'd {
        std::iter::successors(self.parent(), |n| n.parent())
    }

    /// Value of one declaration in the inline `style` attribute
    pub fn style(&self, property: &str) -> Option<&'d str> {
        self.attr("style")?
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(name, _)| name.trim() == property)
            .map(|(_, value)| value.trim())
    }

    /// Whether this element is hidden from plotting by its own visibility or
    /// display property
    pub fn is_hidden(&self) -> bool {
        let visibility = self.style("visibility").or(self.attr("visibility"));
        if matches!(visibility, Some("hidden" | "collapse")) {
            return true;
        }
        let display = self.style("display").or(self.attr("display"));
        display == Some("none")
    }

    /// Containers whose transforms compose into their descendants
    pub fn is_group(&self) -> bool {
        matches!(self.tag(), "g" | "a" | "switch")
    }

    /// Inkscape layer groups carry `inkscape:groupmode="layer"`
    pub fn is_layer(&self) -> bool {
        self.tag() == "g" && self.attr("inkscape:groupmode") == Some("layer")
    }

    /// Target of a `use` element, either `xlink:href` or plain `href`
    pub fn href_target(&self) -> Option<NodeRef<'d>> {
        let href = self.attr("xlink:href").or(self.attr("href"))?;
        self.doc.find_by_id(href.strip_prefix('#')?)
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.doc, other.doc) && self.id == other.id
    }
}
