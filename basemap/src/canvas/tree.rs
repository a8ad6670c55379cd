//! Layer tree with nested groups.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Unique layer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayerId(u64);

impl LayerId {
    /// Allocates a new process-unique id.
    pub fn next() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Raster,
    Vector,
}

/// A map layer as seen by the layer tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
}

impl LayerEntry {
    pub fn new(name: impl Into<String>, kind: LayerKind) -> Self {
        Self {
            id: LayerId::next(),
            name: name.into(),
            kind,
            visible: true,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
}

/// A node of the tree: a layer or a named group of nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerNode {
    Layer(LayerEntry),
    Group { name: String, children: Vec<LayerNode> },
}

/// Ordered layer tree. The first top-level node is drawn on top.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerTree {
    nodes: Vec<LayerNode>,
}

impl LayerTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[LayerNode] {
        &self.nodes
    }

    /// Adds a layer at the top level, drawn above existing layers.
    pub fn add_layer(&mut self, layer: LayerEntry) {
        self.nodes.insert(0, LayerNode::Layer(layer));
    }

    /// Adds a layer at the top level, drawn below existing layers.
    pub fn add_layer_bottom(&mut self, layer: LayerEntry) {
        self.nodes.push(LayerNode::Layer(layer));
    }

    /// Adds an empty top-level group unless one with that name exists.
    pub fn add_group(&mut self, name: impl Into<String>) {
        let name = name.into();
        if find_group(&mut self.nodes, &name).is_none() {
            self.nodes.push(LayerNode::Group {
                name,
                children: Vec::new(),
            });
        }
    }

    /// Adds a layer to the named group, searching nested groups.
    ///
    /// Returns the layer back if no such group exists.
    pub fn add_to_group(&mut self, group: &str, layer: LayerEntry) -> Result<(), LayerEntry> {
        match find_group(&mut self.nodes, group) {
            Some(children) => {
                children.push(LayerNode::Layer(layer));
                Ok(())
            }
            None => Err(layer),
        }
    }

    /// Moves a layer into the named group. Returns false if either is missing.
    pub fn move_to_group(&mut self, id: LayerId, group: &str) -> bool {
        if find_group(&mut self.nodes, group).is_none() {
            return false;
        }
        match self.remove(id) {
            Some(layer) => self.add_to_group(group, layer).is_ok(),
            None => false,
        }
    }

    /// Finds a layer anywhere in the tree.
    pub fn find(&self, id: LayerId) -> Option<&LayerEntry> {
        fn walk(nodes: &[LayerNode], id: LayerId) -> Option<&LayerEntry> {
            nodes.iter().find_map(|node| match node {
                LayerNode::Layer(layer) if layer.id == id => Some(layer),
                LayerNode::Layer(_) => None,
                LayerNode::Group { children, .. } => walk(children, id),
            })
        }
        walk(&self.nodes, id)
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.find(id).is_some()
    }

    /// Removes a layer wherever it sits in the tree.
    pub fn remove(&mut self, id: LayerId) -> Option<LayerEntry> {
        fn walk(nodes: &mut Vec<LayerNode>, id: LayerId) -> Option<LayerEntry> {
            if let Some(index) = nodes
                .iter()
                .position(|n| matches!(n, LayerNode::Layer(layer) if layer.id == id))
            {
                return match nodes.remove(index) {
                    LayerNode::Layer(layer) => Some(layer),
                    LayerNode::Group { .. } => None,
                };
            }
            nodes.iter_mut().find_map(|node| match node {
                LayerNode::Group { children, .. } => walk(children, id),
                LayerNode::Layer(_) => None,
            })
        }
        walk(&mut self.nodes, id)
    }

    /// Removes a group and everything in it, returning the removed layers.
    pub fn remove_group(&mut self, name: &str) -> Vec<LayerEntry> {
        fn collect(node: LayerNode, out: &mut Vec<LayerEntry>) {
            match node {
                LayerNode::Layer(layer) => out.push(layer),
                LayerNode::Group { children, .. } => {
                    children.into_iter().for_each(|child| collect(child, out))
                }
            }
        }
        fn walk(nodes: &mut Vec<LayerNode>, name: &str) -> Option<LayerNode> {
            if let Some(index) = nodes
                .iter()
                .position(|n| matches!(n, LayerNode::Group { name: group, .. } if group == name))
            {
                return Some(nodes.remove(index));
            }
            nodes.iter_mut().find_map(|node| match node {
                LayerNode::Group { children, .. } => walk(children, name),
                LayerNode::Layer(_) => None,
            })
        }

        let mut removed = Vec::new();
        if let Some(group) = walk(&mut self.nodes, name) {
            collect(group, &mut removed);
        }
        removed
    }

    /// All layers, depth first in draw order.
    pub fn layers(&self) -> Vec<&LayerEntry> {
        fn walk<'a>(nodes: &'a [LayerNode], out: &mut Vec<&'a LayerEntry>) {
            for node in nodes {
                match node {
                    LayerNode::Layer(layer) => out.push(layer),
                    LayerNode::Group { children, .. } => walk(children, out),
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    /// Number of layers, not counting groups.
    pub fn layer_count(&self) -> usize {
        self.layers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.layer_count() == 0
    }
}

fn find_group<'a>(nodes: &'a mut Vec<LayerNode>, name: &str) -> Option<&'a mut Vec<LayerNode>> {
    for node in nodes.iter_mut() {
        if let LayerNode::Group {
            name: group,
            children,
        } = node
        {
            if group == name {
                return Some(children);
            }
            if let Some(found) = find_group(children, name) {
                return Some(found);
            }
        }
    }
    None
}
