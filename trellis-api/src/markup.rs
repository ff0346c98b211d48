//! Markup tree handed to the output transform.
//!
//! The kernel's tree builder produces either one full [`Element`] tree
//! (first load) or a list of [`UpdateOp`]s (subsequent interactions). The
//! external transform turns either into final bytes; this crate only
//! defines the shape.

use crate::NodeId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One markup element: a name, ordered attributes, and ordered children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    /// Attributes in declaration order. Insertion wins on duplicate names.
    pub attrs: IndexMap<String, String>,
    pub children: Vec<MarkupNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Set an attribute, preserving first-insertion order.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn push_element(&mut self, child: Element) {
        self.children.push(MarkupNode::Element(child));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.children.push(MarkupNode::Text(text.into()));
    }
}

/// A child position in an element: nested element or raw text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarkupNode {
    Element(Element),
    Text(String),
}

/// One operation in an incremental update response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UpdateOp {
    /// Replace the element for `id` with a freshly built one.
    Update { id: NodeId, element: Element },
    /// A child was added under `parent` since the last build.
    ChildAdded { parent: NodeId, element: Element },
    /// The child `child` was removed from under `parent`.
    ChildRemoved { parent: NodeId, child: NodeId },
}

impl UpdateOp {
    /// The node this operation addresses on the client.
    pub fn target(&self) -> NodeId {
        match self {
            UpdateOp::Update { id, .. } => *id,
            UpdateOp::ChildAdded { parent, .. } => *parent,
            UpdateOp::ChildRemoved { parent, .. } => *parent,
        }
    }
}
