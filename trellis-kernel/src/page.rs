//! The page: one server-resident application instance.

use crate::component::ComponentNode;

/// A server-resident application instance: the component tree plus its
/// activation state. Owned by a [`crate::registry::PageContext`] and only
/// ever touched under that context's execution lock.
pub struct Page {
    root: Option<ComponentNode>,
}

impl Page {
    pub fn new() -> Self {
        Page { root: None }
    }

    /// Install the root component node. Happens once, during
    /// initialization.
    pub fn set_root(&mut self, root: ComponentNode) {
        self.root = Some(root);
    }

    pub fn root(&self) -> Option<&ComponentNode> {
        self.root.as_ref()
    }

    pub fn root_mut(&mut self) -> Option<&mut ComponentNode> {
        self.root.as_mut()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}
