//! The component tree: stateful nodes that render themselves to markup.
//!
//! A [`ComponentNode`] owns one [`Component`] instance plus its child nodes.
//! Each component's behavior is described by a static [`ComponentType`]
//! record registered at startup: its ancestor chain, its remote-callable
//! methods, and its custom-build hooks. There is no runtime introspection;
//! everything the kernel needs to know about a type is in that record.

mod builder;
mod script;

pub use builder::{BuildPhase, TreeBuilder};
pub use script::ScriptCall;

use crate::error::DispatchFault;
use serde_json::Value;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use trellis_api::NodeId;

/// Counter for generating unique node IDs.
static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate a new unique node ID.
pub fn next_node_id() -> NodeId {
    NodeId(NODE_ID_COUNTER.fetch_add(1, Ordering::SeqCst))
}

/// A stateful, markup-producing component.
///
/// Implementations hold their own mutable state; the kernel reaches it
/// through `as_any_mut` when dispatching remote methods.
pub trait Component: Send + 'static {
    /// The static registration record for this component's type.
    fn type_info(&self) -> &'static ComponentType;

    /// Declared attributes, in declaration order.
    fn attrs(&self) -> Vec<(&'static str, AttrValue)> {
        Vec::new()
    }

    /// Whether this view initializes its declared child view. Only
    /// consulted during page initialization for view components.
    fn init_child(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// An attribute value as declared by a component.
///
/// Booleans and numbers are emitted as script-safe literals; everything
/// else goes through the pluggable attribute serializer.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(Value),
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        AttrValue::Float(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        AttrValue::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        AttrValue::Text(v)
    }
}

impl From<Value> for AttrValue {
    fn from(v: Value) -> Self {
        AttrValue::Json(v)
    }
}

/// Static registration record for a component type.
///
/// One of these exists per component type, declared as a `static` and
/// shared by every instance. The `parent` link forms the ancestor chain
/// that remote-method resolution walks.
pub struct ComponentType {
    /// Type tag; also the markup element name for nodes of this type.
    pub name: &'static str,
    /// The immediate ancestor type, if any.
    pub parent: Option<&'static ComponentType>,
    /// Method declarations, in declaration order. Non-remote entries
    /// exist to shadow same-named remote methods of an ancestor.
    pub methods: &'static [MethodDecl],
    /// Custom-build hooks, in declaration order.
    pub hooks: &'static [HookDecl],
}

impl ComponentType {
    /// Ancestor chain starting at this type, most-derived first.
    pub fn chain(&'static self) -> impl Iterator<Item = &'static ComponentType> {
        std::iter::successors(Some(self), |ty| ty.parent)
    }
}

/// Signature of a remote-callable method body.
///
/// The target node is passed whole so the method can mutate its component
/// state, mark it dirty, and add or remove children.
pub type RemoteFn = fn(&mut ComponentNode, &[Value]) -> Result<(), DispatchFault>;

/// One method declaration on a [`ComponentType`].
pub struct MethodDecl {
    pub name: &'static str,
    /// Only remote-marked methods are callable from the client. A
    /// non-remote declaration still shadows an ancestor's remote method
    /// of the same name.
    pub remote: bool,
    /// Declared positional argument count.
    pub arity: usize,
    pub invoke: RemoteFn,
}

impl MethodDecl {
    /// Declare a remote-callable method.
    pub const fn remote(name: &'static str, arity: usize, invoke: RemoteFn) -> Self {
        MethodDecl {
            name,
            remote: true,
            arity,
            invoke,
        }
    }

    /// Declare a non-remote method that shadows an ancestor's remote
    /// method of the same name.
    pub const fn shadow(name: &'static str) -> Self {
        MethodDecl {
            name,
            remote: false,
            arity: 0,
            invoke: shadowed_stub,
        }
    }
}

fn shadowed_stub(_node: &mut ComponentNode, _args: &[Value]) -> Result<(), DispatchFault> {
    // Unreachable through resolution; shadow entries are never returned
    // as callable.
    Err(DispatchFault::invocation(
        "<shadowed>",
        anyhow::anyhow!("shadow declarations are not invocable"),
    ))
}

/// Signature of a custom-build hook body.
///
/// The hook receives its component and a container element to fill. If the
/// hook is declared unwrapped, the container's children are inlined into
/// the node's element instead.
pub type HookFn = fn(&dyn Any, &mut trellis_api::Element) -> anyhow::Result<()>;

/// A custom-build hook declaration: a dynamically produced child element.
pub struct HookDecl {
    pub name: &'static str,
    /// Fire during full builds.
    pub fires_on_create: bool,
    /// Fire during incremental builds.
    pub fires_on_update: bool,
    /// Wrap the hook's output in a container element named after the hook.
    pub wrap: bool,
    /// Overrides `name` for wrapping purposes.
    pub explicit_name: Option<&'static str>,
    pub build: HookFn,
}

impl HookDecl {
    /// The element name used when this hook's output is wrapped.
    pub fn effective_name(&self) -> &'static str {
        self.explicit_name.unwrap_or(self.name)
    }

    /// Whether this hook fires in the given build phase.
    pub fn fires_in(&self, phase: BuildPhase) -> bool {
        match phase {
            BuildPhase::Create => self.fires_on_create,
            BuildPhase::Update => self.fires_on_update,
        }
    }
}

/// One node in a page's component tree.
///
/// Children are exclusively owned by their parent; the page owns the root.
pub struct ComponentNode {
    id: NodeId,
    component: Box<dyn Component>,
    children: Vec<ComponentNode>,
    /// Set when the component mutated observable state since the last
    /// committed build pass.
    dirty: bool,
    /// Set on nodes added since the last committed build pass.
    fresh: bool,
    /// Children removed since the last committed build pass.
    removed_children: Vec<NodeId>,
}

impl ComponentNode {
    pub fn new(component: Box<dyn Component>) -> Self {
        ComponentNode {
            id: next_node_id(),
            component,
            children: Vec::new(),
            dirty: false,
            fresh: true,
            removed_children: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn type_info(&self) -> &'static ComponentType {
        self.component.type_info()
    }

    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Downcast this node's component to its concrete type.
    pub fn state<T: Component>(&self) -> Option<&T> {
        self.component.as_any().downcast_ref()
    }

    /// Downcast this node's component mutably.
    pub fn state_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.component.as_any_mut().downcast_mut()
    }

    pub fn children(&self) -> &[ComponentNode] {
        &self.children
    }

    /// Append a child node. Returns the child's id.
    pub fn add_child(&mut self, child: ComponentNode) -> NodeId {
        let id = child.id;
        self.children.push(child);
        id
    }

    /// Remove a direct child by id. Idempotent; returns whether a child
    /// was actually removed.
    pub fn remove_child(&mut self, id: NodeId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c.id != id);
        if self.children.len() < before {
            self.removed_children.push(id);
            true
        } else {
            false
        }
    }

    /// Mark this node's output as stale since the last build pass.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn is_fresh(&self) -> bool {
        self.fresh
    }

    pub(crate) fn removed_children(&self) -> &[NodeId] {
        &self.removed_children
    }

    /// Find a node by id in this subtree.
    pub fn find(&self, id: NodeId) -> Option<&ComponentNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    /// Find a node mutably by id in this subtree.
    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut ComponentNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Commit a completed build pass: clear dirty and structural markers
    /// in the whole subtree. Called only after a pass succeeds.
    pub(crate) fn commit_build(&mut self) {
        self.dirty = false;
        self.fresh = false;
        self.removed_children.clear();
        for child in &mut self.children {
            child.commit_build();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    static PLAIN_TYPE: ComponentType = ComponentType {
        name: "Plain",
        parent: None,
        methods: &[],
        hooks: &[],
    };

    impl Component for Plain {
        fn type_info(&self) -> &'static ComponentType {
            &PLAIN_TYPE
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn node_ids_are_unique() {
        let a = ComponentNode::new(Box::new(Plain));
        let b = ComponentNode::new(Box::new(Plain));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn remove_child_is_idempotent() {
        let mut root = ComponentNode::new(Box::new(Plain));
        let id = root.add_child(ComponentNode::new(Box::new(Plain)));
        assert!(root.remove_child(id));
        assert!(!root.remove_child(id));
        assert_eq!(root.removed_children(), &[id]);
    }

    #[test]
    fn find_descends_the_subtree() {
        let mut root = ComponentNode::new(Box::new(Plain));
        let mut mid = ComponentNode::new(Box::new(Plain));
        let leaf_id = mid.add_child(ComponentNode::new(Box::new(Plain)));
        root.add_child(mid);
        assert!(root.find(leaf_id).is_some());
        assert_eq!(root.find(leaf_id).unwrap().id(), leaf_id);
    }

    #[test]
    fn commit_clears_markers_recursively() {
        let mut root = ComponentNode::new(Box::new(Plain));
        let child_id = root.add_child(ComponentNode::new(Box::new(Plain)));
        root.mark_dirty();
        root.find_mut(child_id).unwrap().mark_dirty();
        root.commit_build();
        assert!(!root.is_dirty());
        assert!(!root.find(child_id).unwrap().is_dirty());
        assert!(!root.find(child_id).unwrap().is_fresh());
    }

    #[test]
    fn ancestor_chain_is_most_derived_first() {
        static BASE: ComponentType = ComponentType {
            name: "Base",
            parent: None,
            methods: &[],
            hooks: &[],
        };
        static DERIVED: ComponentType = ComponentType {
            name: "Derived",
            parent: Some(&BASE),
            methods: &[],
            hooks: &[],
        };
        let names: Vec<&str> = DERIVED.chain().map(|t| t.name).collect();
        assert_eq!(names, vec!["Derived", "Base"]);
    }
}
