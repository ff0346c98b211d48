//! Tree builder: full and incremental serialization of a component tree.
//!
//! A full build walks the whole tree and produces one element per node. An
//! incremental build emits an [`UpdateOp`] per dirty node, plus structural
//! ops at parents whose child list changed. Either pass commits (clears)
//! the tree's dirty and structural markers only after it completes; a
//! failed pass leaves every marker in place for the next attempt.

use crate::component::{AttrValue, ComponentNode};
use crate::error::KernelError;
use crate::serialize::AttributeSerializer;
use trellis_api::{Element, NodeId, UpdateOp};

/// Which kind of build pass is running. Hooks declare which phases they
/// fire in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    /// Full build (first render, or a freshly added subtree).
    Create,
    /// Incremental rebuild of a dirty node.
    Update,
}

pub struct TreeBuilder<'a> {
    serializer: &'a dyn AttributeSerializer,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(serializer: &'a dyn AttributeSerializer) -> Self {
        TreeBuilder { serializer }
    }

    /// Build the full markup tree and commit the pass.
    pub fn full_build(&self, root: &mut ComponentNode) -> Result<Element, KernelError> {
        let element = self.build_element(root, BuildPhase::Create)?;
        root.commit_build();
        Ok(element)
    }

    /// Build the minimal update-operation list for everything that changed
    /// since the last committed pass, then commit.
    ///
    /// Running this twice without an intervening mutation yields an empty
    /// list the second time.
    pub fn incremental_build(&self, root: &mut ComponentNode) -> Result<Vec<UpdateOp>, KernelError> {
        let mut ops = Vec::new();
        self.collect_updates(root, &mut ops)?;
        root.commit_build();
        Ok(ops)
    }

    /// One node's element: declared attributes, static children in order,
    /// then custom-build hooks in declaration order (ancestors' hooks
    /// before the concrete type's own). `phase` applies to this node's
    /// hooks; descendants inside the element are re-created wholesale and
    /// build with [`BuildPhase::Create`].
    fn build_element(&self, node: &ComponentNode, phase: BuildPhase) -> Result<Element, KernelError> {
        let ty = node.type_info();
        let mut element = Element::new(ty.name);
        element.set_attr("id", node.id().to_string());

        for (name, value) in node.component().attrs() {
            element.set_attr(name, self.serialize_attr(node.id(), &value)?);
        }

        for child in node.children() {
            element.push_element(self.build_element(child, BuildPhase::Create)?);
        }

        let mut chain: Vec<_> = ty.chain().collect();
        chain.reverse();
        for declared in chain {
            for hook in declared.hooks {
                if !hook.fires_in(phase) {
                    continue;
                }
                let mut container = Element::new(hook.effective_name());
                (hook.build)(node.component().as_any(), &mut container).map_err(|source| {
                    KernelError::BuildFault {
                        node: node.id(),
                        source,
                    }
                })?;
                if hook.wrap {
                    element.push_element(container);
                } else {
                    element.children.extend(container.children);
                }
            }
        }

        Ok(element)
    }

    fn collect_updates(
        &self,
        node: &ComponentNode,
        ops: &mut Vec<UpdateOp>,
    ) -> Result<(), KernelError> {
        if node.is_dirty() {
            // A dirty node is replaced whole; its subtree is covered by
            // the replacement element.
            ops.push(UpdateOp::Update {
                id: node.id(),
                element: self.build_element(node, BuildPhase::Update)?,
            });
            return Ok(());
        }

        for &child in node.removed_children() {
            ops.push(UpdateOp::ChildRemoved {
                parent: node.id(),
                child,
            });
        }

        for child in node.children() {
            if child.is_fresh() {
                ops.push(UpdateOp::ChildAdded {
                    parent: node.id(),
                    element: self.build_element(child, BuildPhase::Create)?,
                });
            } else {
                self.collect_updates(child, ops)?;
            }
        }

        Ok(())
    }

    fn serialize_attr(&self, node: NodeId, value: &AttrValue) -> Result<String, KernelError> {
        match value {
            // Script-safe literals; no serializer involvement.
            AttrValue::Bool(b) => Ok(b.to_string()),
            AttrValue::Int(i) => Ok(i.to_string()),
            AttrValue::Float(f) => Ok(f.to_string()),
            other => self
                .serializer
                .serialize(other)
                .map_err(|source| KernelError::BuildFault { node, source }),
        }
    }
}
