//! Remote method dispatch.
//!
//! Resolution walks a component type's ancestor chain, most-derived first,
//! and stops at the first declaration whose name matches. If that
//! declaration is remote-marked it is the resolution; if not, it shadows
//! any same-named remote method further up the chain and resolution fails.
//! The shadowing behavior is a deliberate encapsulation policy: a subtype
//! that redeclares a method without the remote marker withdraws it from
//! the client. Results, including misses, are memoized per
//! `(type, method)` for the process lifetime; component types are fixed at
//! startup.

use crate::component::{ComponentNode, ComponentType, MethodDecl};
use crate::error::DispatchFault;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use trellis_api::NodeId;

/// Memo key: the type's static identity (its address), not its display
/// name, so two registered types sharing a name never alias entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RemoteMethodKey {
    type_addr: usize,
    method: String,
}

impl RemoteMethodKey {
    fn new(ty: &'static ComponentType, method: &str) -> Self {
        RemoteMethodKey {
            type_addr: ty as *const ComponentType as usize,
            method: method.to_string(),
        }
    }
}

/// Process-wide dispatch table with memoized resolution.
#[derive(Default)]
pub struct DispatchTable {
    cache: DashMap<RemoteMethodKey, Option<&'static MethodDecl>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `method` against `ty`'s ancestor chain.
    ///
    /// Total: always terminates with either exactly one remote-callable
    /// method or `None`.
    pub fn resolve(
        &self,
        ty: &'static ComponentType,
        method: &str,
    ) -> Option<&'static MethodDecl> {
        let key = RemoteMethodKey::new(ty, method);
        if let Some(cached) = self.cache.get(&key) {
            return *cached;
        }

        let mut resolved = None;
        'chain: for declared in ty.chain() {
            for decl in declared.methods {
                if decl.name == method {
                    // First name match decides; a non-remote declaration
                    // shadows everything above it.
                    if decl.remote {
                        resolved = Some(decl);
                    }
                    break 'chain;
                }
            }
        }

        self.cache.insert(key, resolved);
        resolved
    }

    /// Resolve and invoke `method` on the node `target` inside `root`'s
    /// subtree, with positionally decoded arguments.
    pub fn dispatch(
        &self,
        root: &mut ComponentNode,
        target: NodeId,
        method: &str,
        args: &[Value],
    ) -> Result<(), DispatchFault> {
        let node = root
            .find_mut(target)
            .ok_or(DispatchFault::MissingComponent(target))?;

        let ty = node.type_info();
        let decl = self
            .resolve(ty, method)
            .ok_or_else(|| DispatchFault::UnknownMethod {
                component: ty.name.to_string(),
                method: method.to_string(),
            })?;

        if args.len() != decl.arity {
            return Err(DispatchFault::ArityMismatch {
                method: method.to_string(),
                expected: decl.arity,
                got: args.len(),
            });
        }

        (decl.invoke)(node, args)
    }
}

/// Decode one positional argument for a remote method body.
pub fn arg<T: DeserializeOwned>(
    method: &str,
    args: &[Value],
    index: usize,
) -> Result<T, DispatchFault> {
    // Arity was checked before invocation; a hole here is a decl bug.
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|source| DispatchFault::BadArgument {
        method: method.to_string(),
        index,
        source,
    })
}
