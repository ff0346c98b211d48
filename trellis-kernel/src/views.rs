//! View declarations and initializer-chain resolution.
//!
//! The discovery collaborator registers the component types eligible as
//! entry points, each with a URL pattern and an optional parent view. A
//! pattern is a path glob by default (`*` matches within and across
//! segments) or, with the `regex:` prefix, a full regular expression.

use crate::component::{Component, ComponentType};
use regex::Regex;

/// Prefix selecting regex matching for a view URL pattern.
const REGEX_PREFIX: &str = "regex:";

/// Constructor for a view component instance.
pub type ViewCtor = fn() -> Box<dyn Component>;

/// One registered view: a component type reachable at a URL.
pub struct ViewDecl {
    pub ty: &'static ComponentType,
    pub pattern: String,
    pub is_regex: bool,
    /// Parent view, initialized before this one. The parent may decline
    /// to initialize this view at page-build time.
    pub parent: Option<&'static ComponentType>,
    pub construct: ViewCtor,
}

struct RegisteredView {
    decl: ViewDecl,
    matcher: Regex,
}

/// Registry of view declarations, queried per request path.
#[derive(Default)]
pub struct ViewRegistry {
    views: Vec<RegisteredView>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a view. Fails if its pattern does not compile.
    pub fn register(&mut self, decl: ViewDecl) -> anyhow::Result<()> {
        let matcher = compile_pattern(&decl.pattern, decl.is_regex)?;
        self.views.push(RegisteredView { decl, matcher });
        Ok(())
    }

    /// Parse a raw pattern string, honoring the `regex:` prefix
    /// convention, and register the view.
    pub fn register_pattern(
        &mut self,
        pattern: &str,
        ty: &'static ComponentType,
        parent: Option<&'static ComponentType>,
        construct: ViewCtor,
    ) -> anyhow::Result<()> {
        let (pattern, is_regex) = match pattern.strip_prefix(REGEX_PREFIX) {
            Some(rest) => (rest.to_string(), true),
            None => (pattern.to_string(), false),
        };
        self.register(ViewDecl {
            ty,
            pattern,
            is_regex,
            parent,
            construct,
        })
    }

    /// Resolve the initializer chain for a request path, root view first.
    ///
    /// `None` when no pattern matches, or when the parent declarations
    /// are misconfigured: a parent with no registration of its own, or a
    /// cycle among parents. Both are logged.
    pub fn find_chain(&self, path: &str) -> Option<Vec<&ViewDecl>> {
        let leaf = self
            .views
            .iter()
            .find(|view| view.matcher.is_match(path))?;

        let mut chain = vec![&leaf.decl];
        let mut parent = leaf.decl.parent;
        while let Some(ty) = parent {
            if chain.iter().any(|d| std::ptr::eq(d.ty, ty)) {
                tracing::warn!(view = leaf.decl.ty.name, parent = ty.name, "parent views form a cycle");
                return None;
            }
            let Some(view) = self.views.iter().find(|v| std::ptr::eq(v.decl.ty, ty)) else {
                tracing::warn!(view = leaf.decl.ty.name, parent = ty.name, "parent view is not registered");
                return None;
            };
            chain.push(&view.decl);
            parent = view.decl.parent;
        }
        chain.reverse();
        Some(chain)
    }
}

/// Turn a pattern into an anchored matcher. Globs escape everything
/// except `*`, which becomes `.*`.
fn compile_pattern(pattern: &str, is_regex: bool) -> anyhow::Result<Regex> {
    let source = if is_regex {
        format!("^(?:{})$", pattern)
    } else {
        let mut body = String::new();
        for (i, part) in pattern.split('*').enumerate() {
            if i > 0 {
                body.push_str(".*");
            }
            body.push_str(&regex::escape(part));
        }
        format!("^{}$", body)
    };
    Ok(Regex::new(&source)?)
}
