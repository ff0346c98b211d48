//! Render modes and the cache directives the transport attaches verbatim.

use serde::{Deserialize, Serialize};

/// How a response body is to be rendered by the output transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenderMode {
    /// First load: a full document.
    Init,
    /// Subsequent interaction: an update-operation list.
    Update,
    /// Raw markup tree, no transform applied.
    RawTree,
}

impl RenderMode {
    /// Content type of the final bytes for this mode.
    pub fn content_type(&self) -> &'static str {
        match self {
            RenderMode::Init => "text/html;charset=UTF-8",
            RenderMode::Update => "text/xml;charset=UTF-8",
            RenderMode::RawTree => "text/xml;charset=UTF-8",
        }
    }
}

/// Headers every page response carries so that no intermediary caches it.
///
/// The `Expires` value is a fixed date in the past; clients treat the
/// response as immediately stale. The transport must attach these verbatim.
pub const CACHE_DIRECTIVES: &[(&str, &str)] = &[
    ("Expires", "Sun, 19 Nov 1978 05:00:00 GMT"),
    ("Cache-Control", "no-store, no-cache, must-revalidate"),
    ("Cache-Control", "post-check=0, pre-check=0"),
    ("Pragma", "no-cache"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_per_mode() {
        assert_eq!(RenderMode::Init.content_type(), "text/html;charset=UTF-8");
        assert_eq!(RenderMode::Update.content_type(), "text/xml;charset=UTF-8");
        assert_eq!(RenderMode::RawTree.content_type(), "text/xml;charset=UTF-8");
    }
}
