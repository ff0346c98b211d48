//! Trellis API - Shared types for the Trellis page engine.
//!
//! These are the types that cross the boundary between the kernel and its
//! collaborators: the page handle carried by every request, the markup tree
//! handed to the output transform, and the render mode / cache directives
//! the transport attaches to responses.

mod handle;
mod markup;
mod render;

pub use handle::*;
pub use markup::*;
pub use render::*;
