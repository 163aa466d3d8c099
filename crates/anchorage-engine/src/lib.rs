pub mod anchoring;
pub mod annotations;
pub mod io;
pub mod text;
pub mod tree;

#[cfg(test)]
pub mod tests;

// Re-export key types for easier usage
pub use anchoring::*;
pub use annotations::*;
pub use io::*;
pub use tree::{BoundingBox, DocumentTree, ElementTree, NodeId};
