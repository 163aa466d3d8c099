use serde::{Deserialize, Serialize};

use crate::tree::BoundingBox;

/// Durable description of a location in a document.
///
/// Field names serialize in camelCase (`tagName`, `textSnapshot`, ...) so anchors
/// persisted by other producers load unchanged. Every field other than
/// `selector` and `tagName` defaults when absent; a missing optional factor
/// (context, geometry) is simply not scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    /// Structural path to the node at creation time.
    pub selector: String,
    pub tag_name: String,
    /// Raw class attribute at creation time.
    #[serde(default)]
    pub class_name: String,
    /// Normalized text, capped for whole-node anchors.
    #[serde(default)]
    pub text_snapshot: String,
    /// Hash of the full (uncapped) normalized text.
    #[serde(default)]
    pub text_hash: String,
    #[serde(default)]
    pub context_before: String,
    #[serde(default)]
    pub context_after: String,
    /// Document-space geometry; only whole-node anchors record one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    /// Character offset of the snapshot inside the enclosing node's normalized
    /// text. Present only for sub-string anchors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_start_offset: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_length: Option<usize>,
}

impl Anchor {
    /// Whether this anchor describes a sub-string selection rather than a node.
    pub fn is_selection(&self) -> bool {
        self.selection_start_offset.is_some()
    }

    pub fn has_context(&self) -> bool {
        !self.context_before.is_empty() || !self.context_after.is_empty()
    }
}

/// Size caps applied when fingerprinting, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintLimits {
    pub snapshot_chars: usize,
    pub context_chars: usize,
}

impl Default for FingerprintLimits {
    fn default() -> Self {
        Self {
            snapshot_chars: 200,
            context_chars: 50,
        }
    }
}
