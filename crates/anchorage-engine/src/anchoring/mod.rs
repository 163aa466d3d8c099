/*!
 * # Anchoring
 *
 * Fingerprinting a location and finding it again after the document changes.
 *
 * ## Flow
 *
 * 1. [`create_fingerprint`] / [`create_selection_fingerprint`] describe a live
 *    node or text selection as an [`Anchor`]: a structural path, the tag and
 *    class, a text snapshot plus hash, neighbouring text and geometry.
 * 2. The anchor is stored by the caller (see [`crate::annotations`]).
 * 3. Later, a [`Reattacher`] resolves the anchor against the current tree by
 *    path, then by best-scoring candidate ([`score_candidate`]), then by text
 *    search. Each successful [`ResolutionResult`] reports the method used and a
 *    confidence score; an anchor that cannot be placed is orphaned.
 *
 * Nothing here mutates the tree or keeps state between calls.
 */

pub mod anchor;
pub mod fingerprint;
pub mod reattach;
pub mod scoring;
pub mod text_match;

pub use anchor::{Anchor, FingerprintLimits};
pub use fingerprint::{
    SelectionRange, TextPosition, create_fingerprint, create_selection_fingerprint, get_context,
};
pub use reattach::{
    MarkerAttributes, NoReservedWrappers, ReattachmentBatch, Reattacher, ReservedWrapper,
    ResolutionMethod, ResolutionResult,
};
pub use scoring::{
    ResolveOptions, ScoreBreakdown, ScoringWeights, TextTier, score_breakdown, score_candidate,
};
pub use text_match::{MatchStrategy, TextMatch, find_text_match};
