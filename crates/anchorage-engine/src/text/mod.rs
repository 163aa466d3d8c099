//! Text canonicalisation used by both fingerprinting and matching.

pub mod hash;
pub mod normalize;

pub use hash::hash_text;
pub use normalize::{fold_case, last_chars, normalize_quotes, normalize_text, truncate_chars};
