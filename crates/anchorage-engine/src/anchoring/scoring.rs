//! Similarity between an anchor and a live candidate node.
//!
//! The score is a weighted sum of independent factors divided by a fixed maximum:
//!
//! | factor   | default points | evaluated when                       |
//! |----------|----------------|--------------------------------------|
//! | tag      | 1 (gate)       | always; a mismatch scores 0 outright |
//! | text     | 4 / 3 / 2 / 3  | always                               |
//! | class    | 2 / 1          | always                               |
//! | context  | 1 + 1          | the anchor has any context           |
//! | position | 1 / 0.5        | the anchor has a bounding box        |
//!
//! Factors that are not evaluated contribute nothing, but the denominator stays
//! at `max_points`.

use serde::{Deserialize, Serialize};

use crate::text::{hash_text, truncate_chars};
use crate::tree::DocumentTree;

use super::Anchor;

/// Points awarded by each factor tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub tag: f64,
    pub text_exact: f64,
    pub text_contains: f64,
    pub text_prefix: f64,
    pub text_hash: f64,
    pub class_exact: f64,
    pub class_token: f64,
    /// Awarded separately for the before and the after context.
    pub context_each: f64,
    pub position_near: f64,
    pub position_far: f64,
    /// Denominator of the final score.
    pub max_points: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            tag: 1.0,
            text_exact: 4.0,
            text_contains: 3.0,
            text_prefix: 2.0,
            text_hash: 3.0,
            class_exact: 2.0,
            class_token: 1.0,
            context_each: 1.0,
            position_near: 1.0,
            position_far: 0.5,
            max_points: 10.0,
        }
    }
}

/// Thresholds used while scoring and accepting candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveOptions {
    /// Lowest score the path and scoring methods accept.
    pub min_score: f64,
    /// Fixed confidence reported by the text-search method.
    pub text_search_score: f64,
    /// Vertical distance (document units) below which position is "near".
    pub near_distance: f64,
    /// Vertical distance below which position is still "far but related".
    pub far_distance: f64,
    /// Length of the snapshot prefix tried when the full snapshot is absent.
    pub prefix_chars: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            min_score: 0.3,
            text_search_score: 0.6,
            near_distance: 50.0,
            far_distance: 200.0,
            prefix_chars: 50,
        }
    }
}

/// How well the candidate's text matches the snapshot, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextTier {
    Exact,
    ContainsFull,
    ContainsPrefix,
    HashOnly,
    None,
}

/// Points per factor for one candidate, for explaining a score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub tag: f64,
    pub text_tier: TextTier,
    pub text: f64,
    pub class: f64,
    /// `None` when the anchor carries no context.
    pub context: Option<f64>,
    /// `None` when the anchor carries no bounding box.
    pub position: Option<f64>,
}

impl ScoreBreakdown {
    pub fn points(&self) -> f64 {
        self.tag + self.text + self.class + self.context.unwrap_or(0.0) + self.position.unwrap_or(0.0)
    }

    pub fn score(&self, weights: &ScoringWeights) -> f64 {
        if weights.max_points <= 0.0 {
            return 0.0;
        }
        (self.points() / weights.max_points).clamp(0.0, 1.0)
    }
}

/// Per-factor points, or `None` when the tag gate rejects the candidate.
pub fn score_breakdown<T: DocumentTree>(
    tree: &T,
    candidate: T::Node,
    anchor: &Anchor,
    weights: &ScoringWeights,
    options: &ResolveOptions,
) -> Option<ScoreBreakdown> {
    if tree.tag_name(candidate) != anchor.tag_name {
        return None;
    }

    let text = tree.normalized_text(candidate);
    let text_tier = text_tier(&text, anchor, options.prefix_chars);
    let text_points = match text_tier {
        TextTier::Exact => weights.text_exact,
        TextTier::ContainsFull => weights.text_contains,
        TextTier::ContainsPrefix => weights.text_prefix,
        TextTier::HashOnly => weights.text_hash,
        TextTier::None => 0.0,
    };

    let class_name = tree.class_name(candidate);
    let class = if class_name == anchor.class_name {
        weights.class_exact
    } else if let Some(first_token) = anchor.class_name.split_whitespace().next()
        && class_name.contains(first_token)
    {
        weights.class_token
    } else {
        0.0
    };

    let context = anchor.has_context().then(|| {
        let parent_text = tree
            .parent(candidate)
            .map(|parent| tree.normalized_text(parent))
            .unwrap_or_default();
        [&anchor.context_before, &anchor.context_after]
            .into_iter()
            .filter(|context| !context.is_empty() && parent_text.contains(context.as_str()))
            .count() as f64
            * weights.context_each
    });

    let position = anchor.bounding_box.map(|recorded| {
        match tree.absolute_bounding_box(candidate) {
            Some(current) => {
                let distance = (current.top - recorded.top).abs();
                if distance < options.near_distance {
                    weights.position_near
                } else if distance < options.far_distance {
                    weights.position_far
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    });

    Some(ScoreBreakdown {
        tag: weights.tag,
        text_tier,
        text: text_points,
        class,
        context,
        position,
    })
}

fn text_tier(text: &str, anchor: &Anchor, prefix_chars: usize) -> TextTier {
    let snapshot = anchor.text_snapshot.as_str();
    if text == snapshot {
        TextTier::Exact
    } else if text.contains(snapshot) {
        TextTier::ContainsFull
    } else if !snapshot.is_empty() && text.contains(truncate_chars(snapshot, prefix_chars).as_str()) {
        TextTier::ContainsPrefix
    } else if hash_text(text) == anchor.text_hash {
        TextTier::HashOnly
    } else {
        TextTier::None
    }
}

/// Similarity of `candidate` to `anchor` in `[0, 1]`; 0 whenever tags differ.
pub fn score_candidate<T: DocumentTree>(
    tree: &T,
    candidate: T::Node,
    anchor: &Anchor,
    weights: &ScoringWeights,
    options: &ResolveOptions,
) -> f64 {
    score_breakdown(tree, candidate, anchor, weights, options)
        .map_or(0.0, |breakdown| breakdown.score(weights))
}
