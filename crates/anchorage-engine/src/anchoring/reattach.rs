//! Turning anchors back into live nodes.
//!
//! [`Reattacher::resolve`] tries three methods in order and stops at the first
//! that produces an acceptable node:
//!
//! 1. **path**: look the stored selector up directly and score the hit;
//! 2. **scoring**: score every element with the anchor's tag and keep the best;
//! 3. **text-search**: for selection anchors only, find the snapshot in a text
//!    leaf and take the leaf's parent at a fixed confidence.
//!
//! An anchor none of them can place is orphaned. Resolution never fails with an
//! error and never touches the tree.

use std::fmt;

use log::{debug, trace};
use serde::{Deserialize, Serialize};

use crate::tree::DocumentTree;

use super::scoring::{ScoreBreakdown, ScoringWeights, ResolveOptions, score_breakdown};
use super::text_match::{MatchStrategy, TextMatch, find_text_match, nearest_occurrence};
use super::Anchor;

/// Recognizes nodes that a renderer inserted to display earlier resolutions, so
/// they are never mistaken for document content.
pub trait ReservedWrapper<T: DocumentTree> {
    fn is_reserved_wrapper(&self, tree: &T, node: T::Node) -> bool;
}

impl<T, F> ReservedWrapper<T> for F
where
    T: DocumentTree,
    F: Fn(&T, T::Node) -> bool,
{
    fn is_reserved_wrapper(&self, tree: &T, node: T::Node) -> bool {
        self(tree, node)
    }
}

/// Treats every node as document content.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReservedWrappers;

impl<T: DocumentTree> ReservedWrapper<T> for NoReservedWrappers {
    fn is_reserved_wrapper(&self, _tree: &T, _node: T::Node) -> bool {
        false
    }
}

/// Attribute convention for renderer markers.
///
/// A node carrying `marker` is a single-purpose wrapper and is skipped, unless it
/// also carries `container`, in which case it hosts several markers around real
/// content and stays a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerAttributes {
    pub marker: String,
    pub container: String,
}

impl Default for MarkerAttributes {
    fn default() -> Self {
        Self {
            marker: "data-anchor-marker".to_string(),
            container: "data-anchor-container".to_string(),
        }
    }
}

impl<T: DocumentTree> ReservedWrapper<T> for MarkerAttributes {
    fn is_reserved_wrapper(&self, tree: &T, node: T::Node) -> bool {
        tree.attribute(node, &self.marker).is_some()
            && tree.attribute(node, &self.container).is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    Path,
    Scoring,
    TextSearch,
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolutionMethod::Path => "path",
            ResolutionMethod::Scoring => "scoring",
            ResolutionMethod::TextSearch => "text-search",
        };
        f.write_str(name)
    }
}

/// A successfully placed anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult<N> {
    pub node: N,
    /// Confidence in `[0, 1]`.
    pub score: f64,
    pub method: ResolutionMethod,
    /// Where a selection anchor's snapshot sits, in characters. For text-search
    /// results the offsets index the matched text leaf; otherwise they index the
    /// node's normalized text. Always `None` for whole-node anchors.
    pub text_match: Option<TextMatch>,
}

/// Outcome of resolving many anchors against one document state. Both lists
/// keep the input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReattachmentBatch<N> {
    pub attached: Vec<(Anchor, ResolutionResult<N>)>,
    pub orphaned: Vec<Anchor>,
}

impl<N> Default for ReattachmentBatch<N> {
    fn default() -> Self {
        Self {
            attached: Vec::new(),
            orphaned: Vec::new(),
        }
    }
}

/// Resolves anchors against a borrowed tree.
///
/// Holds no state between calls, so the same reattacher can be used for any
/// number of anchors as long as the tree is not mutated meanwhile.
pub struct Reattacher<'t, T: DocumentTree, W = NoReservedWrappers> {
    tree: &'t T,
    weights: ScoringWeights,
    options: ResolveOptions,
    reserved: W,
}

impl<'t, T: DocumentTree> Reattacher<'t, T> {
    pub fn new(tree: &'t T) -> Self {
        Self {
            tree,
            weights: ScoringWeights::default(),
            options: ResolveOptions::default(),
            reserved: NoReservedWrappers,
        }
    }
}

impl<'t, T, W> Reattacher<'t, T, W>
where
    T: DocumentTree,
    W: ReservedWrapper<T>,
{
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the reserved-wrapper predicate.
    pub fn with_reserved_wrappers<P: ReservedWrapper<T>>(self, reserved: P) -> Reattacher<'t, T, P> {
        Reattacher {
            tree: self.tree,
            weights: self.weights,
            options: self.options,
            reserved,
        }
    }

    pub fn tree(&self) -> &'t T {
        self.tree
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    /// Score of `candidate` under this reattacher's weights and options.
    pub fn score(&self, candidate: T::Node, anchor: &Anchor) -> f64 {
        self.breakdown(candidate, anchor)
            .map_or(0.0, |breakdown| breakdown.score(&self.weights))
    }

    /// Per-factor points of `candidate`, `None` when the tag differs.
    pub fn breakdown(&self, candidate: T::Node, anchor: &Anchor) -> Option<ScoreBreakdown> {
        score_breakdown(self.tree, candidate, anchor, &self.weights, &self.options)
    }

    /// Locate `anchor` in the tree, or `None` if it is orphaned.
    pub fn resolve(&self, anchor: &Anchor) -> Option<ResolutionResult<T::Node>> {
        let resolved = self
            .resolve_by_path(anchor)
            .or_else(|| self.resolve_by_scoring(anchor))
            .or_else(|| self.resolve_by_text_search(anchor));
        if resolved.is_none() {
            debug!("anchor {:?} is orphaned", anchor.selector);
        }
        resolved
    }

    /// Resolve every anchor against the same tree state.
    pub fn reattach_all<'a, I>(&self, anchors: I) -> ReattachmentBatch<T::Node>
    where
        I: IntoIterator<Item = &'a Anchor>,
    {
        let mut batch = ReattachmentBatch::default();
        for anchor in anchors {
            match self.resolve(anchor) {
                Some(result) => batch.attached.push((anchor.clone(), result)),
                None => batch.orphaned.push(anchor.clone()),
            }
        }
        debug!(
            "reattached {} anchors, {} orphaned",
            batch.attached.len(),
            batch.orphaned.len()
        );
        batch
    }

    fn resolve_by_path(&self, anchor: &Anchor) -> Option<ResolutionResult<T::Node>> {
        let node = match self.tree.query_selector(&anchor.selector) {
            Ok(Some(node)) => node,
            Ok(None) => {
                debug!("path {:?} matches nothing", anchor.selector);
                return None;
            }
            Err(err) => {
                debug!("path {:?} is not a valid selector: {err}", anchor.selector);
                return None;
            }
        };

        let score = self.score(node, anchor);
        if score < self.options.min_score {
            debug!(
                "path {:?} hit scored {score:.3}, below {}",
                anchor.selector, self.options.min_score
            );
            return None;
        }
        debug!("path {:?} accepted with score {score:.3}", anchor.selector);
        Some(self.placed(node, score, ResolutionMethod::Path, anchor))
    }

    fn resolve_by_scoring(&self, anchor: &Anchor) -> Option<ResolutionResult<T::Node>> {
        let mut best: Option<(T::Node, f64)> = None;
        for candidate in self.tree.nodes_by_tag(&anchor.tag_name) {
            if self.reserved.is_reserved_wrapper(self.tree, candidate) {
                trace!("skipping reserved wrapper {candidate:?}");
                continue;
            }
            let score = self.score(candidate, anchor);
            trace!("candidate {candidate:?} scored {score:.3}");
            // Strictly greater keeps the earliest of equal scores.
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((candidate, score));
            }
        }

        let (node, score) = best?;
        if score < self.options.min_score {
            debug!(
                "best <{}> candidate scored {score:.3}, below {}",
                anchor.tag_name, self.options.min_score
            );
            return None;
        }
        debug!("scoring accepted {node:?} with score {score:.3}");
        Some(self.placed(node, score, ResolutionMethod::Scoring, anchor))
    }

    fn resolve_by_text_search(&self, anchor: &Anchor) -> Option<ResolutionResult<T::Node>> {
        if !anchor.is_selection() {
            return None;
        }
        let root = self.tree.root();
        for leaf in self.tree.text_leaves() {
            let Some(text) = self.tree.text(leaf) else {
                continue;
            };
            let Some(found) = find_text_match(text, &anchor.text_snapshot) else {
                continue;
            };
            let Some(parent) = self.tree.parent(leaf) else {
                continue;
            };
            if parent == root || self.reserved.is_reserved_wrapper(self.tree, parent) {
                trace!("text found under {parent:?}, which cannot host it");
                continue;
            }
            debug!(
                "text search found {:?} under {parent:?} ({:?})",
                anchor.text_snapshot, found.strategy
            );
            return Some(ResolutionResult {
                node: parent,
                score: self.options.text_search_score,
                method: ResolutionMethod::TextSearch,
                text_match: Some(found),
            });
        }
        debug!("text search found no {:?}", anchor.text_snapshot);
        None
    }

    fn placed(
        &self,
        node: T::Node,
        score: f64,
        method: ResolutionMethod,
        anchor: &Anchor,
    ) -> ResolutionResult<T::Node> {
        let text_match = anchor
            .selection_start_offset
            .and_then(|offset| self.locate_selection(node, anchor, offset));
        ResolutionResult {
            node,
            score,
            method,
            text_match,
        }
    }

    /// The snapshot inside the node's normalized text, preferring the exact
    /// occurrence nearest the recorded offset.
    fn locate_selection(&self, node: T::Node, anchor: &Anchor, offset: usize) -> Option<TextMatch> {
        let text = self.tree.normalized_text(node);
        match nearest_occurrence(&text, &anchor.text_snapshot, offset) {
            Some(start) => Some(TextMatch {
                start,
                length: anchor.text_snapshot.chars().count(),
                strategy: MatchStrategy::Exact,
            }),
            None => find_text_match(&text, &anchor.text_snapshot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchoring::{FingerprintLimits, SelectionRange, create_fingerprint, create_selection_fingerprint};
    use crate::text::hash_text;
    use crate::tree::{BoundingBox, ElementTree, NodeId};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn stale_anchor(selector: &str, tag: &str, text: &str) -> Anchor {
        Anchor {
            selector: selector.to_string(),
            tag_name: tag.to_string(),
            class_name: String::new(),
            text_snapshot: text.to_string(),
            text_hash: hash_text(text),
            context_before: String::new(),
            context_after: String::new(),
            bounding_box: None,
            selection_start_offset: None,
            selection_length: None,
        }
    }

    /// `article > [p "Intro", p "Budget review", p "Outro"]`, laid out one line each.
    fn article() -> (ElementTree, Vec<NodeId>) {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let article = tree.append_element(root, "article");
        let paragraphs = ["Intro", "Budget review", "Outro"]
            .into_iter()
            .enumerate()
            .map(|(index, text)| {
                let p = tree.append_element(article, "p");
                tree.append_text(p, text);
                tree.set_bounding_box(p, BoundingBox::new(index as f64 * 20.0, 0.0, 600.0, 20.0));
                p
            })
            .collect();
        (tree, paragraphs)
    }

    #[test]
    fn test_fresh_fingerprint_resolves_by_path_with_full_score() {
        let (tree, paragraphs) = article();
        let anchor = create_fingerprint(&tree, paragraphs[1], &FingerprintLimits::default());

        let result = Reattacher::new(&tree).resolve(&anchor).unwrap();

        assert_eq!(result.node, paragraphs[1]);
        assert_eq!(result.method, ResolutionMethod::Path);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.text_match, None);
    }

    #[test]
    fn test_every_markdown_block_round_trips_by_path() {
        let source = "# Title\n\nFirst para.\n\n- one\n- two\n  - nested one\n  - nested two\n\n> quote\n\nLast para.\n";
        let tree = ElementTree::from_markdown(source);
        let reattacher = Reattacher::new(&tree);

        let elements: Vec<NodeId> = tree
            .descendants(tree.root())
            .filter(|&node| tree.is_element(node))
            .collect();
        assert!(elements.len() > 8);
        for node in elements {
            let anchor = create_fingerprint(&tree, node, &FingerprintLimits::default());
            let result = reattacher.resolve(&anchor).unwrap();
            assert_eq!(result.node, node, "selector {}", anchor.selector);
            assert_eq!(result.method, ResolutionMethod::Path);
        }
    }

    #[test]
    fn test_stale_path_falls_back_to_scoring() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let div = tree.append_element(root, "div");
        let first = tree.append_element(div, "p");
        tree.append_text(first, "Agenda items");
        let second = tree.append_element(div, "p");
        tree.append_text(second, "Budget review");

        let anchor = stale_anchor("article > p", "p", "Budget review");
        let result = Reattacher::new(&tree).resolve(&anchor).unwrap();

        assert_eq!(result.node, second);
        assert_eq!(result.method, ResolutionMethod::Scoring);
        assert!(result.score >= 0.3);
        assert_eq!(result.score, 0.7);
    }

    #[test]
    fn test_invalid_selector_is_a_miss_not_an_error() {
        let (tree, paragraphs) = article();
        let anchor = stale_anchor("p > > :hover", "p", "Outro");

        let result = Reattacher::new(&tree).resolve(&anchor).unwrap();

        assert_eq!(result.node, paragraphs[2]);
        assert_eq!(result.method, ResolutionMethod::Scoring);
    }

    #[test]
    fn test_moved_selection_is_found_by_text_search() {
        let mut before = ElementTree::new();
        let root = before.root();
        let div = before.append_element(root, "div");
        let heading = before.append_element(div, "h2");
        before.append_text(heading, "Minutes");
        let p = before.append_element(div, "p");
        let leaf = before.append_text(p, "He said \u{201C}hello\u{201D} to everyone");
        let anchor = create_selection_fingerprint(
            &before,
            &SelectionRange::within(leaf, 3, 15),
            &FingerprintLimits::default(),
        )
        .unwrap();
        assert_eq!(anchor.text_snapshot, "said \u{201C}hello\u{201D}");

        let mut after = ElementTree::new();
        let root = after.root();
        let div = after.append_element(root, "div");
        let heading = after.append_element(div, "h2");
        after.append_text(heading, "Minutes");
        let quote = after.append_element(div, "blockquote");
        after.append_text(quote, "Earlier, he said \"hello\" to everyone");

        let result = Reattacher::new(&after).resolve(&anchor).unwrap();

        assert_eq!(result.node, quote);
        assert_eq!(result.method, ResolutionMethod::TextSearch);
        assert_eq!(result.score, 0.6);
        assert_eq!(
            result.text_match,
            Some(TextMatch {
                start: 12,
                length: 12,
                strategy: MatchStrategy::Normalized,
            })
        );
    }

    #[test]
    fn test_whole_node_anchors_never_use_text_search() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let quote = tree.append_element(root, "blockquote");
        tree.append_text(quote, "Budget review");

        let anchor = stale_anchor("p", "p", "Budget review");
        assert_eq!(Reattacher::new(&tree).resolve(&anchor), None);
    }

    #[test]
    fn test_selection_resolved_by_path_reports_its_range() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let p = tree.append_element(root, "p");
        let leaf = tree.append_text(p, "todo then todo again");
        let anchor = create_selection_fingerprint(
            &tree,
            &SelectionRange::within(leaf, 10, 14),
            &FingerprintLimits::default(),
        )
        .unwrap();

        let result = Reattacher::new(&tree).resolve(&anchor).unwrap();

        assert_eq!(result.method, ResolutionMethod::Path);
        assert_eq!(
            result.text_match,
            Some(TextMatch {
                start: 10,
                length: 4,
                strategy: MatchStrategy::Exact,
            })
        );
    }

    /// `p > [span[marker] "review", span "review"]`
    fn marked_document(container: bool) -> (ElementTree, NodeId, NodeId) {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let p = tree.append_element(root, "p");
        let marker = tree.append_element(p, "span");
        tree.set_attribute(marker, "data-anchor-marker", "");
        if container {
            tree.set_attribute(marker, "data-anchor-container", "");
        }
        tree.append_text(marker, "review");
        let plain = tree.append_element(p, "span");
        tree.append_text(plain, "review");
        (tree, marker, plain)
    }

    #[rstest]
    #[case(false, false)]
    #[case(true, true)]
    fn test_marker_wrappers_are_skipped_unless_containers(
        #[case] container: bool,
        #[case] expect_marker: bool,
    ) {
        let (tree, marker, plain) = marked_document(container);
        let anchor = stale_anchor("div > span", "span", "review");

        let result = Reattacher::new(&tree)
            .with_reserved_wrappers(MarkerAttributes::default())
            .resolve(&anchor)
            .unwrap();

        let expected = if expect_marker { marker } else { plain };
        assert_eq!(result.node, expected);
        assert_eq!(result.method, ResolutionMethod::Scoring);
    }

    #[test]
    fn test_without_predicate_markers_are_ordinary_candidates() {
        let (tree, marker, _) = marked_document(false);
        let anchor = stale_anchor("div > span", "span", "review");

        let result = Reattacher::new(&tree).resolve(&anchor).unwrap();
        assert_eq!(result.node, marker);
    }

    #[test]
    fn test_closure_predicate_also_guards_text_search() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let p = tree.append_element(root, "p");
        let mark = tree.append_element(p, "mark");
        tree.append_text(mark, "shared phrase");
        let li = tree.append_element(root, "li");
        tree.append_text(li, "a shared phrase here");

        let mut anchor = stale_anchor("section > em", "em", "shared phrase");
        anchor.selection_start_offset = Some(0);
        anchor.selection_length = Some(13);

        let result = Reattacher::new(&tree)
            .with_reserved_wrappers(|tree: &ElementTree, node: NodeId| tree.tag_name(node) == "mark")
            .resolve(&anchor)
            .unwrap();

        assert_eq!(result.node, li);
        assert_eq!(result.method, ResolutionMethod::TextSearch);
        assert_eq!(result.text_match.map(|found| found.start), Some(2));
    }

    #[test]
    fn test_equal_scores_prefer_document_order() {
        let mut tree = ElementTree::new();
        let root = tree.root();
        let section = tree.append_element(root, "section");
        let first = tree.append_element(section, "p");
        tree.append_text(first, "Same text");
        let second = tree.append_element(section, "p");
        tree.append_text(second, "Same text");

        let anchor = stale_anchor("main > p", "p", "Same text");
        let result = Reattacher::new(&tree).resolve(&anchor).unwrap();

        assert_eq!(result.node, first);
        assert_eq!(Reattacher::new(&tree).score(second, &anchor), result.score);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let (tree, paragraphs) = article();
        // Tag and class only: 3 of 10 points.
        let anchor = stale_anchor("article > p:nth-of-type(3)", "p", "Completely different");

        let accepted = Reattacher::new(&tree).resolve(&anchor).unwrap();
        assert_eq!(accepted.node, paragraphs[2]);
        assert_eq!(accepted.method, ResolutionMethod::Path);
        assert_eq!(accepted.score, 0.3);

        let strict = Reattacher::new(&tree).with_options(ResolveOptions {
            min_score: 0.31,
            ..ResolveOptions::default()
        });
        assert_eq!(strict.resolve(&anchor), None);
    }

    #[test]
    fn test_reattach_all_partitions_in_order_and_is_idempotent() {
        let (tree, paragraphs) = article();
        let anchors = vec![
            create_fingerprint(&tree, paragraphs[2], &FingerprintLimits::default()),
            stale_anchor("ul > li", "li", "Gone"),
            create_fingerprint(&tree, paragraphs[0], &FingerprintLimits::default()),
            stale_anchor("table", "table", ""),
        ];
        let reattacher = Reattacher::new(&tree);

        let first = reattacher.reattach_all(&anchors);
        let second = reattacher.reattach_all(&anchors);

        let attached: Vec<NodeId> = first.attached.iter().map(|(_, result)| result.node).collect();
        assert_eq!(attached, vec![paragraphs[2], paragraphs[0]]);
        let orphaned: Vec<&str> = first.orphaned.iter().map(|anchor| anchor.tag_name.as_str()).collect();
        assert_eq!(orphaned, vec!["li", "table"]);
        assert_eq!(first, second);
        assert_eq!(format!("{first:?}"), format!("{second:?}"));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(ResolutionMethod::TextSearch.to_string(), "text-search");
        assert_eq!(
            serde_json::to_string(&ResolutionMethod::TextSearch).unwrap(),
            "\"text-search\""
        );
    }
}
