//! Annotations stored against anchors, and the caller-owned record of which of
//! them were placed by the previous reattachment pass.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::anchoring::{Anchor, Reattacher, ReservedWrapper, ResolutionResult};
use crate::tree::DocumentTree;

/// A user payload attached to a document location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: Uuid,
    pub anchor: Anchor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

impl Annotation {
    pub fn new(anchor: Anchor) -> Self {
        Self {
            id: Uuid::new_v4(),
            anchor,
            note: None,
            color: None,
            checked: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Every annotation paired with its resolution, in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationBatch<'a, N> {
    pub outcomes: Vec<(&'a Annotation, Option<ResolutionResult<N>>)>,
}

impl<'a, N> AnnotationBatch<'a, N> {
    pub fn attached(&self) -> impl Iterator<Item = (&'a Annotation, &ResolutionResult<N>)> {
        self.outcomes
            .iter()
            .filter_map(|(annotation, result)| result.as_ref().map(|result| (*annotation, result)))
    }

    pub fn orphaned(&self) -> impl Iterator<Item = &'a Annotation> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, result)| result.is_none())
            .map(|(annotation, _)| *annotation)
    }

    pub fn result_for(&self, id: Uuid) -> Option<&ResolutionResult<N>> {
        self.outcomes
            .iter()
            .find(|(annotation, _)| annotation.id == id)
            .and_then(|(_, result)| result.as_ref())
    }
}

/// Resolve the anchor of every annotation against one tree state.
pub fn reattach_annotations<'a, T, W>(
    reattacher: &Reattacher<'_, T, W>,
    annotations: &'a [Annotation],
) -> AnnotationBatch<'a, T::Node>
where
    T: DocumentTree,
    W: ReservedWrapper<T>,
{
    AnnotationBatch {
        outcomes: annotations
            .iter()
            .map(|annotation| (annotation, reattacher.resolve(&annotation.anchor)))
            .collect(),
    }
}

/// Changes in attachment status since the previous reconcile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerDelta {
    pub newly_attached: Vec<Uuid>,
    pub newly_orphaned: Vec<Uuid>,
}

impl LedgerDelta {
    pub fn is_empty(&self) -> bool {
        self.newly_attached.is_empty() && self.newly_orphaned.is_empty()
    }
}

/// Ids of the annotations placed by the last reattachment pass.
///
/// The engine never holds one of these; whoever drives reattachment keeps it
/// between passes to learn what changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachmentLedger {
    attached: BTreeSet<Uuid>,
}

impl AttachmentLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_attached(&self, id: Uuid) -> bool {
        self.attached.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.attached.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
    }

    /// Record the outcome of a pass and report what changed.
    ///
    /// Annotations absent from `batch` keep their previous status.
    pub fn reconcile<N>(&mut self, batch: &AnnotationBatch<'_, N>) -> LedgerDelta {
        let mut delta = LedgerDelta::default();
        for (annotation, result) in &batch.outcomes {
            let id = annotation.id;
            match result {
                Some(_) if self.attached.insert(id) => delta.newly_attached.push(id),
                None if self.attached.remove(&id) => delta.newly_orphaned.push(id),
                _ => {}
            }
        }
        delta
    }

    /// Drop an annotation that no longer exists.
    pub fn forget(&mut self, id: Uuid) {
        self.attached.remove(&id);
    }
}
