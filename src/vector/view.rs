//! View descriptor sum type for [`super::Vector`].
//!
//! A [`ViewNode`] translates a logical index into an index one level down
//! (either into a parent view, or directly into storage when `parent` is
//! `None`). Views compose by wrapping: each [`super::Vector::wrap`] call
//! builds a new node whose parent is the previous view, so a chain of
//! strided/cyclic/reversed/... re-indexings never touches the backing
//! storage until an operator materializes a plain result.

use std::sync::Arc;

/// The view descriptor sum type. See the module documentation for how
/// nodes compose.
#[derive(Clone, Debug)]
pub enum ViewKind {
    /// Contiguous, identity mapping.
    Plain,
    /// Elements `start, start+step, ..., < end`.
    SimpleSubset {
        /// First logical index mapped, in the parent's index space.
        start: usize,
        /// Stride between consecutive elements.
        step: usize,
        /// Exclusive upper bound, in the parent's index space.
        end: usize,
    },
    /// `included` elements kept, `excluded` elements skipped, repeating
    /// over the parent's full length. `reversed` reads chunks starting
    /// from the end of the parent instead of the start.
    Alternating {
        /// Elements kept per period.
        included: usize,
        /// Elements skipped per period.
        excluded: usize,
        /// Read chunks from the end backwards.
        reversed: bool,
    },
    /// Each parent element repeated `k` times consecutively.
    Repeated {
        /// Repeat count.
        k: usize,
    },
    /// The whole parent sequence cycled `k` times.
    Cyclic {
        /// Cycle count.
        k: usize,
    },
    /// The parent sequence in reverse order.
    Reversed,
}

#[derive(Debug)]
pub(super) struct ViewNode {
    kind: ViewKind,
    inner_len: usize,
    parent: Option<Arc<ViewNode>>,
    parent_offset: usize,
}

impl ViewNode {
    pub(super) fn plain(len: usize) -> Self {
        ViewNode {
            kind: ViewKind::Plain,
            inner_len: len,
            parent: None,
            parent_offset: 0,
        }
    }

    pub(super) fn wrap(
        kind: ViewKind,
        parent: Arc<ViewNode>,
        parent_batch_start: usize,
        parent_batch_end: usize,
    ) -> Self {
        ViewNode {
            kind,
            inner_len: parent_batch_end - parent_batch_start,
            parent: Some(parent),
            parent_offset: parent_batch_start,
        }
    }

    pub(super) fn is_plain(&self) -> bool {
        self.parent.is_none() && matches!(self.kind, ViewKind::Plain)
    }

    fn period_layout(&self, included: usize, excluded: usize) -> (usize, usize, usize) {
        let period = included + excluded;
        let full_periods = self.inner_len / period;
        let remainder = (self.inner_len % period).min(included);
        (period, full_periods, remainder)
    }

    pub(super) fn size(&self) -> usize {
        match &self.kind {
            ViewKind::Plain => self.inner_len,
            ViewKind::SimpleSubset { start, step, end } => {
                let end = (*end).min(self.inner_len);
                if end <= *start || *step == 0 {
                    0
                } else {
                    (end - start + step - 1) / step
                }
            }
            ViewKind::Alternating {
                included, excluded, ..
            } => {
                let (_, full_periods, remainder) = self.period_layout(*included, *excluded);
                full_periods * included + remainder
            }
            ViewKind::Repeated { k } => self.inner_len * k,
            ViewKind::Cyclic { k } => self.inner_len * k,
            ViewKind::Reversed => self.inner_len,
        }
    }

    /// Map a logical index (within this view's own index space) down into
    /// the parent's index space (or directly into storage, if this is the
    /// base plain level).
    fn map_down(&self, logical_idx: usize) -> usize {
        match &self.kind {
            ViewKind::Plain => logical_idx,
            ViewKind::SimpleSubset { start, step, .. } => start + logical_idx * step,
            ViewKind::Alternating {
                included,
                excluded,
                reversed,
            } => {
                let block = logical_idx / included;
                let offset = logical_idx % included;
                let pos = block * (included + excluded) + offset;
                if *reversed {
                    self.inner_len - 1 - pos
                } else {
                    pos
                }
            }
            ViewKind::Repeated { k } => logical_idx / k,
            ViewKind::Cyclic { .. } => logical_idx % self.inner_len,
            ViewKind::Reversed => self.inner_len - 1 - logical_idx,
        }
    }

    pub(super) fn to_storage_index(&self, logical_idx: usize) -> usize {
        let mapped = self.map_down(logical_idx) + self.parent_offset;
        match &self.parent {
            Some(p) => p.to_storage_index(mapped),
            None => mapped,
        }
    }
}
