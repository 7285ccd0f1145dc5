//! Edit scripts: ordered mutation instructions for one component's display subtree.
//!
//! Invariants:
//! - Edits are replayed in order against the component's current display children.
//! - `sibling_index` is relative to the current step level; `StepIn` descends into
//!   the child at that index and `StepOut` returns to the parent level.
//! - `reference_frame_index` is an offset into the batch's reference frame buffer.
//!   A prepended element or component refers to the head of a contiguous subtree copy.
//! - A permutation list is a run of `PermutationListEntry` terminated by
//!   `PermutationListEnd`. Entries are applied simultaneously after the edits that
//!   precede them at the same level: the child at `from` moves to `to`.

use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderTreeEdit {
    /// Insert the referenced frame (and its subtree) before the child at `sibling_index`.
    PrependFrame {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    RemoveFrame {
        sibling_index: usize,
    },
    /// Set (add or overwrite) the attribute held by the referenced frame.
    SetAttribute {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    RemoveAttribute {
        sibling_index: usize,
        name: Arc<str>,
    },
    UpdateText {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    UpdateMarkup {
        sibling_index: usize,
        reference_frame_index: usize,
    },
    StepIn {
        sibling_index: usize,
    },
    StepOut,
    PermutationListEntry {
        from: usize,
        to: usize,
    },
    PermutationListEnd,
}

impl RenderTreeEdit {
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            RenderTreeEdit::PrependFrame { .. } | RenderTreeEdit::RemoveFrame { .. }
        )
    }
}

impl fmt::Display for RenderTreeEdit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderTreeEdit::PrependFrame {
                sibling_index,
                reference_frame_index,
            } => write!(f, "prepend @{sibling_index} <- #{reference_frame_index}"),
            RenderTreeEdit::RemoveFrame { sibling_index } => write!(f, "remove @{sibling_index}"),
            RenderTreeEdit::SetAttribute {
                sibling_index,
                reference_frame_index,
            } => write!(f, "set-attr @{sibling_index} <- #{reference_frame_index}"),
            RenderTreeEdit::RemoveAttribute {
                sibling_index,
                name,
            } => write!(f, "remove-attr @{sibling_index} {name}"),
            RenderTreeEdit::UpdateText {
                sibling_index,
                reference_frame_index,
            } => write!(f, "text @{sibling_index} <- #{reference_frame_index}"),
            RenderTreeEdit::UpdateMarkup {
                sibling_index,
                reference_frame_index,
            } => write!(f, "markup @{sibling_index} <- #{reference_frame_index}"),
            RenderTreeEdit::StepIn { sibling_index } => write!(f, "step-in @{sibling_index}"),
            RenderTreeEdit::StepOut => f.write_str("step-out"),
            RenderTreeEdit::PermutationListEntry { from, to } => {
                write!(f, "permute {from} -> {to}")
            }
            RenderTreeEdit::PermutationListEnd => f.write_str("permute-end"),
        }
    }
}
