//! Per-turn batch assembly.
//!
//! One `RenderBatchBuilder` lives as long as the renderer and is cleared after
//! every delivered batch, so a turn does not allocate once buffers have grown.

use crate::edit::RenderTreeEdit;
use crate::frame::Frame;
use core_types::{ComponentId, EventHandlerId};
use std::collections::VecDeque;
use std::ops::Range;

/// The edit script of one component, as a window into the batch edit buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderTreeDiff {
    pub component_id: ComponentId,
    pub edits: Range<usize>,
}

#[derive(Debug, Default)]
pub struct RenderBatchBuilder {
    pub(crate) edits: Vec<RenderTreeEdit>,
    pub(crate) reference_frames: Vec<Frame>,
    pub(crate) disposed_event_handlers: Vec<EventHandlerId>,
    updated: Vec<RenderTreeDiff>,
    disposed_components: Vec<ComponentId>,
    render_queue: VecDeque<ComponentId>,
    disposal_queue: VecDeque<ComponentId>,
}

impl RenderBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_diff(&mut self, diff: RenderTreeDiff) {
        self.updated.push(diff);
    }

    pub fn enqueue_render(&mut self, component_id: ComponentId) {
        self.render_queue.push_back(component_id);
    }

    pub fn next_render(&mut self) -> Option<ComponentId> {
        self.render_queue.pop_front()
    }

    pub fn has_pending_renders(&self) -> bool {
        !self.render_queue.is_empty()
    }

    pub fn enqueue_disposal(&mut self, component_id: ComponentId) {
        self.disposal_queue.push_back(component_id);
    }

    pub fn next_disposal(&mut self) -> Option<ComponentId> {
        self.disposal_queue.pop_front()
    }

    pub fn record_disposed_component(&mut self, component_id: ComponentId) {
        self.disposed_components.push(component_id);
    }

    pub fn record_disposed_event_handler(&mut self, handler_id: EventHandlerId) {
        self.disposed_event_handlers.push(handler_id);
    }

    /// Drops any queued render for `component_id`.
    pub fn discard_render(&mut self, component_id: ComponentId) {
        self.render_queue.retain(|queued| *queued != component_id);
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.disposed_components.is_empty()
            && self.disposed_event_handlers.is_empty()
    }

    pub fn disposed_event_handler_ids(&self) -> &[EventHandlerId] {
        &self.disposed_event_handlers
    }

    pub fn batch(&self) -> RenderBatch<'_> {
        RenderBatch {
            updated: &self.updated,
            edits: &self.edits,
            reference_frames: &self.reference_frames,
            disposed_components: &self.disposed_components,
            disposed_event_handlers: &self.disposed_event_handlers,
        }
    }

    /// Clears per-batch output. Queues are left alone.
    pub fn clear_for_next_batch(&mut self) {
        self.edits.clear();
        self.reference_frames.clear();
        self.updated.clear();
        self.disposed_components.clear();
        self.disposed_event_handlers.clear();
    }
}

/// Borrowed view of one turn's output, valid only while the display hook runs.
#[derive(Clone, Copy, Debug)]
pub struct RenderBatch<'a> {
    updated: &'a [RenderTreeDiff],
    edits: &'a [RenderTreeEdit],
    reference_frames: &'a [Frame],
    disposed_components: &'a [ComponentId],
    disposed_event_handlers: &'a [EventHandlerId],
}

impl<'a> RenderBatch<'a> {
    /// Diffs in render order: parents before the children they discovered.
    pub fn updated_components(&self) -> &'a [RenderTreeDiff] {
        self.updated
    }

    pub fn edits_for(&self, diff: &RenderTreeDiff) -> &'a [RenderTreeEdit] {
        &self.edits[diff.edits.clone()]
    }

    pub fn reference_frames(&self) -> &'a [Frame] {
        self.reference_frames
    }

    pub fn disposed_component_ids(&self) -> &'a [ComponentId] {
        self.disposed_components
    }

    pub fn disposed_event_handler_ids(&self) -> &'a [EventHandlerId] {
        self.disposed_event_handlers
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
            && self.disposed_components.is_empty()
            && self.disposed_event_handlers.is_empty()
    }

    pub fn edit_count(&self) -> usize {
        self.updated.iter().map(|diff| diff.edits.len()).sum()
    }
}
