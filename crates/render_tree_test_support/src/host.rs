//! A renderer-free diff host and a replay harness that feeds successive
//! renders of one component through the differ into a `DisplayTree`.

use crate::display::{DisplayError, DisplayTree};
use core_types::{ComponentId, ElementReferenceId, EventHandlerId, IdGenerator};
use render_tree::{DiffHost, EventCallback, Frame, RenderBatchBuilder, RenderTreeEdit, compute_diff};

/// Hands out fresh ids and records what the differ asked for.
#[derive(Debug, Default)]
pub struct CountingHost {
    ids: IdGenerator,
    pub instantiated: Vec<ComponentId>,
    pub updated: Vec<ComponentId>,
    pub replaced: Vec<(EventHandlerId, EventHandlerId)>,
}

impl DiffHost for CountingHost {
    fn instantiate_child(
        &mut self,
        _parent: ComponentId,
        _frames: &[Frame],
        _index: usize,
    ) -> ComponentId {
        // Keep clear of the replay root.
        let id = ComponentId(1000 + self.ids.next_component().0);
        self.instantiated.push(id);
        id
    }

    fn update_child_parameters(&mut self, child: ComponentId, _frames: &[Frame], _index: usize) {
        self.updated.push(child);
    }

    fn assign_event_handler(&mut self, _callback: &EventCallback) -> EventHandlerId {
        self.ids.next_event_handler()
    }

    fn track_replaced_event_handler(&mut self, old: EventHandlerId, new: EventHandlerId) {
        self.replaced.push((old, new));
    }

    fn assign_element_reference(&mut self) -> ElementReferenceId {
        self.ids.next_element_reference()
    }
}

pub const REPLAY_ROOT: ComponentId = ComponentId(1);

/// Successive renders of a single root component, each diffed against the
/// previous one and applied to a display.
#[derive(Debug)]
pub struct Replay {
    pub host: CountingHost,
    display: DisplayTree,
    batch: RenderBatchBuilder,
    current: Vec<Frame>,
}

impl Replay {
    pub fn new() -> Self {
        let mut display = DisplayTree::new();
        display
            .attach_root(REPLAY_ROOT)
            .expect("fresh display has no containers");
        Self {
            host: CountingHost::default(),
            display,
            batch: RenderBatchBuilder::new(),
            current: Vec::new(),
        }
    }

    /// Diffs `frames` against the previous render, applies the batch and
    /// returns the edits it carried.
    pub fn render(&mut self, mut frames: Vec<Frame>) -> Result<Vec<RenderTreeEdit>, DisplayError> {
        self.batch.clear_for_next_batch();
        let diff = compute_diff(
            &mut self.host,
            &mut self.batch,
            REPLAY_ROOT,
            &self.current,
            &mut frames,
        );
        let edits = match diff {
            Some(diff) => {
                let edits = self.batch.batch().edits_for(&diff).to_vec();
                self.batch.push_diff(diff);
                edits
            }
            None => Vec::new(),
        };
        self.display.apply(&self.batch.batch())?;
        self.current = frames;
        Ok(edits)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.current
    }

    pub fn display(&self) -> &DisplayTree {
        &self.display
    }

    pub fn snapshot(&self) -> Result<Vec<String>, DisplayError> {
        self.display.snapshot(REPLAY_ROOT)
    }

    pub fn disposed_event_handlers(&self) -> &[EventHandlerId] {
        self.batch.disposed_event_handler_ids()
    }
}

impl Default for Replay {
    fn default() -> Self {
        Self::new()
    }
}
