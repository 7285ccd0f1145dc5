//! Per-component records and the arena that owns them.
//!
//! Lifecycle:
//! `Uninitialized -> Attached -> Rendered <-> RenderPending -> Disposing -> Disposed`.
//! Parent links are ids, so removing an entry can't leave a dangling reference.

use crate::component::Component;
use core_types::ComponentId;
use futures::future::AbortHandle;
use render_tree::{FramePool, FrameSequence};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Attached,
    Rendered,
    RenderPending,
    Disposing,
    Disposed,
}

impl Lifecycle {
    /// Whether the component may still be rendered.
    pub fn is_live(self) -> bool {
        matches!(
            self,
            Lifecycle::Attached | Lifecycle::Rendered | Lifecycle::RenderPending
        )
    }
}

/// What the next render of a component produces instead of its own tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ClearThen {
    /// Error boundary: drop the failed subtree, then render normally.
    Rebuild,
    /// Failed component: drop its output, then dispose it.
    Dispose,
}

pub(crate) struct ComponentState {
    pub(crate) id: ComponentId,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) component: Option<Box<dyn Component>>,
    pub(crate) current: FrameSequence,
    pub(crate) previous: Option<FrameSequence>,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) has_rendered: bool,
    /// Set while the id sits in the render queue.
    pub(crate) queued: bool,
    pub(crate) clear: Option<ClearThen>,
    /// In-flight lifecycle tasks, cancelled on disposal.
    pub(crate) tasks: Vec<(u64, AbortHandle)>,
}

impl ComponentState {
    pub(crate) fn new(
        id: ComponentId,
        parent: Option<ComponentId>,
        component: Option<Box<dyn Component>>,
    ) -> Self {
        Self {
            id,
            parent,
            component,
            current: FrameSequence::empty(),
            previous: None,
            lifecycle: Lifecycle::Uninitialized,
            has_rendered: false,
            queued: false,
            clear: None,
            tasks: Vec::new(),
        }
    }

    /// Installs a freshly built sequence, retiring the one before the last.
    pub(crate) fn commit_frames(
        &mut self,
        old: FrameSequence,
        new: FrameSequence,
        pool: &mut FramePool,
    ) {
        if let Some(stale) = self.previous.replace(old) {
            stale.release(pool);
        }
        self.current = new;
        self.lifecycle = Lifecycle::Rendered;
    }

    pub(crate) fn release_previous(&mut self, pool: &mut FramePool) {
        if let Some(previous) = self.previous.take() {
            previous.release(pool);
        }
    }

    pub(crate) fn release_frames(&mut self, pool: &mut FramePool) {
        self.release_previous(pool);
        std::mem::take(&mut self.current).release(pool);
    }

    pub(crate) fn cancel_tasks(&mut self) -> usize {
        let cancelled = self.tasks.len();
        for (_, handle) in self.tasks.drain(..) {
            handle.abort();
        }
        cancelled
    }
}

impl fmt::Debug for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentState")
            .field("id", &self.id)
            .field("parent", &self.parent)
            .field("lifecycle", &self.lifecycle)
            .field("frames", &self.current.len())
            .field("queued", &self.queued)
            .finish_non_exhaustive()
    }
}

/// Arena of component states keyed by id. Ordered so that bulk operations
/// (renderer disposal) visit components in attach order.
#[derive(Debug, Default)]
pub(crate) struct ComponentTable {
    states: BTreeMap<ComponentId, ComponentState>,
}

impl ComponentTable {
    pub(crate) fn insert(&mut self, state: ComponentState) {
        self.states.insert(state.id, state);
    }

    pub(crate) fn get(&self, id: ComponentId) -> Option<&ComponentState> {
        self.states.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ComponentId) -> Option<&mut ComponentState> {
        self.states.get_mut(&id)
    }

    pub(crate) fn remove(&mut self, id: ComponentId) -> Option<ComponentState> {
        self.states.remove(&id)
    }

    pub(crate) fn lifecycle(&self, id: ComponentId) -> Option<Lifecycle> {
        self.states.get(&id).map(|state| state.lifecycle)
    }

    pub(crate) fn is_live(&self, id: ComponentId) -> bool {
        self.lifecycle(id).is_some_and(Lifecycle::is_live)
    }

    pub(crate) fn ids(&self) -> Vec<ComponentId> {
        self.states.keys().copied().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }

    /// Ancestors of `id`, nearest first.
    pub(crate) fn ancestors(&self, id: ComponentId) -> Vec<ComponentId> {
        let mut chain = Vec::new();
        let mut cursor = self.states.get(&id).and_then(|state| state.parent);
        while let Some(parent) = cursor {
            chain.push(parent);
            cursor = self.states.get(&parent).and_then(|state| state.parent);
        }
        chain
    }
}
