#![allow(dead_code)]

use futures::executor::LocalPool;
use render_tree::{Frame, FrameKind, RenderTreeEdit};
use render_tree_test_support::DisplayTree;
use renderer::{
    AttributeValue, ComponentId, DisplayError, DisplayHook, DisplayTask, EventHandlerId,
    ExceptionSink, RenderBatch, RenderError, Renderer, RendererConfig,
};
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static JOURNAL: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Appends to this test thread's lifecycle journal.
pub fn note(entry: impl Into<String>) {
    JOURNAL.with(|journal| journal.borrow_mut().push(entry.into()));
}

/// Takes everything journaled so far.
pub fn journal() -> Vec<String> {
    JOURNAL.with(|journal| journal.borrow_mut().drain(..).collect())
}

pub fn lines(expected: &[&str]) -> Vec<String> {
    expected.iter().map(|line| line.to_string()).collect()
}

/// Display hook replaying batches onto a `DisplayTree`, keeping a readable
/// log of the attribute and structure edits it saw.
pub struct TreeDisplay {
    tree: Rc<RefCell<DisplayTree>>,
    edits: Rc<RefCell<Vec<String>>>,
    pending: bool,
}

impl DisplayHook for TreeDisplay {
    fn root_attached(&mut self, component_id: ComponentId) -> Result<(), DisplayError> {
        self.tree
            .borrow_mut()
            .attach_root(component_id)
            .map_err(|err| DisplayError::new(err.to_string()))
    }

    fn update_display(&mut self, batch: &RenderBatch<'_>) -> DisplayTask {
        let frames = batch.reference_frames();
        let mut log = self.edits.borrow_mut();
        for diff in batch.updated_components() {
            for edit in batch.edits_for(diff) {
                log.push(describe(edit, frames));
            }
        }
        let applied = self
            .tree
            .borrow_mut()
            .apply(batch)
            .map_err(|err| DisplayError::new(err.to_string()));
        if self.pending {
            DisplayTask::pending(async move { applied })
        } else {
            DisplayTask::Completed(applied)
        }
    }
}

fn describe(edit: &RenderTreeEdit, frames: &[Frame]) -> String {
    match edit {
        RenderTreeEdit::SetAttribute {
            reference_frame_index,
            ..
        }
        | RenderTreeEdit::PrependFrame {
            reference_frame_index,
            ..
        } => match &frames[*reference_frame_index].kind {
            FrameKind::Attribute { name, .. } => format!("set {name}"),
            other => format!("prepend {}", kind_name(other)),
        },
        RenderTreeEdit::RemoveAttribute { name, .. } => format!("unset {name}"),
        RenderTreeEdit::UpdateText { .. } => "text".to_string(),
        other => other.to_string(),
    }
}

fn kind_name(kind: &FrameKind) -> &'static str {
    match kind {
        FrameKind::Element { .. } => "element",
        FrameKind::Text(_) => "text",
        FrameKind::Markup(_) => "markup",
        FrameKind::Component { .. } => "component",
        FrameKind::Region { .. } => "region",
        _ => "other",
    }
}

#[derive(Clone, Default)]
pub struct RecordingSink {
    pub errors: Rc<RefCell<Vec<String>>>,
}

impl ExceptionSink for RecordingSink {
    fn handle_exception(&mut self, error: &RenderError) {
        self.errors.borrow_mut().push(error.to_string());
    }
}

/// A renderer driven by a local pool on the test thread.
pub struct Harness {
    pub pool: LocalPool,
    pub renderer: Renderer,
    pub tree: Rc<RefCell<DisplayTree>>,
    pub edits: Rc<RefCell<Vec<String>>>,
    pub errors: Rc<RefCell<Vec<String>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(RendererConfig::default(), false)
    }

    pub fn with_config(config: RendererConfig) -> Self {
        Self::build(config, false)
    }

    /// Display acknowledgements only arrive once the pool runs.
    pub fn with_pending_display() -> Self {
        Self::build(RendererConfig::default(), true)
    }

    fn build(config: RendererConfig, pending: bool) -> Self {
        journal();
        let pool = LocalPool::new();
        let tree = Rc::new(RefCell::new(DisplayTree::new()));
        let edits = Rc::new(RefCell::new(Vec::new()));
        let display = TreeDisplay {
            tree: Rc::clone(&tree),
            edits: Rc::clone(&edits),
            pending,
        };
        let mut renderer = Renderer::new(config, Box::new(display), pool.spawner());
        let sink = RecordingSink::default();
        let errors = Rc::clone(&sink.errors);
        renderer.set_exception_sink(Box::new(sink));
        Self {
            pool,
            renderer,
            tree,
            edits,
            errors,
        }
    }

    /// Runs spawned tasks and the turns their notices cause.
    pub fn settle(&mut self) {
        for _ in 0..16 {
            self.pool.run_until_stalled();
            self.renderer.process_notices();
        }
    }

    pub fn snapshot(&self, id: ComponentId) -> Vec<String> {
        self.tree.borrow().snapshot(id).expect("component has a display container")
    }

    pub fn handlers(
        &self,
        root: ComponentId,
        element: &str,
        attribute: &str,
    ) -> Vec<EventHandlerId> {
        self.tree
            .borrow()
            .event_handlers(root, element, attribute)
            .expect("root has a display container")
    }

    pub fn take_edits(&self) -> Vec<String> {
        self.edits.borrow_mut().drain(..).collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    /// Ids of the child components in `parent`'s current output.
    pub fn children(&self, parent: ComponentId) -> Vec<ComponentId> {
        self.renderer
            .current_frames(parent)
            .unwrap_or_default()
            .iter()
            .filter_map(|frame| match frame.kind {
                FrameKind::Component { component_id, .. } => component_id,
                _ => None,
            })
            .collect()
    }

    /// Last value of attribute `name` in `id`'s current output.
    pub fn attribute(&self, id: ComponentId, name: &str) -> Option<AttributeValue> {
        self.renderer
            .current_frames(id)?
            .iter()
            .rev()
            .find_map(|frame| match &frame.kind {
                FrameKind::Attribute { name: candidate, value, .. } if &**candidate == name => {
                    Some(value.clone())
                }
                _ => None,
            })
    }
}
