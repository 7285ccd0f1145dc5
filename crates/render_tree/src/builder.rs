//! Accretes the frame sequence of one render pass.
//!
//! The builder keeps a stack of open scopes. Closing a scope back-patches the
//! opening frame's `subtree_length` with `len - open_index`.
//!
//! Misuse is a programmer error in render logic and is fail-fast: the first
//! violation is recorded, every later call is ignored, and `finish` reports
//! the violation instead of a sequence.

use crate::frame::{
    AttributeValue, ComponentReferenceCallback, ComponentType, ElementReferenceCallback,
    EventCallback, EventDelegate, Frame, FrameKind,
};
use crate::pool::FramePool;
use crate::sequence::FrameSequence;
use core_types::{ComponentId, Sequence};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScopeKind {
    Element,
    Component,
    Region,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Element => f.write_str("element"),
            ScopeKind::Component => f.write_str("component"),
            ScopeKind::Region => f.write_str("region"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MalformedKind {
    #[error("attribute added outside the head of an element or component")]
    AttributeOutsideScopeHead,
    #[error("element reference capture outside an element")]
    ElementCaptureOutsideElement,
    #[error("component reference capture outside a component")]
    ComponentCaptureOutsideComponent,
    #[error("close {closed} with no open scope")]
    CloseWithoutOpen { closed: ScopeKind },
    #[error("close {closed} while {open} is open")]
    MismatchedClose { open: ScopeKind, closed: ScopeKind },
    #[error("content added inside a component scope")]
    ContentInsideComponent,
    #[error("{count} scope(s) still open at finish")]
    UnclosedScopes { count: usize },
    #[error("key set outside the head of an element or component")]
    KeyOutsideScopeHead,
    #[error("more than one sibling has the same key")]
    DuplicateKey,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("malformed render tree: {kind} (sequence {sequence:?}, depth {depth})")]
pub struct MalformedTree {
    pub kind: MalformedKind,
    pub sequence: Option<Sequence>,
    pub depth: usize,
}

#[derive(Clone, Copy, Debug)]
struct OpenScope {
    index: usize,
    kind: ScopeKind,
}

#[derive(Debug, Default)]
pub struct RenderTreeBuilder {
    owner: Option<ComponentId>,
    frames: Vec<Frame>,
    open_scopes: Vec<OpenScope>,
    /// Index of the scope frame that may still receive attributes.
    attribute_target: Option<usize>,
    /// Keys used so far at each nesting level, outermost first.
    sibling_keys: Vec<HashSet<Arc<str>>>,
    error: Option<MalformedTree>,
}

impl RenderTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a render pass for `owner` on a buffer rented from `pool`.
    pub fn rent(pool: &mut FramePool, owner: Option<ComponentId>) -> Self {
        let capacity = pool.config().initial_capacity;
        Self::with_buffer(owner, pool.rent(capacity))
    }

    pub fn with_buffer(owner: Option<ComponentId>, mut buffer: Vec<Frame>) -> Self {
        buffer.clear();
        Self {
            owner,
            frames: buffer,
            open_scopes: Vec::new(),
            attribute_target: None,
            sibling_keys: Vec::new(),
            error: None,
        }
    }

    /// Component whose render logic is running, if any. Handlers added with
    /// `add_event_handler` re-render this component.
    pub fn owner(&self) -> Option<ComponentId> {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn error(&self) -> Option<&MalformedTree> {
        self.error.as_ref()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.open_scopes.clear();
        self.attribute_target = None;
        self.sibling_keys.clear();
        self.error = None;
    }

    pub fn open_element(&mut self, sequence: Sequence, name: &str) {
        self.open_scope(
            ScopeKind::Element,
            Frame {
                sequence,
                kind: FrameKind::Element {
                    name: Arc::from(name),
                    subtree_length: 0,
                    key: None,
                },
            },
        );
    }

    pub fn close_element(&mut self) {
        self.close_scope(ScopeKind::Element);
    }

    pub fn open_region(&mut self, sequence: Sequence) {
        self.open_scope(
            ScopeKind::Region,
            Frame {
                sequence,
                kind: FrameKind::Region { subtree_length: 0 },
            },
        );
    }

    pub fn close_region(&mut self) {
        self.close_scope(ScopeKind::Region);
    }

    pub fn open_component(&mut self, sequence: Sequence, component_type: ComponentType) {
        self.open_scope(
            ScopeKind::Component,
            Frame {
                sequence,
                kind: FrameKind::Component {
                    component_type,
                    subtree_length: 0,
                    component_id: None,
                    key: None,
                },
            },
        );
    }

    pub fn close_component(&mut self) {
        self.close_scope(ScopeKind::Component);
    }

    /// Adds a child component together with its parameters.
    ///
    /// The child is instantiated and rendered by the renderer after this
    /// sequence is finished, never inline.
    pub fn add_component<N, V>(
        &mut self,
        sequence: Sequence,
        component_type: ComponentType,
        parameters: impl IntoIterator<Item = (N, V)>,
    ) where
        N: AsRef<str>,
        V: Into<AttributeValue>,
    {
        self.open_component(sequence, component_type);
        for (name, value) in parameters {
            self.add_attribute(sequence, name.as_ref(), value);
        }
        self.close_component();
    }

    pub fn add_attribute(
        &mut self,
        sequence: Sequence,
        name: &str,
        value: impl Into<AttributeValue>,
    ) {
        if self.error.is_some() {
            return;
        }
        if self.attribute_target.is_none() {
            self.fail(MalformedKind::AttributeOutsideScopeHead, Some(sequence));
            return;
        }
        self.frames.push(Frame {
            sequence,
            kind: FrameKind::Attribute {
                name: Arc::from(name),
                value: value.into(),
                event_handler_id: None,
            },
        });
    }

    /// Keys the element or component whose head is open. Keyed siblings are
    /// matched by key rather than by sequence when diffing, so they keep
    /// their state across reorders.
    pub fn set_key(&mut self, key: impl fmt::Display) {
        if self.error.is_some() {
            return;
        }
        let Some(target) = self.attribute_target else {
            self.fail(MalformedKind::KeyOutsideScopeHead, None);
            return;
        };
        let sequence = self.frames[target].sequence;
        let key: Arc<str> = Arc::from(key.to_string());
        // The keyed scope is already on the stack; its siblings live one level up.
        let level = self.open_scopes.len() - 1;
        if self.sibling_keys.len() <= level {
            self.sibling_keys.resize_with(level + 1, HashSet::new);
        }
        if !self.sibling_keys[level].insert(Arc::clone(&key)) {
            self.fail(MalformedKind::DuplicateKey, Some(sequence));
            return;
        }
        match &mut self.frames[target].kind {
            FrameKind::Element { key: slot, .. } | FrameKind::Component { key: slot, .. } => {
                *slot = Some(key);
            }
            _ => {}
        }
    }

    /// Adds a handler attribute that re-renders the builder's owner after it runs.
    pub fn add_event_handler(&mut self, sequence: Sequence, name: &str, delegate: EventDelegate) {
        let mut callback = EventCallback::new(delegate);
        if let Some(owner) = self.owner {
            callback = callback.with_receiver(owner);
        }
        self.add_attribute(sequence, name, AttributeValue::Handler(callback));
    }

    pub fn add_text(&mut self, sequence: Sequence, text: &str) {
        self.push_leaf(Frame {
            sequence,
            kind: FrameKind::Text(Arc::from(text)),
        });
    }

    pub fn add_markup(&mut self, sequence: Sequence, markup: &str) {
        self.push_leaf(Frame {
            sequence,
            kind: FrameKind::Markup(Arc::from(markup)),
        });
    }

    pub fn add_element_reference_capture(
        &mut self,
        sequence: Sequence,
        callback: ElementReferenceCallback,
    ) {
        if self.error.is_some() {
            return;
        }
        if self.current_scope() != Some(ScopeKind::Element) {
            self.fail(MalformedKind::ElementCaptureOutsideElement, Some(sequence));
            return;
        }
        self.push_leaf(Frame {
            sequence,
            kind: FrameKind::ElementReferenceCapture {
                callback,
                reference_id: None,
            },
        });
    }

    pub fn add_component_reference_capture(
        &mut self,
        sequence: Sequence,
        callback: ComponentReferenceCallback,
    ) {
        if self.error.is_some() {
            return;
        }
        if self.current_scope() != Some(ScopeKind::Component) {
            self.fail(MalformedKind::ComponentCaptureOutsideComponent, Some(sequence));
            return;
        }
        self.push_leaf(Frame {
            sequence,
            kind: FrameKind::ComponentReferenceCapture { callback },
        });
    }

    /// Closes the pass. On failure the buffer goes back to `pool`.
    pub fn finish(mut self, pool: &mut FramePool) -> Result<FrameSequence, MalformedTree> {
        if let Some(innermost) = self.open_scopes.last().copied() {
            let sequence = self.frames[innermost.index].sequence;
            self.fail(
                MalformedKind::UnclosedScopes {
                    count: self.open_scopes.len(),
                },
                Some(sequence),
            );
        }
        if let Some(error) = self.error.take() {
            log::debug!(target: "render_tree.builder", "rejecting sequence: {error}");
            pool.give_back(std::mem::take(&mut self.frames));
            return Err(error);
        }
        log::trace!(
            target: "render_tree.builder",
            "finished {} frame(s) for {:?}",
            self.frames.len(),
            self.owner
        );
        Ok(FrameSequence::from_frames(std::mem::take(&mut self.frames)))
    }

    fn current_scope(&self) -> Option<ScopeKind> {
        self.open_scopes.last().map(|scope| scope.kind)
    }

    fn open_scope(&mut self, kind: ScopeKind, frame: Frame) {
        if self.error.is_some() {
            return;
        }
        if self.current_scope() == Some(ScopeKind::Component) {
            self.fail(MalformedKind::ContentInsideComponent, Some(frame.sequence));
            return;
        }
        let index = self.frames.len();
        self.frames.push(frame);
        self.open_scopes.push(OpenScope { index, kind });
        // Children of the new scope start with no keys.
        self.sibling_keys.truncate(self.open_scopes.len());
        self.attribute_target = match kind {
            ScopeKind::Element | ScopeKind::Component => Some(index),
            ScopeKind::Region => None,
        };
    }

    fn close_scope(&mut self, closed: ScopeKind) {
        if self.error.is_some() {
            return;
        }
        let Some(scope) = self.open_scopes.last().copied() else {
            self.fail(MalformedKind::CloseWithoutOpen { closed }, None);
            return;
        };
        if scope.kind != closed {
            let sequence = self.frames[scope.index].sequence;
            self.fail(
                MalformedKind::MismatchedClose {
                    open: scope.kind,
                    closed,
                },
                Some(sequence),
            );
            return;
        }
        self.open_scopes.pop();
        self.attribute_target = None;
        let length = self.frames.len() - scope.index;
        match &mut self.frames[scope.index].kind {
            FrameKind::Element { subtree_length, .. }
            | FrameKind::Component { subtree_length, .. }
            | FrameKind::Region { subtree_length } => *subtree_length = length,
            _ => {}
        }
    }

    fn push_leaf(&mut self, frame: Frame) {
        if self.error.is_some() {
            return;
        }
        if self.current_scope() == Some(ScopeKind::Component)
            && !matches!(frame.kind, FrameKind::ComponentReferenceCapture { .. })
        {
            self.fail(MalformedKind::ContentInsideComponent, Some(frame.sequence));
            return;
        }
        self.attribute_target = None;
        self.frames.push(frame);
    }

    fn fail(&mut self, kind: MalformedKind, sequence: Option<Sequence>) {
        if self.error.is_none() {
            self.error = Some(MalformedTree {
                kind,
                sequence,
                depth: self.open_scopes.len(),
            });
        }
    }
}
