//! Frame model: the flattened, sequence-keyed output of one render pass.
//!
//! A frame sequence is a pre-order encoding of a tree. Scope frames
//! (`Element`, `Component`, `Region`) carry the length of their subtree,
//! including themselves, so a sibling walk is `index += subtree_length`.
//!
//! Invariants:
//! - The attributes of an element or component form a contiguous run that
//!   starts right after the scope frame.
//! - Attribute frames never appear outside such a run.
//! - Sequence numbers are source positions, not list positions. They are the
//!   diff key and need not be contiguous.
//! - An element or component may carry an explicit key instead. Keys are
//!   unique among the direct children of one scope.

use core_types::{ComponentId, ElementReferenceId, EventHandlerId, Sequence};
use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

/// Creates a fresh, type-erased component instance.
///
/// The renderer decides what concrete type sits behind the `Any`.
pub type ComponentFactory = fn() -> Box<dyn Any>;

/// Identity of a component type as it appears in a parent's frames.
#[derive(Clone, Copy)]
pub struct ComponentType {
    type_id: TypeId,
    name: &'static str,
    factory: ComponentFactory,
}

impl ComponentType {
    pub fn new(type_id: TypeId, name: &'static str, factory: ComponentFactory) -> Self {
        Self {
            type_id,
            name,
            factory,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instantiate(&self) -> Box<dyn Any> {
        (self.factory)()
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased event delegate. The renderer owns the concrete handler type.
pub type EventDelegate = Rc<dyn Any>;

/// A handler bound to an attribute, plus the component that should re-render
/// after it runs.
#[derive(Clone)]
pub struct EventCallback {
    receiver: Option<ComponentId>,
    delegate: EventDelegate,
}

impl EventCallback {
    pub fn new(delegate: EventDelegate) -> Self {
        Self {
            receiver: None,
            delegate,
        }
    }

    pub fn with_receiver(mut self, receiver: ComponentId) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub fn receiver(&self) -> Option<ComponentId> {
        self.receiver
    }

    pub fn delegate(&self) -> &EventDelegate {
        &self.delegate
    }

    /// Identity comparison: same delegate allocation and same receiver.
    pub fn same_as(&self, other: &EventCallback) -> bool {
        self.receiver == other.receiver
            && std::ptr::addr_eq(Rc::as_ptr(&self.delegate), Rc::as_ptr(&other.delegate))
    }
}

impl fmt::Debug for EventCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventCallback")
            .field("receiver", &self.receiver)
            .field("delegate", &Rc::as_ptr(&self.delegate))
            .finish()
    }
}

/// Callback invoked once a reference capture has been assigned its target.
pub struct CaptureCallback<T>(Rc<dyn Fn(T)>);

impl<T> CaptureCallback<T> {
    pub fn new(callback: impl Fn(T) + 'static) -> Self {
        Self(Rc::new(callback))
    }

    pub fn invoke(&self, value: T) {
        (self.0)(value)
    }
}

impl<T> Clone for CaptureCallback<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> fmt::Debug for CaptureCallback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CaptureCallback")
    }
}

pub type ElementReferenceCallback = CaptureCallback<ElementReferenceId>;
pub type ComponentReferenceCallback = CaptureCallback<ComponentId>;

#[derive(Clone)]
pub enum AttributeValue {
    Text(Arc<str>),
    Bool(bool),
    Int(i64),
    Float(f64),
    Handler(EventCallback),
    /// Arbitrary object. As a component parameter it always counts as changed.
    Object(Rc<dyn Any>),
}

impl AttributeValue {
    /// Returns true only when the values are known to be equal.
    ///
    /// `Object` values always report a possible change.
    pub fn definitely_equals(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Text(a), AttributeValue::Text(b)) => a == b,
            (AttributeValue::Bool(a), AttributeValue::Bool(b)) => a == b,
            (AttributeValue::Int(a), AttributeValue::Int(b)) => a == b,
            (AttributeValue::Float(a), AttributeValue::Float(b)) => a.to_bits() == b.to_bits(),
            (AttributeValue::Handler(a), AttributeValue::Handler(b)) => a.same_as(b),
            _ => false,
        }
    }

    /// Equality used for element attributes: objects compare by allocation.
    pub fn same_value(&self, other: &AttributeValue) -> bool {
        match (self, other) {
            (AttributeValue::Object(a), AttributeValue::Object(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            _ => self.definitely_equals(other),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            AttributeValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&EventCallback> {
        match self {
            AttributeValue::Handler(callback) => Some(callback),
            _ => None,
        }
    }

    pub fn downcast_object<T: 'static>(&self) -> Option<&T> {
        match self {
            AttributeValue::Object(object) => object.downcast_ref::<T>(),
            _ => None,
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Text(text) => write!(f, "{text:?}"),
            AttributeValue::Bool(value) => write!(f, "{value}"),
            AttributeValue::Int(value) => write!(f, "{value}"),
            AttributeValue::Float(value) => write!(f, "{value}"),
            AttributeValue::Handler(callback) => write!(f, "{callback:?}"),
            AttributeValue::Object(_) => f.write_str("<object>"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(Arc::from(value))
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Text(Arc::from(value))
    }
}

impl From<Arc<str>> for AttributeValue {
    fn from(value: Arc<str>) -> Self {
        AttributeValue::Text(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<i32> for AttributeValue {
    fn from(value: i32) -> Self {
        AttributeValue::Int(i64::from(value))
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

impl From<EventCallback> for AttributeValue {
    fn from(value: EventCallback) -> Self {
        AttributeValue::Handler(value)
    }
}

#[derive(Clone, Debug)]
pub enum FrameKind {
    Element {
        name: Arc<str>,
        subtree_length: usize,
        /// Explicit identity among siblings; replaces the sequence as diff key.
        key: Option<Arc<str>>,
    },
    Text(Arc<str>),
    Markup(Arc<str>),
    Attribute {
        name: Arc<str>,
        value: AttributeValue,
        event_handler_id: Option<EventHandlerId>,
    },
    Component {
        component_type: ComponentType,
        subtree_length: usize,
        component_id: Option<ComponentId>,
        key: Option<Arc<str>>,
    },
    Region {
        subtree_length: usize,
    },
    ElementReferenceCapture {
        callback: ElementReferenceCallback,
        reference_id: Option<ElementReferenceId>,
    },
    ComponentReferenceCapture {
        callback: ComponentReferenceCallback,
    },
}

#[derive(Clone, Debug)]
pub struct Frame {
    pub sequence: Sequence,
    pub kind: FrameKind,
}

impl Frame {
    pub fn element(sequence: Sequence, name: &str, subtree_length: usize) -> Self {
        Self {
            sequence,
            kind: FrameKind::Element {
                name: Arc::from(name),
                subtree_length,
                key: None,
            },
        }
    }

    pub fn text(sequence: Sequence, text: &str) -> Self {
        Self {
            sequence,
            kind: FrameKind::Text(Arc::from(text)),
        }
    }

    pub fn markup(sequence: Sequence, markup: &str) -> Self {
        Self {
            sequence,
            kind: FrameKind::Markup(Arc::from(markup)),
        }
    }

    pub fn attribute(sequence: Sequence, name: &str, value: impl Into<AttributeValue>) -> Self {
        Self {
            sequence,
            kind: FrameKind::Attribute {
                name: Arc::from(name),
                value: value.into(),
                event_handler_id: None,
            },
        }
    }

    pub fn component(
        sequence: Sequence,
        component_type: ComponentType,
        subtree_length: usize,
    ) -> Self {
        Self {
            sequence,
            kind: FrameKind::Component {
                component_type,
                subtree_length,
                component_id: None,
                key: None,
            },
        }
    }

    pub fn region(sequence: Sequence, subtree_length: usize) -> Self {
        Self {
            sequence,
            kind: FrameKind::Region { subtree_length },
        }
    }

    /// Sets the sibling key of an element or component frame. Other frames
    /// cannot be keyed and are returned unchanged.
    pub fn with_key(mut self, key: &str) -> Self {
        match &mut self.kind {
            FrameKind::Element { key: slot, .. } | FrameKind::Component { key: slot, .. } => {
                *slot = Some(Arc::from(key));
            }
            _ => {}
        }
        self
    }

    pub fn key(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Element { key, .. } | FrameKind::Component { key, .. } => key.as_deref(),
            _ => None,
        }
    }

    /// Length of the subtree rooted at this frame, including the frame itself.
    pub fn subtree_length(&self) -> usize {
        match &self.kind {
            FrameKind::Element { subtree_length, .. }
            | FrameKind::Component { subtree_length, .. }
            | FrameKind::Region { subtree_length } => *subtree_length,
            FrameKind::Text(_)
            | FrameKind::Markup(_)
            | FrameKind::Attribute { .. }
            | FrameKind::ElementReferenceCapture { .. }
            | FrameKind::ComponentReferenceCapture { .. } => 1,
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, FrameKind::Attribute { .. })
    }

    /// Reference captures occupy a frame slot but produce no display node.
    pub fn is_capture(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::ElementReferenceCapture { .. } | FrameKind::ComponentReferenceCapture { .. }
        )
    }

    pub fn component_id(&self) -> Option<ComponentId> {
        match &self.kind {
            FrameKind::Component { component_id, .. } => *component_id,
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            FrameKind::Element { .. } => "element",
            FrameKind::Text(_) => "text",
            FrameKind::Markup(_) => "markup",
            FrameKind::Attribute { .. } => "attribute",
            FrameKind::Component { .. } => "component",
            FrameKind::Region { .. } => "region",
            FrameKind::ElementReferenceCapture { .. } => "element-ref",
            FrameKind::ComponentReferenceCapture { .. } => "component-ref",
        }
    }
}

/// End of the attribute run that heads the scope at `index`.
pub fn attribute_run_end(frames: &[Frame], index: usize) -> usize {
    let end = index + frames[index].subtree_length();
    let mut cursor = index + 1;
    while cursor < end && frames[cursor].is_attribute() {
        cursor += 1;
    }
    cursor
}

/// Frame indices of the direct children in `start..end`.
pub fn sibling_indices(frames: &[Frame], start: usize, end: usize, out: &mut Vec<usize>) {
    let mut cursor = start;
    while cursor < end {
        out.push(cursor);
        cursor += frames[cursor].subtree_length().max(1);
    }
}
