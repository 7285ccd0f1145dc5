//! Event dispatch surface: handler delegates, event arguments and the
//! registry of handler ids assigned during diffing.

use crate::component::LifecycleTask;
use core_types::{ComponentId, EventHandlerId};
use render_tree::{AttributeValue, EventCallback, EventDelegate, Frame, FrameKind, FrameSequence};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub enum EventArgs {
    Empty,
    Value(FieldValue),
    Mouse { x: f64, y: f64, button: u8 },
    Keyboard { key: String },
    Custom(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Bool(bool),
}

impl FieldValue {
    /// Attribute a client-side edit of this kind writes to.
    pub fn attribute_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "value",
            FieldValue::Bool(_) => "checked",
        }
    }

    fn to_attribute_value(&self) -> AttributeValue {
        match self {
            FieldValue::Text(text) => AttributeValue::Text(Arc::from(text.as_str())),
            FieldValue::Bool(value) => AttributeValue::Bool(*value),
        }
    }
}

/// Client-side state that changed together with the event, e.g. the text of
/// an input. Applied to the component's current frames before the handler
/// runs so that the next diff does not revert the edit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventFieldInfo {
    pub component_id: ComponentId,
    pub field_value: FieldValue,
}

/// The concrete payload behind every `EventDelegate` this crate creates.
pub struct EventHandler {
    invoke: Box<dyn Fn(&EventArgs) -> LifecycleTask>,
}

impl EventHandler {
    pub fn invoke(&self, args: &EventArgs) -> LifecycleTask {
        (self.invoke)(args)
    }
}

impl fmt::Debug for EventHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EventHandler")
    }
}

/// Wraps a closure as a delegate for `RenderTreeBuilder::add_event_handler`.
pub fn handler(invoke: impl Fn(&EventArgs) -> LifecycleTask + 'static) -> EventDelegate {
    Rc::new(EventHandler {
        invoke: Box::new(invoke),
    })
}

/// A callback with no receiver, e.g. passed to a child as a parameter.
pub fn callback(invoke: impl Fn(&EventArgs) -> LifecycleTask + 'static) -> EventCallback {
    EventCallback::new(handler(invoke))
}

/// A live handler id as the registry sees it.
#[derive(Clone, Debug)]
pub(crate) struct Registration {
    /// Component whose frames carry the handler.
    pub(crate) owner: ComponentId,
    pub(crate) callback: EventCallback,
}

#[derive(Debug, Default)]
pub(crate) struct EventRegistry {
    handlers: HashMap<EventHandlerId, Registration>,
    /// Old id to the id that replaced it while the display may still hold the old one.
    replacements: HashMap<EventHandlerId, EventHandlerId>,
}

impl EventRegistry {
    pub(crate) fn register(
        &mut self,
        id: EventHandlerId,
        owner: ComponentId,
        callback: EventCallback,
    ) {
        self.handlers.insert(id, Registration { owner, callback });
    }

    pub(crate) fn record_replacement(&mut self, old: EventHandlerId, new: EventHandlerId) {
        self.replacements.insert(old, new);
    }

    /// Resolves `id`, following replacements to the live handler.
    pub(crate) fn resolve(&self, id: EventHandlerId) -> Option<(EventHandlerId, &Registration)> {
        let mut current = id;
        // A chain can't be longer than the number of replacements recorded.
        for _ in 0..=self.replacements.len() {
            if let Some(registration) = self.handlers.get(&current) {
                return Some((current, registration));
            }
            current = *self.replacements.get(&current)?;
        }
        None
    }

    /// Newest id in the replacement chain starting at `id`; this is the id
    /// the component's current frames carry.
    pub(crate) fn latest(&self, id: EventHandlerId) -> EventHandlerId {
        let mut current = id;
        for _ in 0..self.replacements.len() {
            match self.replacements.get(&current) {
                Some(next) => current = *next,
                None => break,
            }
        }
        current
    }

    /// Forgets ids the display has acknowledged as gone.
    pub(crate) fn remove(&mut self, ids: &[EventHandlerId]) {
        for id in ids {
            self.handlers.remove(id);
            self.replacements.remove(id);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.len()
    }
}

/// Writes `value` into the element that carries handler `handler_id`,
/// adding the attribute when the element does not have it yet. Returns
/// `false` when the handler is not in `frames`.
pub(crate) fn apply_field_value(
    frames: &mut FrameSequence,
    handler_id: EventHandlerId,
    value: &FieldValue,
) -> bool {
    let Some(handler_index) = frames.frames().iter().position(|frame| {
        matches!(
            frame.kind,
            FrameKind::Attribute { event_handler_id: Some(id), .. } if id == handler_id
        )
    }) else {
        return false;
    };
    let mut element = handler_index;
    while element > 0 && frames.frames()[element].is_attribute() {
        element -= 1;
    }
    if !matches!(frames.frames()[element].kind, FrameKind::Element { .. }) {
        return false;
    }

    let name = value.attribute_name();
    let run_end = render_tree::frame::attribute_run_end(frames.frames(), element);
    let existing = (element + 1..run_end).rev().find(|&i| {
        matches!(
            &frames.frames()[i].kind,
            FrameKind::Attribute { name: candidate, .. } if &**candidate == name
        )
    });
    match existing {
        Some(index) => {
            if let FrameKind::Attribute { value: slot, .. } = &mut frames.frames_mut()[index].kind {
                *slot = value.to_attribute_value();
            }
        }
        None => {
            let sequence = frames.frames()[handler_index].sequence;
            let attribute = Frame::attribute(sequence, name, value.to_attribute_value());
            frames.insert_attribute(element, attribute);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> EventCallback {
        callback(|_| LifecycleTask::completed())
    }

    #[test]
    fn replaced_ids_resolve_to_the_live_handler() {
        let mut registry = EventRegistry::default();
        registry.register(EventHandlerId(1), ComponentId(1), noop());
        registry.register(EventHandlerId(2), ComponentId(1), noop());
        registry.remove(&[EventHandlerId(1)]);
        registry.record_replacement(EventHandlerId(1), EventHandlerId(2));
        let (resolved, registration) = registry
            .resolve(EventHandlerId(1))
            .expect("replacement resolves");
        assert_eq!(resolved, EventHandlerId(2));
        assert_eq!(registration.owner, ComponentId(1));

        registry.record_replacement(EventHandlerId(2), EventHandlerId(3));
        assert_eq!(registry.latest(EventHandlerId(1)), EventHandlerId(3));
        assert_eq!(registry.latest(EventHandlerId(3)), EventHandlerId(3));

        registry.remove(&[EventHandlerId(2)]);
        assert!(registry.resolve(EventHandlerId(1)).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn delegates_downcast_to_event_handler() {
        let delegate = handler(|args| match args {
            EventArgs::Empty => LifecycleTask::completed(),
            _ => LifecycleTask::failed(crate::ComponentError::new("unexpected args")),
        });
        let handler = delegate.downcast_ref::<EventHandler>().expect("our delegate");
        assert!(matches!(
            handler.invoke(&EventArgs::Empty),
            LifecycleTask::Completed(Ok(()))
        ));
    }

    #[test]
    fn field_value_overwrites_or_inserts_the_bound_attribute() {
        let mut with_value = FrameSequence::from_frames(vec![
            Frame::element(0, "input", 3),
            Frame::attribute(1, "value", "old"),
            Frame {
                sequence: 2,
                kind: FrameKind::Attribute {
                    name: Arc::from("onchange"),
                    value: AttributeValue::Handler(noop()),
                    event_handler_id: Some(EventHandlerId(9)),
                },
            },
        ]);
        assert!(apply_field_value(
            &mut with_value,
            EventHandlerId(9),
            &FieldValue::Text("new".into())
        ));
        assert_eq!(with_value.frames()[1].kind_name(), "attribute");
        assert!(matches!(
            &with_value.frames()[1].kind,
            FrameKind::Attribute { value, .. } if value.as_text() == Some("new")
        ));

        let mut without = FrameSequence::from_frames(vec![
            Frame::element(0, "input", 2),
            Frame {
                sequence: 1,
                kind: FrameKind::Attribute {
                    name: Arc::from("onchange"),
                    value: AttributeValue::Handler(noop()),
                    event_handler_id: Some(EventHandlerId(4)),
                },
            },
        ]);
        assert!(apply_field_value(&mut without, EventHandlerId(4), &FieldValue::Bool(true)));
        assert_eq!(without.frames()[0].subtree_length(), 3);
        assert!(matches!(
            &without.frames()[2].kind,
            FrameKind::Attribute { name, value, .. }
                if &**name == "checked" && value.as_bool() == Some(true)
        ));
        assert!(!apply_field_value(&mut without, EventHandlerId(77), &FieldValue::Bool(false)));
    }
}
