//! Identity types shared across the render tree and the renderer.
//!
//! All ids are scoped to one renderer instance. Generators live on the renderer,
//! never in process-wide statics.

use std::fmt;

/// Source-position key assigned by a component's render logic.
pub type Sequence = u32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventHandlerId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementReferenceId(pub u64);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

impl fmt::Display for EventHandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

impl fmt::Display for ElementReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "elemref#{}", self.0)
    }
}

/// Monotonic id source, one counter per id kind. Ids start at 1 and are
/// never reused within one generator, so an id at or below the last one
/// handed out was issued.
#[derive(Debug)]
pub struct IdGenerator {
    next_component: u32,
    next_event_handler: u64,
    next_element_reference: u64,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self {
            next_component: 1,
            next_event_handler: 1,
            next_element_reference: 1,
        }
    }
}

impl IdGenerator {
    pub fn next_component(&mut self) -> ComponentId {
        let id = ComponentId(self.next_component);
        self.next_component += 1;
        id
    }

    pub fn next_event_handler(&mut self) -> EventHandlerId {
        let id = EventHandlerId(self.next_event_handler);
        self.next_event_handler += 1;
        id
    }

    pub fn next_element_reference(&mut self) -> ElementReferenceId {
        let id = ElementReferenceId(self.next_element_reference);
        self.next_element_reference += 1;
        id
    }

    /// Last component id handed out, if any.
    pub fn last_component(&self) -> Option<ComponentId> {
        (self.next_component > 1).then(|| ComponentId(self.next_component - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generator_is_monotonic_and_starts_at_one() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.next_component(), ComponentId(1));
        assert_eq!(ids.next_component(), ComponentId(2));
        assert_eq!(ids.next_component(), ComponentId(3));
    }

    #[test]
    fn id_kinds_count_independently() {
        let mut ids = IdGenerator::default();
        assert_eq!(ids.last_component(), None);
        ids.next_component();
        assert_eq!(ids.next_event_handler(), EventHandlerId(1));
        assert_eq!(ids.next_element_reference(), ElementReferenceId(1));
        assert_eq!(ids.last_component(), Some(ComponentId(1)));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(ComponentId(7).to_string(), "component#7");
        assert_eq!(EventHandlerId(3).to_string(), "handler#3");
    }
}
