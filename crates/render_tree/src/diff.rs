//! Sequence-keyed diffing of one component's frames into an edit script.
//!
//! Contract:
//! - Replaying the script against a display holding `old` yields `new`.
//! - Identical inputs produce no edits, and the diff is omitted.
//! - Component frames are boundaries: their content is never diffed here,
//!   only their parameters are handed to the host.
//! - A frame is reused only when kind, sequence and (for elements) tag name or
//!   (for components) component type all match. A `div` that becomes a `span`
//!   at the same sequence is removed and re-inserted.
//! - Keyed elements and components match by key instead of sequence, and
//!   never match an unkeyed frame. Tag name and component type still apply.
//!
//! Matching per sibling range:
//! - Each old sibling is paired with a new sibling of the same identity. When
//!   several candidates exist, the first unpaired one in scan order wins, so
//!   the i-th old occurrence pairs with the i-th new occurrence.
//! - A walk with two cursors then emits in-place updates, removals of unpaired
//!   old frames and insertions of unpaired new frames. A paired frame met out
//!   of order is updated in place and recorded as a move; the range ends with
//!   a permutation list when any move was recorded.
//! - Regions are transparent: their children are display siblings of the
//!   region's siblings. Regions are matched by position and sequence only.
//!
//! Complexity: O(n + m) per range, plus a hash map when the fast path fails.

use crate::batch::{RenderBatchBuilder, RenderTreeDiff};
use crate::edit::RenderTreeEdit;
use crate::frame::{
    AttributeValue, ComponentReferenceCallback, EventCallback, Frame, FrameKind, attribute_run_end,
    sibling_indices,
};
use core_types::{ComponentId, ElementReferenceId, EventHandlerId, Sequence};
use std::any::TypeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

/// Renderer-side services the differ needs while walking new subtrees.
pub trait DiffHost {
    /// Creates, attaches and parameterizes the child declared at `frames[index]`.
    fn instantiate_child(
        &mut self,
        parent: ComponentId,
        frames: &[Frame],
        index: usize,
    ) -> ComponentId;

    /// Hands possibly-changed parameters to a retained child.
    fn update_child_parameters(&mut self, child: ComponentId, frames: &[Frame], index: usize);

    fn assign_event_handler(&mut self, callback: &EventCallback) -> EventHandlerId;

    fn track_replaced_event_handler(&mut self, old: EventHandlerId, new: EventHandlerId);

    fn assign_element_reference(&mut self) -> ElementReferenceId;
}

/// Diffs `old` against `new` for `component_id`.
///
/// Edits and reference frames are appended to `batch`; disposals found in
/// removed subtrees are queued there. `new` is updated in place with the ids
/// (component, event handler, element reference) it inherits or is assigned.
pub fn compute_diff(
    host: &mut dyn DiffHost,
    batch: &mut RenderBatchBuilder,
    component_id: ComponentId,
    old: &[Frame],
    new: &mut [Frame],
) -> Option<RenderTreeDiff> {
    let start = batch.edits.len();
    let (old_len, new_len) = (old.len(), new.len());
    let mut cx = DiffContext {
        host,
        batch,
        component_id,
        old,
        new,
        sibling_index: 0,
    };
    cx.diff_range(0, old_len, 0, new_len);
    let end = cx.batch.edits.len();
    log::trace!(
        target: "render_tree.diff",
        "{component_id}: {} old frame(s), {} new frame(s), {} edit(s)",
        old_len,
        new_len,
        end - start
    );
    (end > start).then_some(RenderTreeDiff {
        component_id,
        edits: start..end,
    })
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
enum SlotKey<'f> {
    Element(Sequence, &'f str),
    Text(Sequence),
    Markup(Sequence),
    Component(Sequence, TypeId),
    KeyedElement(&'f str, &'f str),
    KeyedComponent(&'f str, TypeId),
}

fn slot_key(frame: &Frame) -> Option<SlotKey<'_>> {
    match &frame.kind {
        FrameKind::Element { name, key: Some(key), .. } => Some(SlotKey::KeyedElement(key, name)),
        FrameKind::Element { name, .. } => Some(SlotKey::Element(frame.sequence, name)),
        FrameKind::Text(_) => Some(SlotKey::Text(frame.sequence)),
        FrameKind::Markup(_) => Some(SlotKey::Markup(frame.sequence)),
        FrameKind::Component {
            component_type,
            key: Some(key),
            ..
        } => Some(SlotKey::KeyedComponent(key, component_type.type_id())),
        FrameKind::Component { component_type, .. } => {
            Some(SlotKey::Component(frame.sequence, component_type.type_id()))
        }
        FrameKind::Region { .. }
        | FrameKind::Attribute { .. }
        | FrameKind::ElementReferenceCapture { .. }
        | FrameKind::ComponentReferenceCapture { .. } => None,
    }
}

fn is_region(frame: &Frame) -> bool {
    matches!(frame.kind, FrameKind::Region { .. })
}

fn attribute_name(frame: &Frame) -> Option<&Arc<str>> {
    match &frame.kind {
        FrameKind::Attribute { name, .. } => Some(name),
        _ => None,
    }
}

fn attribute_parts(frame: &Frame) -> Option<(&AttributeValue, Option<EventHandlerId>)> {
    match &frame.kind {
        FrameKind::Attribute {
            value,
            event_handler_id,
            ..
        } => Some((value, *event_handler_id)),
        _ => None,
    }
}

fn has_duplicate_names(attributes: &[Frame]) -> bool {
    let mut seen = HashSet::new();
    attributes
        .iter()
        .filter_map(attribute_name)
        .any(|name| !seen.insert(name))
}

/// Pairing of old and new siblings by position within their sibling lists.
struct Pairing {
    old_partner: Vec<Option<usize>>,
    new_partner: Vec<Option<usize>>,
}

fn pair_siblings(
    old: &[Frame],
    old_siblings: &[usize],
    new: &[Frame],
    new_siblings: &[usize],
) -> Pairing {
    let mut pairing = Pairing {
        old_partner: vec![None; old_siblings.len()],
        new_partner: vec![None; new_siblings.len()],
    };

    // Fast path: unchanged shape, which is the common case for re-renders.
    if old_siblings.len() == new_siblings.len() {
        let mut aligned = true;
        for (pos, (&o, &n)) in old_siblings.iter().zip(new_siblings).enumerate() {
            match (slot_key(&old[o]), slot_key(&new[n])) {
                (Some(a), Some(b)) if a == b => {
                    pairing.old_partner[pos] = Some(pos);
                    pairing.new_partner[pos] = Some(pos);
                }
                (None, None)
                    if is_region(&old[o])
                        && is_region(&new[n])
                        && old[o].sequence == new[n].sequence => {}
                _ => {
                    aligned = false;
                    break;
                }
            }
        }
        if aligned {
            return pairing;
        }
        pairing.old_partner.fill(None);
        pairing.new_partner.fill(None);
    }

    let mut candidates: HashMap<SlotKey<'_>, VecDeque<usize>> = HashMap::new();
    for (pos, &n) in new_siblings.iter().enumerate() {
        if let Some(key) = slot_key(&new[n]) {
            candidates.entry(key).or_default().push_back(pos);
        }
    }
    for (pos, &o) in old_siblings.iter().enumerate() {
        let Some(key) = slot_key(&old[o]) else {
            continue;
        };
        if let Some(new_pos) = candidates.get_mut(&key).and_then(VecDeque::pop_front) {
            pairing.old_partner[pos] = Some(new_pos);
            pairing.new_partner[new_pos] = Some(pos);
        }
    }
    pairing
}

enum InitStep {
    Element,
    Component(Option<ComponentId>),
    Handler(EventCallback),
    Attribute,
    ElementCapture,
    ComponentCapture(ComponentReferenceCallback),
    Leaf,
}

struct DiffContext<'a> {
    host: &'a mut dyn DiffHost,
    batch: &'a mut RenderBatchBuilder,
    component_id: ComponentId,
    old: &'a [Frame],
    new: &'a mut [Frame],
    sibling_index: usize,
}

impl DiffContext<'_> {
    fn diff_range(&mut self, old_start: usize, old_end: usize, new_start: usize, new_end: usize) {
        let old = self.old;
        self.sync_captures(old_start, old_end, new_start, new_end);

        let mut old_siblings = Vec::new();
        sibling_indices(old, old_start, old_end, &mut old_siblings);
        old_siblings.retain(|&i| !old[i].is_capture());
        let mut new_siblings = Vec::new();
        sibling_indices(self.new, new_start, new_end, &mut new_siblings);
        new_siblings.retain(|&i| !self.new[i].is_capture());

        let pairing = pair_siblings(old, &old_siblings, self.new, &new_siblings);
        let mut moved_from: Vec<Option<usize>> = vec![None; old_siblings.len()];
        let mut moved_to: Vec<Option<usize>> = vec![None; new_siblings.len()];
        let mut has_moves = false;

        let (mut oi, mut ni) = (0, 0);
        loop {
            match (old_siblings.get(oi).copied(), new_siblings.get(ni).copied()) {
                (None, None) => break,
                (Some(o), None) => {
                    self.remove_old(o);
                    oi += 1;
                }
                (None, Some(n)) => {
                    self.insert_new(n);
                    ni += 1;
                }
                (Some(o), Some(n)) => match (pairing.old_partner[oi], pairing.new_partner[ni]) {
                    (Some(partner), _) if partner == ni => {
                        self.diff_in_place(o, n);
                        oi += 1;
                        ni += 1;
                    }
                    (Some(partner), Some(_)) => {
                        // The display still holds `o` here. Update it towards its
                        // own partner now and reorder once the range is done.
                        moved_from[oi] = Some(self.sibling_index);
                        moved_to[ni] = Some(self.sibling_index);
                        has_moves = true;
                        self.diff_in_place(o, new_siblings[partner]);
                        oi += 1;
                        ni += 1;
                    }
                    (None, Some(_)) => {
                        self.remove_old(o);
                        oi += 1;
                    }
                    (Some(_), None) => {
                        self.insert_new(n);
                        ni += 1;
                    }
                    (None, None) => {
                        let (old_frame, new_frame) = (&old[o], &self.new[n]);
                        if is_region(old_frame)
                            && is_region(new_frame)
                            && old_frame.sequence == new_frame.sequence
                        {
                            self.diff_in_place(o, n);
                            oi += 1;
                            ni += 1;
                        } else if new_frame.sequence < old_frame.sequence {
                            self.insert_new(n);
                            ni += 1;
                        } else {
                            self.remove_old(o);
                            oi += 1;
                        }
                    }
                },
            }
        }

        if has_moves {
            for (pos, from) in moved_from.iter().enumerate() {
                let Some(from) = *from else {
                    continue;
                };
                let to = pairing.old_partner[pos].and_then(|partner| moved_to[partner]);
                if let Some(to) = to
                    && to != from
                {
                    self.batch
                        .edits
                        .push(RenderTreeEdit::PermutationListEntry { from, to });
                }
            }
            self.batch.edits.push(RenderTreeEdit::PermutationListEnd);
        }
    }

    fn diff_in_place(&mut self, o: usize, n: usize) {
        let old = self.old;
        match &old[o].kind {
            FrameKind::Text(before) => {
                let unchanged =
                    matches!(&self.new[n].kind, FrameKind::Text(after) if after == before);
                if !unchanged {
                    let reference_frame_index = self.push_reference(n);
                    self.batch.edits.push(RenderTreeEdit::UpdateText {
                        sibling_index: self.sibling_index,
                        reference_frame_index,
                    });
                }
                self.sibling_index += 1;
            }
            FrameKind::Markup(before) => {
                let unchanged =
                    matches!(&self.new[n].kind, FrameKind::Markup(after) if after == before);
                if !unchanged {
                    let reference_frame_index = self.push_reference(n);
                    self.batch.edits.push(RenderTreeEdit::UpdateMarkup {
                        sibling_index: self.sibling_index,
                        reference_frame_index,
                    });
                }
                self.sibling_index += 1;
            }
            FrameKind::Element { subtree_length, .. } => {
                let old_end = o + subtree_length;
                let new_end = n + self.new[n].subtree_length();
                let old_children = attribute_run_end(old, o);
                let new_children = attribute_run_end(self.new, n);
                self.diff_attributes(o + 1, old_children, n + 1, new_children);
                if old_children < old_end || new_children < new_end {
                    let parent_index = self.sibling_index;
                    self.batch.edits.push(RenderTreeEdit::StepIn {
                        sibling_index: parent_index,
                    });
                    self.sibling_index = 0;
                    self.diff_range(old_children, old_end, new_children, new_end);
                    if matches!(self.batch.edits.last(), Some(RenderTreeEdit::StepIn { .. })) {
                        self.batch.edits.pop();
                    } else {
                        self.batch.edits.push(RenderTreeEdit::StepOut);
                    }
                    self.sibling_index = parent_index;
                }
                self.sibling_index += 1;
            }
            FrameKind::Region { subtree_length } => {
                let new_end = n + self.new[n].subtree_length();
                self.diff_range(o + 1, o + subtree_length, n + 1, new_end);
            }
            FrameKind::Component { component_id, .. } => {
                self.retain_component(o, n, *component_id);
                self.sibling_index += 1;
            }
            FrameKind::Attribute { .. }
            | FrameKind::ElementReferenceCapture { .. }
            | FrameKind::ComponentReferenceCapture { .. } => {}
        }
    }

    fn retain_component(&mut self, o: usize, n: usize, child: Option<ComponentId>) {
        let Some(child) = child else {
            // The old render never got an id assigned; treat the frame as new.
            self.initialize_subtree(n);
            return;
        };
        if let FrameKind::Component { component_id, .. } = &mut self.new[n].kind {
            *component_id = Some(child);
        }
        if !self.parameters_unchanged(o, n) {
            self.host.update_child_parameters(child, self.new, n);
        }
    }

    fn parameters_unchanged(&self, o: usize, n: usize) -> bool {
        let old = self.old;
        let old_params = &old[o + 1..attribute_run_end(old, o)];
        let new_params = &self.new[n + 1..attribute_run_end(self.new, n)];
        old_params.len() == new_params.len()
            && old_params.iter().zip(new_params).all(|(a, b)| {
                match (&a.kind, &b.kind) {
                    (
                        FrameKind::Attribute {
                            name: a_name,
                            value: a_value,
                            ..
                        },
                        FrameKind::Attribute {
                            name: b_name,
                            value: b_value,
                            ..
                        },
                    ) => a_name == b_name && a_value.definitely_equals(b_value),
                    _ => false,
                }
            })
    }

    fn diff_attributes(
        &mut self,
        old_start: usize,
        old_end: usize,
        new_start: usize,
        new_end: usize,
    ) {
        let old = self.old;
        let aligned = old_end - old_start == new_end - new_start
            && (0..old_end - old_start).all(|k| {
                let (a, b) = (&old[old_start + k], &self.new[new_start + k]);
                a.sequence == b.sequence && attribute_name(a) == attribute_name(b)
            })
            && !has_duplicate_names(&self.new[new_start..new_end]);
        if aligned {
            for k in 0..old_end - old_start {
                self.diff_attribute(Some(old_start + k), new_start + k);
            }
            return;
        }

        // Names decide display state; the last occurrence of a name wins.
        let mut old_by_name: HashMap<Arc<str>, usize> = HashMap::new();
        for o in old_start..old_end {
            if let Some(name) = attribute_name(&old[o]) {
                old_by_name.insert(Arc::clone(name), o);
            }
        }
        let mut new_by_name: HashMap<Arc<str>, usize> = HashMap::new();
        for n in new_start..new_end {
            if let Some(name) = attribute_name(&self.new[n]) {
                new_by_name.insert(Arc::clone(name), n);
            }
        }

        let mut removed: HashSet<Arc<str>> = HashSet::new();
        for o in old_start..old_end {
            let Some(name) = attribute_name(&old[o]) else {
                continue;
            };
            let shadowed = old_by_name.get(name) != Some(&o);
            let gone = !new_by_name.contains_key(name);
            if (shadowed || gone)
                && let Some((_, Some(handler_id))) = attribute_parts(&old[o])
            {
                self.batch.record_disposed_event_handler(handler_id);
            }
            if gone && removed.insert(Arc::clone(name)) {
                self.batch.edits.push(RenderTreeEdit::RemoveAttribute {
                    sibling_index: self.sibling_index,
                    name: Arc::clone(name),
                });
            }
        }

        for n in new_start..new_end {
            let Some(name) = attribute_name(&self.new[n]) else {
                continue;
            };
            if new_by_name.get(name) != Some(&n) {
                continue;
            }
            let previous = old_by_name.get(name).copied();
            self.diff_attribute(previous, n);
        }
    }

    fn diff_attribute(&mut self, o: Option<usize>, n: usize) {
        let old = self.old;
        let (old_value, old_handler) = match o.and_then(|o| attribute_parts(&old[o])) {
            Some((value, handler)) => (Some(value), handler),
            None => (None, None),
        };
        let Some((new_value, _)) = attribute_parts(&self.new[n]) else {
            return;
        };
        if old_value.is_some_and(|value| value.same_value(new_value)) {
            if old_handler.is_some() {
                self.set_event_handler_id(n, old_handler);
            }
            return;
        }

        let callback = new_value.as_handler().cloned();
        let new_handler = callback.map(|callback| self.host.assign_event_handler(&callback));
        if new_handler.is_some() {
            self.set_event_handler_id(n, new_handler);
        }
        if let Some(old_handler) = old_handler {
            self.batch.record_disposed_event_handler(old_handler);
            if let Some(new_handler) = new_handler {
                self.host.track_replaced_event_handler(old_handler, new_handler);
            }
        }
        let reference_frame_index = self.push_reference(n);
        self.batch.edits.push(RenderTreeEdit::SetAttribute {
            sibling_index: self.sibling_index,
            reference_frame_index,
        });
    }

    fn set_event_handler_id(&mut self, n: usize, id: Option<EventHandlerId>) {
        if let FrameKind::Attribute {
            event_handler_id, ..
        } = &mut self.new[n].kind
        {
            *event_handler_id = id;
        }
    }

    fn insert_new(&mut self, n: usize) {
        match &self.new[n].kind {
            FrameKind::Text(_) | FrameKind::Markup(_) => {
                let reference_frame_index = self.push_reference(n);
                self.push_prepend(reference_frame_index);
            }
            FrameKind::Element { .. } | FrameKind::Component { .. } => {
                self.initialize_subtree(n);
                let reference_frame_index = self.copy_subtree(n);
                self.push_prepend(reference_frame_index);
            }
            FrameKind::Region { subtree_length } => {
                let end = n + subtree_length;
                let mut children = Vec::new();
                sibling_indices(self.new, n + 1, end, &mut children);
                for child in children {
                    self.insert_new(child);
                }
            }
            FrameKind::Attribute { .. }
            | FrameKind::ElementReferenceCapture { .. }
            | FrameKind::ComponentReferenceCapture { .. } => {}
        }
    }

    fn push_prepend(&mut self, reference_frame_index: usize) {
        self.batch.edits.push(RenderTreeEdit::PrependFrame {
            sibling_index: self.sibling_index,
            reference_frame_index,
        });
        self.sibling_index += 1;
    }

    fn remove_old(&mut self, o: usize) {
        let old = self.old;
        match &old[o].kind {
            FrameKind::Text(_) | FrameKind::Markup(_) => {
                self.batch.edits.push(RenderTreeEdit::RemoveFrame {
                    sibling_index: self.sibling_index,
                });
            }
            FrameKind::Element { .. } | FrameKind::Component { .. } => {
                self.dispose_subtree(o);
                self.batch.edits.push(RenderTreeEdit::RemoveFrame {
                    sibling_index: self.sibling_index,
                });
            }
            FrameKind::Region { subtree_length } => {
                let mut children = Vec::new();
                sibling_indices(old, o + 1, o + subtree_length, &mut children);
                for child in children {
                    self.remove_old(child);
                }
            }
            FrameKind::Attribute { .. }
            | FrameKind::ElementReferenceCapture { .. }
            | FrameKind::ComponentReferenceCapture { .. } => {}
        }
    }

    /// Queues disposal of every component and event handler in an old subtree.
    fn dispose_subtree(&mut self, o: usize) {
        let old = self.old;
        for frame in &old[o..o + old[o].subtree_length()] {
            match &frame.kind {
                FrameKind::Component {
                    component_id: Some(id),
                    ..
                } => self.batch.enqueue_disposal(*id),
                FrameKind::Attribute {
                    event_handler_id: Some(id),
                    ..
                } => self.batch.record_disposed_event_handler(*id),
                _ => {}
            }
        }
    }

    /// Instantiates children, assigns handler ids and fires captures for a
    /// subtree that is about to be inserted.
    fn initialize_subtree(&mut self, n: usize) {
        let end = n + self.new[n].subtree_length();
        let mut attributes_belong_to_element = false;
        let mut last_component = None;
        for i in n..end {
            let step = match &self.new[i].kind {
                FrameKind::Element { .. } => InitStep::Element,
                FrameKind::Component { component_id, .. } => InitStep::Component(*component_id),
                FrameKind::Attribute {
                    value: AttributeValue::Handler(callback),
                    ..
                } => InitStep::Handler(callback.clone()),
                FrameKind::Attribute { .. } => InitStep::Attribute,
                FrameKind::ElementReferenceCapture { .. } => InitStep::ElementCapture,
                FrameKind::ComponentReferenceCapture { callback } => {
                    InitStep::ComponentCapture(callback.clone())
                }
                FrameKind::Text(_) | FrameKind::Markup(_) | FrameKind::Region { .. } => {
                    InitStep::Leaf
                }
            };
            match step {
                InitStep::Element => attributes_belong_to_element = true,
                InitStep::Component(existing) => {
                    attributes_belong_to_element = false;
                    let id = match existing {
                        Some(id) => id,
                        None => {
                            let id = self.host.instantiate_child(self.component_id, self.new, i);
                            if let FrameKind::Component { component_id, .. } =
                                &mut self.new[i].kind
                            {
                                *component_id = Some(id);
                            }
                            id
                        }
                    };
                    last_component = Some(id);
                }
                InitStep::Handler(callback) => {
                    // Component parameters carry callbacks as plain values.
                    if attributes_belong_to_element {
                        let id = self.host.assign_event_handler(&callback);
                        self.set_event_handler_id(i, Some(id));
                    }
                }
                InitStep::Attribute => {}
                InitStep::ElementCapture => {
                    attributes_belong_to_element = false;
                    self.initialize_element_capture(i);
                }
                InitStep::ComponentCapture(callback) => {
                    attributes_belong_to_element = false;
                    if let Some(id) = last_component {
                        callback.invoke(id);
                    }
                }
                InitStep::Leaf => attributes_belong_to_element = false,
            }
        }
    }

    fn initialize_element_capture(&mut self, n: usize) {
        let id = self.host.assign_element_reference();
        if let FrameKind::ElementReferenceCapture {
            callback,
            reference_id,
        } = &mut self.new[n].kind
        {
            *reference_id = Some(id);
            callback.invoke(id);
        }
    }

    /// Element reference captures keep their id across renders when an old
    /// capture with the same sequence exists at the same level.
    fn sync_captures(
        &mut self,
        old_start: usize,
        old_end: usize,
        new_start: usize,
        new_end: usize,
    ) {
        let old = self.old;
        let mut cursor = new_start;
        while cursor < new_end {
            let step = self.new[cursor].subtree_length().max(1);
            if matches!(self.new[cursor].kind, FrameKind::ElementReferenceCapture { .. }) {
                let sequence = self.new[cursor].sequence;
                let mut retained = None;
                let mut o = old_start;
                while o < old_end && retained.is_none() {
                    if let FrameKind::ElementReferenceCapture { reference_id, .. } = &old[o].kind
                        && old[o].sequence == sequence
                    {
                        retained = *reference_id;
                    }
                    o += old[o].subtree_length().max(1);
                }
                match retained {
                    Some(id) => {
                        if let FrameKind::ElementReferenceCapture { reference_id, .. } =
                            &mut self.new[cursor].kind
                        {
                            *reference_id = Some(id);
                        }
                    }
                    None => self.initialize_element_capture(cursor),
                }
            }
            cursor += step;
        }
    }

    fn push_reference(&mut self, n: usize) -> usize {
        let index = self.batch.reference_frames.len();
        self.batch.reference_frames.push(self.new[n].clone());
        index
    }

    fn copy_subtree(&mut self, n: usize) -> usize {
        let index = self.batch.reference_frames.len();
        let end = n + self.new[n].subtree_length();
        self.batch
            .reference_frames
            .extend_from_slice(&self.new[n..end]);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CaptureCallback, ComponentType};
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Child;

    fn child_type() -> ComponentType {
        ComponentType::new(TypeId::of::<Child>(), "Child", || Box::new(Child))
    }

    #[derive(Default)]
    struct RecordingHost {
        next_component: u32,
        next_handler: u64,
        instantiated: Vec<ComponentId>,
        updated: Vec<ComponentId>,
        replaced: Vec<(EventHandlerId, EventHandlerId)>,
    }

    impl DiffHost for RecordingHost {
        fn instantiate_child(
            &mut self,
            _parent: ComponentId,
            _frames: &[Frame],
            _index: usize,
        ) -> ComponentId {
            self.next_component += 1;
            let id = ComponentId(100 + self.next_component);
            self.instantiated.push(id);
            id
        }

        fn update_child_parameters(
            &mut self,
            child: ComponentId,
            _frames: &[Frame],
            _index: usize,
        ) {
            self.updated.push(child);
        }

        fn assign_event_handler(&mut self, _callback: &EventCallback) -> EventHandlerId {
            self.next_handler += 1;
            EventHandlerId(self.next_handler)
        }

        fn track_replaced_event_handler(&mut self, old: EventHandlerId, new: EventHandlerId) {
            self.replaced.push((old, new));
        }

        fn assign_element_reference(&mut self) -> ElementReferenceId {
            ElementReferenceId(7)
        }
    }

    const OWNER: ComponentId = ComponentId(1);

    fn diff(
        host: &mut RecordingHost,
        old: &[Frame],
        new: &mut [Frame]) -> (RenderBatchBuilder, Vec<RenderTreeEdit>,
    ) {
        let mut batch = RenderBatchBuilder::new();
        let edits = match compute_diff(host, &mut batch, OWNER, old, new) {
            Some(diff) => batch.batch().edits_for(&diff).to_vec(),
            None => Vec::new(),
        };
        (batch, edits)
    }

    /// Runs a first render so that old frames carry assigned ids.
    fn rendered(host: &mut RecordingHost, mut frames: Vec<Frame>) -> Vec<Frame> {
        let _ = diff(host, &[], &mut frames);
        frames
    }

    #[test]
    fn identical_sequences_produce_no_diff() {
        let mut host = RecordingHost::default();
        let frames = vec![
            Frame::element(0, "div", 4),
            Frame::attribute(1, "class", "box"),
            Frame::text(2, "hello"),
            Frame::markup(3, "<b>hi</b>"),
        ];
        let mut batch = RenderBatchBuilder::new();
        let mut copy = frames.clone();
        assert!(compute_diff(&mut host, &mut batch, OWNER, &frames, &mut copy).is_none());
        assert!(batch.batch().reference_frames().is_empty());
    }

    #[test]
    fn changed_text_at_same_sequence_is_updated_in_place() {
        let mut host = RecordingHost::default();
        let old = vec![Frame::text(0, "a"), Frame::text(1, "b")];
        let mut new = vec![Frame::text(0, "a"), Frame::text(1, "c")];
        let (batch, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![RenderTreeEdit::UpdateText {
                sibling_index: 1,
                reference_frame_index: 0
            }]
        );
        assert!(matches!(
            &batch.batch().reference_frames()[0].kind,
            FrameKind::Text(text) if &**text == "c"
        ));
    }

    #[test]
    fn tag_change_at_same_sequence_is_remove_then_insert() {
        let mut host = RecordingHost::default();
        let old = vec![Frame::element(0, "div", 2), Frame::attribute(1, "id", "x")];
        let mut new = vec![Frame::element(0, "span", 2), Frame::attribute(1, "id", "x")];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::RemoveFrame { sibling_index: 0 },
                RenderTreeEdit::PrependFrame {
                    sibling_index: 0,
                    reference_frame_index: 0
                },
            ]
        );
    }

    #[test]
    fn swapped_siblings_become_a_permutation() {
        let mut host = RecordingHost::default();
        let old = vec![
            Frame::element(0, "li", 2),
            Frame::text(1, "zero"),
            Frame::element(2, "li", 2),
            Frame::text(3, "two"),
        ];
        let mut new = vec![
            Frame::element(2, "li", 2),
            Frame::text(3, "two"),
            Frame::element(0, "li", 2),
            Frame::text(1, "zero"),
        ];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::PermutationListEntry { from: 0, to: 1 },
                RenderTreeEdit::PermutationListEntry { from: 1, to: 0 },
                RenderTreeEdit::PermutationListEnd,
            ]
        );
    }

    #[test]
    fn duplicate_identities_pair_first_match_in_scan_order() {
        let mut host = RecordingHost::default();
        // Two old texts share sequence 0; the first old pairs with the first new.
        let old = vec![Frame::text(0, "a"), Frame::text(0, "b")];
        let mut new = vec![Frame::text(0, "a"), Frame::text(0, "b"), Frame::text(0, "c")];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![RenderTreeEdit::PrependFrame {
                sibling_index: 2,
                reference_frame_index: 0
            }]
        );
    }

    #[test]
    fn insertion_before_existing_sibling_keeps_it() {
        let mut host = RecordingHost::default();
        let old = vec![Frame::text(5, "kept")];
        let mut new = vec![Frame::text(1, "new"), Frame::text(5, "kept")];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![RenderTreeEdit::PrependFrame {
                sibling_index: 0,
                reference_frame_index: 0
            }]
        );
    }

    #[test]
    fn nested_changes_step_in_and_out() {
        let mut host = RecordingHost::default();
        let old = vec![
            Frame::element(0, "div", 3),
            Frame::element(1, "p", 2),
            Frame::text(2, "old"),
            Frame::element(3, "p", 2),
            Frame::text(4, "same"),
        ];
        let mut new = vec![
            Frame::element(0, "div", 3),
            Frame::element(1, "p", 2),
            Frame::text(2, "new"),
            Frame::element(3, "p", 2),
            Frame::text(4, "same"),
        ];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::StepIn { sibling_index: 0 },
                RenderTreeEdit::StepIn { sibling_index: 0 },
                RenderTreeEdit::UpdateText {
                    sibling_index: 0,
                    reference_frame_index: 0
                },
                RenderTreeEdit::StepOut,
                RenderTreeEdit::StepOut,
            ]
        );
    }

    #[test]
    fn attribute_changes_are_set_and_removed_by_name() {
        let mut host = RecordingHost::default();
        let old = vec![
            Frame::element(0, "div", 3),
            Frame::attribute(1, "id", "a"),
            Frame::attribute(2, "title", "t"),
        ];
        let mut new = vec![
            Frame::element(0, "div", 3),
            Frame::attribute(1, "id", "b"),
            Frame::attribute(3, "class", "c"),
        ];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::RemoveAttribute {
                    sibling_index: 0,
                    name: Arc::from("title")
                },
                RenderTreeEdit::SetAttribute {
                    sibling_index: 0,
                    reference_frame_index: 0
                },
                RenderTreeEdit::SetAttribute {
                    sibling_index: 0,
                    reference_frame_index: 1
                },
            ]
        );
    }

    #[test]
    fn component_frames_are_not_recursed() {
        let mut host = RecordingHost::default();
        let old = rendered(
            &mut host,
            vec![
                Frame::component(0, child_type(), 2),
                Frame::attribute(0, "label", "one"),
            ],
        );
        let child = old[0].component_id().expect("assigned");
        let mut new = vec![
            Frame::component(0, child_type(), 2),
            Frame::attribute(0, "label", "two"),
        ];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert!(edits.is_empty());
        assert_eq!(new[0].component_id(), Some(child));
        assert_eq!(host.updated, vec![child]);
    }

    #[test]
    fn unchanged_parameters_skip_the_child() {
        let mut host = RecordingHost::default();
        let old = rendered(
            &mut host,
            vec![
                Frame::component(0, child_type(), 2),
                Frame::attribute(0, "count", 3),
            ],
        );
        let mut new = vec![
            Frame::component(0, child_type(), 2),
            Frame::attribute(0, "count", 3),
        ];
        let _ = diff(&mut host, &old, &mut new);
        assert!(host.updated.is_empty());
    }

    #[test]
    fn removed_component_is_queued_for_disposal() {
        let mut host = RecordingHost::default();
        let old = rendered(
            &mut host,
            vec![Frame::element(0, "div", 2), Frame::component(1, child_type(), 1)],
        );
        let child = old[1].component_id().expect("assigned");
        let mut new = vec![Frame::element(0, "div", 1)];
        let (mut batch, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::StepIn { sibling_index: 0 },
                RenderTreeEdit::RemoveFrame { sibling_index: 0 },
                RenderTreeEdit::StepOut,
            ]
        );
        assert_eq!(batch.next_disposal(), Some(child));
    }

    #[test]
    fn handler_ids_are_retained_or_replaced() {
        let mut host = RecordingHost::default();
        let delegate: crate::frame::EventDelegate = Rc::new(());
        let callback = EventCallback::new(Rc::clone(&delegate)).with_receiver(OWNER);
        let old = rendered(
            &mut host,
            vec![
                Frame::element(0, "button", 2),
                Frame::attribute(1, "onclick", callback.clone()),
            ],
        );
        let FrameKind::Attribute {
            event_handler_id: Some(first),
            ..
        } = old[1].kind
        else {
            panic!("handler id assigned on insert");
        };

        let mut same = vec![
            Frame::element(0, "button", 2),
            Frame::attribute(1, "onclick", callback),
        ];
        let (_, edits) = diff(&mut host, &old, &mut same);
        assert!(edits.is_empty());
        assert!(matches!(
            same[1].kind,
            FrameKind::Attribute { event_handler_id: Some(id), .. } if id == first
        ));

        let replacement = EventCallback::new(Rc::new(())).with_receiver(OWNER);
        let mut changed = vec![
            Frame::element(0, "button", 2),
            Frame::attribute(1, "onclick", replacement),
        ];
        let (batch, edits) = diff(&mut host, &old, &mut changed);
        assert_eq!(edits.len(), 1);
        assert_eq!(batch.disposed_event_handler_ids(), &[first]);
        assert_eq!(host.replaced.len(), 1);
        assert_eq!(host.replaced[0].0, first);
    }

    #[test]
    fn element_capture_fires_once_and_keeps_its_id() {
        let mut host = RecordingHost::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let capture = CaptureCallback::new(move |id| sink.borrow_mut().push(id));
        let frames = |capture: &CaptureCallback<ElementReferenceId>| {
            vec![
                Frame::element(0, "input", 2),
                Frame {
                    sequence: 1,
                    kind: FrameKind::ElementReferenceCapture {
                        callback: capture.clone(),
                        reference_id: None,
                    },
                },
            ]
        };
        let old = rendered(&mut host, frames(&capture));
        let mut new = frames(&capture);
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert!(edits.is_empty());
        assert_eq!(*seen.borrow(), vec![ElementReferenceId(7)]);
        assert!(matches!(
            new[1].kind,
            FrameKind::ElementReferenceCapture {
                reference_id: Some(ElementReferenceId(7)),
                ..
            }
        ));
    }

    fn keyed_items(keys: &[&str]) -> Vec<Frame> {
        keys.iter()
            .flat_map(|key| {
                [
                    Frame::component(0, child_type(), 2).with_key(key),
                    Frame::attribute(1, "label", *key),
                ]
            })
            .collect()
    }

    #[test]
    fn keyed_components_follow_their_key_across_a_reorder() {
        let mut host = RecordingHost::default();
        let old = rendered(&mut host, keyed_items(&["a", "b", "c"]));
        let ids: Vec<_> = old.iter().filter_map(Frame::component_id).collect();
        let mut new = keyed_items(&["c", "a", "b"]);
        let (_, edits) = diff(&mut host, &old, &mut new);

        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::PermutationListEntry { from: 0, to: 1 },
                RenderTreeEdit::PermutationListEntry { from: 1, to: 2 },
                RenderTreeEdit::PermutationListEntry { from: 2, to: 0 },
                RenderTreeEdit::PermutationListEnd,
            ]
        );
        let moved: Vec<_> = new.iter().filter_map(Frame::component_id).collect();
        assert_eq!(moved, vec![ids[2], ids[0], ids[1]]);
        assert_eq!(host.instantiated.len(), 3);
        assert!(host.updated.is_empty());
    }

    #[test]
    fn without_keys_the_same_reorder_rewrites_parameters() {
        let mut host = RecordingHost::default();
        let unkeyed = |labels: &[&str]| -> Vec<Frame> {
            labels
                .iter()
                .flat_map(|label| {
                    [
                        Frame::component(0, child_type(), 2),
                        Frame::attribute(1, "label", *label),
                    ]
                })
                .collect()
        };
        let old = rendered(&mut host, unkeyed(&["a", "b"]));
        let ids: Vec<_> = old.iter().filter_map(Frame::component_id).collect();
        let mut new = unkeyed(&["b", "a"]);
        let (_, edits) = diff(&mut host, &old, &mut new);

        assert!(edits.is_empty());
        assert_eq!(host.updated, ids);
    }

    #[test]
    fn removed_key_disposes_only_its_component() {
        let mut host = RecordingHost::default();
        let old = rendered(&mut host, keyed_items(&["a", "b", "c"]));
        let ids: Vec<_> = old.iter().filter_map(Frame::component_id).collect();
        let mut new = keyed_items(&["a", "c"]);
        let (mut batch, edits) = diff(&mut host, &old, &mut new);

        assert_eq!(edits, vec![RenderTreeEdit::RemoveFrame { sibling_index: 1 }]);
        assert_eq!(batch.next_disposal(), Some(ids[1]));
        assert_eq!(batch.next_disposal(), None);
        let kept: Vec<_> = new.iter().filter_map(Frame::component_id).collect();
        assert_eq!(kept, vec![ids[0], ids[2]]);
    }

    #[test]
    fn keyed_and_unkeyed_frames_never_match() {
        let mut host = RecordingHost::default();
        let old = vec![Frame::element(0, "li", 1).with_key("a")];
        let mut new = vec![Frame::element(0, "li", 1)];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::RemoveFrame { sibling_index: 0 },
                RenderTreeEdit::PrependFrame {
                    sibling_index: 0,
                    reference_frame_index: 0
                },
            ]
        );
    }

    #[test]
    fn region_children_share_the_parent_sibling_space() {
        let mut host = RecordingHost::default();
        let old = vec![
            Frame::text(0, "before"),
            Frame::region(1, 2),
            Frame::text(2, "inside"),
            Frame::text(3, "after"),
        ];
        let mut new = vec![
            Frame::text(0, "before"),
            Frame::region(1, 3),
            Frame::text(2, "inside"),
            Frame::text(3, "added"),
            Frame::text(4, "after"),
        ];
        let (_, edits) = diff(&mut host, &old, &mut new);
        assert_eq!(
            edits,
            vec![
                RenderTreeEdit::PrependFrame {
                    sibling_index: 2,
                    reference_frame_index: 0
                },
                RenderTreeEdit::RemoveFrame { sibling_index: 3 },
                RenderTreeEdit::PrependFrame {
                    sibling_index: 3,
                    reference_frame_index: 1
                },
            ]
        );
    }
}
