//! Reference display: replays render batches onto an arena tree.
//!
//! Every component owns a container node. Root components get a detached
//! container via `attach_root`; child components get the placeholder node
//! created when their `Component` frame is prepended. Edits for a component
//! are applied relative to its container's children.

use crate::snapshot::{component_line, element_line, format_value, markup_line, text_line};
use core_types::{ComponentId, EventHandlerId};
use render_tree::frame::attribute_run_end;
use render_tree::{Frame, FrameKind, RenderBatch, RenderTreeEdit};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DisplayError {
    #[error("no display container for {0}")]
    UnknownComponent(ComponentId),
    #[error("{0} already has a display container")]
    DuplicateComponent(ComponentId),
    #[error("sibling index {index} out of range ({len} children)")]
    SiblingOutOfRange { index: usize, len: usize },
    #[error("reference frame {0} out of range")]
    MissingReferenceFrame(usize),
    #[error("reference frame {0} cannot be displayed")]
    UndisplayableFrame(usize),
    #[error("{edit} applied to a {found} node")]
    WrongNodeKind { edit: &'static str, found: &'static str },
    #[error("step out past the component container")]
    StepOutOfContainer,
    #[error("permutation entries do not form a permutation")]
    InvalidPermutation,
    #[error("edit script ended inside a permutation list")]
    UnterminatedPermutation,
}

type NodeIndex = usize;

#[derive(Clone, Debug)]
struct DisplayAttribute {
    name: Arc<str>,
    value: String,
    handler: Option<EventHandlerId>,
}

#[derive(Clone, Debug)]
enum NodeKind {
    Container,
    Element {
        name: Arc<str>,
        attributes: Vec<DisplayAttribute>,
    },
    Text(Arc<str>),
    Markup(Arc<str>),
    Component {
        type_name: &'static str,
        id: Option<ComponentId>,
    },
}

impl NodeKind {
    fn label(&self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::Element { .. } => "element",
            NodeKind::Text(_) => "text",
            NodeKind::Markup(_) => "markup",
            NodeKind::Component { .. } => "component",
        }
    }
}

#[derive(Clone, Debug)]
struct DisplayNode {
    kind: NodeKind,
    children: Vec<NodeIndex>,
}

#[derive(Debug, Default)]
pub struct DisplayTree {
    nodes: Vec<DisplayNode>,
    containers: HashMap<ComponentId, NodeIndex>,
    disposed: Vec<ComponentId>,
    released_handlers: HashSet<EventHandlerId>,
    applied_batches: usize,
}

impl DisplayTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach_root(&mut self, component_id: ComponentId) -> Result<(), DisplayError> {
        if self.containers.contains_key(&component_id) {
            return Err(DisplayError::DuplicateComponent(component_id));
        }
        let node = self.push_node(NodeKind::Container);
        self.containers.insert(component_id, node);
        Ok(())
    }

    pub fn apply(&mut self, batch: &RenderBatch<'_>) -> Result<(), DisplayError> {
        let frames = batch.reference_frames();
        for diff in batch.updated_components() {
            let container = *self
                .containers
                .get(&diff.component_id)
                .ok_or(DisplayError::UnknownComponent(diff.component_id))?;
            self.apply_edits(container, batch.edits_for(diff), frames)?;
        }
        for id in batch.disposed_component_ids() {
            self.containers.remove(id);
            self.disposed.push(*id);
        }
        self.released_handlers
            .extend(batch.disposed_event_handler_ids().iter().copied());
        self.applied_batches += 1;
        Ok(())
    }

    pub fn applied_batches(&self) -> usize {
        self.applied_batches
    }

    pub fn disposed_components(&self) -> &[ComponentId] {
        &self.disposed
    }

    pub fn handler_released(&self, id: EventHandlerId) -> bool {
        self.released_handlers.contains(&id)
    }

    pub fn has_container(&self, component_id: ComponentId) -> bool {
        self.containers.contains_key(&component_id)
    }

    /// Snapshot of a component's output with child components expanded.
    pub fn snapshot(&self, component_id: ComponentId) -> Result<Vec<String>, DisplayError> {
        let container = *self
            .containers
            .get(&component_id)
            .ok_or(DisplayError::UnknownComponent(component_id))?;
        let mut lines = Vec::new();
        for &child in &self.nodes[container].children {
            self.walk_snapshot(child, 0, &mut lines);
        }
        Ok(lines)
    }

    /// Handler ids bound to `attribute` on elements named `element`, in
    /// document order under `root`.
    pub fn event_handlers(
        &self,
        root: ComponentId,
        element: &str,
        attribute: &str,
    ) -> Result<Vec<EventHandlerId>, DisplayError> {
        let container = *self
            .containers
            .get(&root)
            .ok_or(DisplayError::UnknownComponent(root))?;
        let mut found = Vec::new();
        let mut stack: Vec<NodeIndex> =
            self.nodes[container].children.iter().rev().copied().collect();
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if let NodeKind::Element { name, attributes } = &node.kind
                && &**name == element
            {
                found.extend(
                    attributes
                        .iter()
                        .filter(|attr| &*attr.name == attribute)
                        .filter_map(|attr| attr.handler),
                );
            }
            stack.extend(node.children.iter().rev().copied());
        }
        Ok(found)
    }

    fn walk_snapshot(&self, index: NodeIndex, depth: usize, lines: &mut Vec<String>) {
        let node = &self.nodes[index];
        match &node.kind {
            NodeKind::Container => {}
            NodeKind::Element { name, attributes } => {
                lines.push(element_line(
                    depth,
                    name,
                    attributes.iter().map(|attr| (&*attr.name, attr.value.clone())),
                ));
            }
            NodeKind::Text(text) => lines.push(text_line(depth, text)),
            NodeKind::Markup(markup) => lines.push(markup_line(depth, markup)),
            NodeKind::Component { type_name, .. } => lines.push(component_line(depth, type_name)),
        }
        for &child in &node.children {
            self.walk_snapshot(child, depth + 1, lines);
        }
    }

    fn apply_edits(
        &mut self,
        container: NodeIndex,
        edits: &[RenderTreeEdit],
        frames: &[Frame],
    ) -> Result<(), DisplayError> {
        let mut parents = vec![container];
        let mut permutation: Vec<(usize, usize)> = Vec::new();
        for edit in edits {
            let parent = parents[parents.len() - 1];
            match edit {
                RenderTreeEdit::PrependFrame {
                    sibling_index,
                    reference_frame_index,
                } => {
                    let len = self.nodes[parent].children.len();
                    if *sibling_index > len {
                        return Err(DisplayError::SiblingOutOfRange {
                            index: *sibling_index,
                            len,
                        });
                    }
                    let node = self.build_subtree(frames, *reference_frame_index)?;
                    self.nodes[parent].children.insert(*sibling_index, node);
                }
                RenderTreeEdit::RemoveFrame { sibling_index } => {
                    let child = self.child_at(parent, *sibling_index)?;
                    self.nodes[parent].children.remove(*sibling_index);
                    self.release_subtree(child);
                }
                RenderTreeEdit::SetAttribute {
                    sibling_index,
                    reference_frame_index,
                } => {
                    let child = self.child_at(parent, *sibling_index)?;
                    let attribute = attribute_from_frame(frames, *reference_frame_index)?;
                    set_attribute(self.attributes_mut(child, "set-attribute")?, attribute);
                }
                RenderTreeEdit::RemoveAttribute {
                    sibling_index,
                    name,
                } => {
                    let child = self.child_at(parent, *sibling_index)?;
                    let attributes = self.attributes_mut(child, "remove-attribute")?;
                    attributes.retain(|attr| attr.name != *name);
                }
                RenderTreeEdit::UpdateText {
                    sibling_index,
                    reference_frame_index,
                } => {
                    let child = self.child_at(parent, *sibling_index)?;
                    let FrameKind::Text(text) = &reference(frames, *reference_frame_index)?.kind
                    else {
                        return Err(DisplayError::UndisplayableFrame(*reference_frame_index));
                    };
                    let found = self.nodes[child].kind.label();
                    let NodeKind::Text(existing) = &mut self.nodes[child].kind else {
                        return Err(DisplayError::WrongNodeKind {
                            edit: "update-text",
                            found,
                        });
                    };
                    *existing = Arc::clone(text);
                }
                RenderTreeEdit::UpdateMarkup {
                    sibling_index,
                    reference_frame_index,
                } => {
                    let child = self.child_at(parent, *sibling_index)?;
                    let FrameKind::Markup(markup) =
                        &reference(frames, *reference_frame_index)?.kind
                    else {
                        return Err(DisplayError::UndisplayableFrame(*reference_frame_index));
                    };
                    let found = self.nodes[child].kind.label();
                    let NodeKind::Markup(existing) = &mut self.nodes[child].kind else {
                        return Err(DisplayError::WrongNodeKind {
                            edit: "update-markup",
                            found,
                        });
                    };
                    *existing = Arc::clone(markup);
                }
                RenderTreeEdit::StepIn { sibling_index } => {
                    let child = self.child_at(parent, *sibling_index)?;
                    parents.push(child);
                }
                RenderTreeEdit::StepOut => {
                    if parents.len() == 1 {
                        return Err(DisplayError::StepOutOfContainer);
                    }
                    parents.pop();
                }
                RenderTreeEdit::PermutationListEntry { from, to } => permutation.push((*from, *to)),
                RenderTreeEdit::PermutationListEnd => {
                    self.permute(parent, &permutation)?;
                    permutation.clear();
                }
            }
        }
        if !permutation.is_empty() {
            return Err(DisplayError::UnterminatedPermutation);
        }
        Ok(())
    }

    fn permute(
        &mut self,
        parent: NodeIndex,
        entries: &[(usize, usize)],
    ) -> Result<(), DisplayError> {
        let children = &mut self.nodes[parent].children;
        let mut froms: Vec<usize> = entries.iter().map(|(from, _)| *from).collect();
        let mut tos: Vec<usize> = entries.iter().map(|(_, to)| *to).collect();
        froms.sort_unstable();
        tos.sort_unstable();
        let in_range = froms.last().is_none_or(|&max| max < children.len());
        if froms != tos || !in_range || froms.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(DisplayError::InvalidPermutation);
        }
        let moved: Vec<NodeIndex> = entries.iter().map(|(from, _)| children[*from]).collect();
        for ((_, to), node) in entries.iter().zip(moved) {
            children[*to] = node;
        }
        Ok(())
    }

    fn child_at(&self, parent: NodeIndex, sibling_index: usize) -> Result<NodeIndex, DisplayError> {
        let children = &self.nodes[parent].children;
        children
            .get(sibling_index)
            .copied()
            .ok_or(DisplayError::SiblingOutOfRange {
                index: sibling_index,
                len: children.len(),
            })
    }

    fn attributes_mut(
        &mut self,
        node: NodeIndex,
        edit: &'static str,
    ) -> Result<&mut Vec<DisplayAttribute>, DisplayError> {
        let found = self.nodes[node].kind.label();
        match &mut self.nodes[node].kind {
            NodeKind::Element { attributes, .. } => Ok(attributes),
            _ => Err(DisplayError::WrongNodeKind { edit, found }),
        }
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeIndex {
        self.nodes.push(DisplayNode {
            kind,
            children: Vec::new(),
        });
        self.nodes.len() - 1
    }

    fn build_subtree(&mut self, frames: &[Frame], index: usize) -> Result<NodeIndex, DisplayError> {
        let frame = reference(frames, index)?;
        let end = index + frame.subtree_length();
        if end > frames.len() {
            return Err(DisplayError::MissingReferenceFrame(end - 1));
        }
        match &frame.kind {
            FrameKind::Element { name, .. } => {
                let children_start = attribute_run_end(frames, index);
                let mut attributes = Vec::new();
                for attr in index + 1..children_start {
                    set_attribute(&mut attributes, attribute_from_frame(frames, attr)?);
                }
                let node = self.push_node(NodeKind::Element {
                    name: Arc::clone(name),
                    attributes,
                });
                self.append_children(frames, children_start, end, node)?;
                Ok(node)
            }
            FrameKind::Text(text) => Ok(self.push_node(NodeKind::Text(Arc::clone(text)))),
            FrameKind::Markup(markup) => Ok(self.push_node(NodeKind::Markup(Arc::clone(markup)))),
            FrameKind::Component {
                component_type,
                component_id,
                ..
            } => {
                let node = self.push_node(NodeKind::Component {
                    type_name: component_type.name(),
                    id: *component_id,
                });
                if let Some(id) = component_id {
                    if self.containers.contains_key(id) {
                        return Err(DisplayError::DuplicateComponent(*id));
                    }
                    self.containers.insert(*id, node);
                }
                Ok(node)
            }
            FrameKind::Region { .. }
            | FrameKind::Attribute { .. }
            | FrameKind::ElementReferenceCapture { .. }
            | FrameKind::ComponentReferenceCapture { .. } => {
                Err(DisplayError::UndisplayableFrame(index))
            }
        }
    }

    fn append_children(
        &mut self,
        frames: &[Frame],
        start: usize,
        end: usize,
        parent: NodeIndex,
    ) -> Result<(), DisplayError> {
        let mut cursor = start;
        while cursor < end {
            let frame = reference(frames, cursor)?;
            let length = frame.subtree_length().max(1);
            match &frame.kind {
                FrameKind::Region { .. } => {
                    self.append_children(frames, cursor + 1, cursor + length, parent)?
                }
                FrameKind::ElementReferenceCapture { .. }
                | FrameKind::ComponentReferenceCapture { .. } => {}
                _ => {
                    let child = self.build_subtree(frames, cursor)?;
                    self.nodes[parent].children.push(child);
                }
            }
            cursor += length;
        }
        Ok(())
    }

    /// Drops container registrations for components inside a removed subtree.
    fn release_subtree(&mut self, node: NodeIndex) {
        let mut stack = vec![node];
        while let Some(index) = stack.pop() {
            if let NodeKind::Component { id: Some(id), .. } = &self.nodes[index].kind
                && self.containers.get(id) == Some(&index)
            {
                self.containers.remove(id);
            }
            stack.extend(self.nodes[index].children.iter().copied());
        }
    }
}

fn reference(frames: &[Frame], index: usize) -> Result<&Frame, DisplayError> {
    frames
        .get(index)
        .ok_or(DisplayError::MissingReferenceFrame(index))
}

/// Overwrites an attribute of the same name, like a real element would.
fn set_attribute(attributes: &mut Vec<DisplayAttribute>, attribute: DisplayAttribute) {
    match attributes.iter_mut().find(|attr| attr.name == attribute.name) {
        Some(existing) => *existing = attribute,
        None => attributes.push(attribute),
    }
}

fn attribute_from_frame(frames: &[Frame], index: usize) -> Result<DisplayAttribute, DisplayError> {
    match &reference(frames, index)?.kind {
        FrameKind::Attribute {
            name,
            value,
            event_handler_id,
        } => Ok(DisplayAttribute {
            name: Arc::clone(name),
            value: format_value(value),
            handler: *event_handler_id,
        }),
        _ => Err(DisplayError::UndisplayableFrame(index)),
    }
}
