use crate::frame::{Frame, FrameKind, attribute_run_end};
use crate::pool::FramePool;

/// The closed output of one render pass of one component.
///
/// Owns its buffer exclusively. It moves from the builder into the component
/// state and back to the pool once retired; it is never cloned implicitly.
#[derive(Debug, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_frames(frames: Vec<Frame>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn into_buffer(self) -> Vec<Frame> {
        self.frames
    }

    /// Hands the backing buffer to `pool`.
    pub fn release(self, pool: &mut FramePool) {
        pool.give_back(self.frames);
    }

    /// Inserts `attribute` at the end of the attribute run of the scope at
    /// `scope_index`, growing that scope and every enclosing scope by one.
    pub fn insert_attribute(&mut self, scope_index: usize, attribute: Frame) {
        let at = attribute_run_end(&self.frames, scope_index);
        for k in 0..=scope_index {
            let encloses = k == scope_index || k + self.frames[k].subtree_length() > scope_index;
            if !encloses {
                continue;
            }
            if let FrameKind::Element { subtree_length, .. }
            | FrameKind::Component { subtree_length, .. }
            | FrameKind::Region { subtree_length } = &mut self.frames[k].kind
            {
                *subtree_length += 1;
            }
        }
        self.frames.insert(at, attribute);
    }

    /// Explicit deep copy, used by tests and debugging tools.
    pub fn duplicate(&self) -> Self {
        Self {
            frames: self.frames.clone(),
        }
    }
}
