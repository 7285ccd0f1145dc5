//! Frame model, tree builder and differ for component render output.

pub mod batch;
pub mod builder;
pub mod debug;
pub mod diff;
pub mod edit;
pub mod frame;
pub mod pool;
pub mod sequence;

pub use batch::{RenderBatch, RenderBatchBuilder, RenderTreeDiff};
pub use builder::{MalformedKind, MalformedTree, RenderTreeBuilder, ScopeKind};
pub use diff::{DiffHost, compute_diff};
pub use edit::RenderTreeEdit;
pub use frame::{
    AttributeValue, CaptureCallback, ComponentFactory, ComponentReferenceCallback, ComponentType,
    ElementReferenceCallback, EventCallback, EventDelegate, Frame, FrameKind,
};
pub use pool::{FramePool, PoolConfig, PoolStats};
pub use sequence::FrameSequence;
