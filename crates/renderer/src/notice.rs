//! Messages delivered to the renderer from outside a turn: render requests
//! from component handles (any thread) and completions of spawned tasks.

use crate::error::{ComponentError, DisplayError};
use core_types::{ComponentId, EventHandlerId};
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender};

pub(crate) type NoticeSender = UnboundedSender<Notice>;
pub(crate) type NoticeReceiver = UnboundedReceiver<Notice>;

/// Decides whether completion of a pending task re-renders its component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum TaskKind {
    Parameters,
    Event,
    /// After-render hooks and handlers without a receiver.
    Detached,
}

impl TaskKind {
    pub(crate) fn renders_on_completion(self) -> bool {
        matches!(self, TaskKind::Parameters | TaskKind::Event)
    }
}

#[derive(Debug)]
pub(crate) enum Notice {
    RenderRequested(ComponentId),
    TaskCompleted {
        component: ComponentId,
        task: u64,
        kind: TaskKind,
        result: Result<(), ComponentError>,
    },
    TaskCancelled {
        component: ComponentId,
        task: u64,
    },
    DisposeCompleted {
        component: ComponentId,
        result: Result<(), ComponentError>,
    },
    DisplayCompleted {
        released_handlers: Vec<EventHandlerId>,
        /// Components of the batch with their first-render flag.
        rendered: Vec<(ComponentId, bool)>,
        result: Result<(), DisplayError>,
    },
}
