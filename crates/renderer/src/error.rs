//! Failure taxonomy of the renderer.
//!
//! - Malformed trees abort one component's render; its previous frames stay.
//! - Stale and unknown ids are recoverable caller errors.
//! - Lifecycle failures are isolated to the failing component and routed to
//!   the nearest error boundary or the exception sink.
//! - Live components at disposal indicate a leak and are always reported.

use core_types::{ComponentId, EventHandlerId};
use render_tree::MalformedTree;
use std::error::Error;

type BoxedSource = Box<dyn Error + Send + Sync + 'static>;

/// Failure reported by a component's own code.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ComponentError {
    message: String,
    #[source]
    source: Option<BoxedSource>,
}

impl ComponentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxedSource>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("display rejected the batch: {message}")]
pub struct DisplayError {
    message: String,
}

impl DisplayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0} has been disposed")]
    StaleComponent(ComponentId),
    #[error("{0} is not known to this renderer")]
    UnknownComponent(ComponentId),
    #[error("{0} is not a root component")]
    NotARootComponent(ComponentId),
    #[error("no event handler is registered as {0}")]
    UnknownEventHandler(EventHandlerId),
    #[error("{component} produced a malformed render tree")]
    MalformedTree {
        component: ComponentId,
        #[source]
        source: MalformedTree,
    },
    #[error("{component} failed")]
    Lifecycle {
        component: ComponentId,
        #[source]
        source: ComponentError,
    },
    #[error(transparent)]
    Display(#[from] DisplayError),
    #[error("the renderer has been disposed")]
    RendererDisposed,
    #[error("{remaining} component(s) still live after disposal")]
    LiveComponentsAtDisposal { remaining: usize },
}

impl RenderError {
    /// Component the failure belongs to, when there is one.
    pub fn component(&self) -> Option<ComponentId> {
        match self {
            RenderError::StaleComponent(id)
            | RenderError::UnknownComponent(id)
            | RenderError::NotARootComponent(id) => Some(*id),
            RenderError::MalformedTree { component, .. }
            | RenderError::Lifecycle { component, .. } => Some(*component),
            RenderError::UnknownEventHandler(_)
            | RenderError::Display(_)
            | RenderError::RendererDisposed
            | RenderError::LiveComponentsAtDisposal { .. } => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("the dispatcher has shut down")]
    Shutdown,
    #[error("dispatched work panicked")]
    WorkPanicked,
    #[error("blocking on the dispatcher thread would deadlock")]
    WouldDeadlock,
    #[error("failed to start the dispatcher thread")]
    ThreadSpawn(#[source] std::io::Error),
    #[error("renderer disposal failed")]
    Disposal(#[source] RenderError),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid renderer config: {0}")]
    Toml(#[from] toml::de::Error),
}
