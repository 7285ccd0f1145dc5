//! Component renderer: keeps component state, turns render output into
//! batched display updates and routes events and failures back to components.

mod component;
mod config;
mod dispatcher;
mod error;
mod event;
mod handle;
mod hooks;
mod notice;
mod renderer;
mod state;

pub use component::{Component, LifecycleTask, ParameterView, Parameters, component_type};
pub use config::RendererConfig;
pub use dispatcher::{Dispatcher, Invocation};
pub use error::{ComponentError, ConfigError, DispatchError, DisplayError, RenderError};
pub use event::{EventArgs, EventFieldInfo, EventHandler, FieldValue, callback, handler};
pub use handle::RenderHandle;
pub use hooks::{DisplayHook, DisplayTask, ExceptionSink, LogExceptionSink};
pub use renderer::{Quiescence, Renderer};
pub use state::Lifecycle;

pub use core_types::{ComponentId, ElementReferenceId, EventHandlerId};
pub use render_tree::{
    AttributeValue, EventCallback, RenderBatch, RenderTreeBuilder, RenderTreeEdit,
};
