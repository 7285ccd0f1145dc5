//! The component capability consumed by the renderer.

use crate::error::{ComponentError, RenderError};
use crate::handle::RenderHandle;
use futures::future::{FutureExt, LocalBoxFuture};
use render_tree::{AttributeValue, ComponentType, Frame, FrameKind, RenderTreeBuilder};
use std::any::{TypeId, type_name};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Outcome of a lifecycle hook: finished now, or a local future the renderer
/// drives on its executor. Pending work never borrows renderer state.
pub enum LifecycleTask {
    Completed(Result<(), ComponentError>),
    Pending(LocalBoxFuture<'static, Result<(), ComponentError>>),
}

impl LifecycleTask {
    pub fn completed() -> Self {
        LifecycleTask::Completed(Ok(()))
    }

    pub fn failed(error: ComponentError) -> Self {
        LifecycleTask::Completed(Err(error))
    }

    pub fn pending(future: impl Future<Output = Result<(), ComponentError>> + 'static) -> Self {
        LifecycleTask::Pending(future.boxed_local())
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, LifecycleTask::Completed(_))
    }
}

impl From<Result<(), ComponentError>> for LifecycleTask {
    fn from(result: Result<(), ComponentError>) -> Self {
        LifecycleTask::Completed(result)
    }
}

impl fmt::Debug for LifecycleTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleTask::Completed(result) => f.debug_tuple("Completed").field(result).finish(),
            LifecycleTask::Pending(_) => f.write_str("Pending"),
        }
    }
}

pub trait Component: 'static {
    /// Called once, before the first `set_parameters`.
    fn attach(&mut self, handle: RenderHandle);

    /// Receives the parameters supplied by the parent (or the embedder for a
    /// root). The renderer renders the component after the synchronous part
    /// and again once a pending task completes.
    fn set_parameters(&mut self, parameters: ParameterView<'_>) -> LifecycleTask;

    fn build_render_tree(&self, builder: &mut RenderTreeBuilder);

    /// Runs after the display accepted a batch this component rendered in.
    /// Skipped when the display reports a failure for that batch.
    fn after_render(&mut self, _first_render: bool) -> LifecycleTask {
        LifecycleTask::completed()
    }

    fn dispose(&mut self) -> LifecycleTask {
        LifecycleTask::completed()
    }

    /// Error boundary hook for failures of descendants. Returning `true`
    /// claims the error: the renderer clears this component's output and
    /// renders it again.
    fn handle_error(&mut self, _error: &RenderError) -> bool {
        false
    }
}

fn instantiate<C: Component + Default>() -> Box<dyn std::any::Any> {
    let component: Box<dyn Component> = Box::new(C::default());
    Box::new(component)
}

/// Descriptor for `Component` frames producing `C::default()` instances.
pub fn component_type<C: Component + Default>() -> ComponentType {
    let full = type_name::<C>();
    let short = full.rsplit("::").next().unwrap_or(full);
    ComponentType::new(TypeId::of::<C>(), short, instantiate::<C>)
}

/// Turns the payload of a `ComponentType` back into a component.
pub(crate) fn instantiate_component(component_type: &ComponentType) -> Option<Box<dyn Component>> {
    component_type
        .instantiate()
        .downcast::<Box<dyn Component>>()
        .ok()
        .map(|boxed| *boxed)
}

#[derive(Clone, Copy)]
enum ParameterSource<'a> {
    Frames(&'a [Frame]),
    Owned(&'a [(Arc<str>, AttributeValue)]),
}

/// Borrowed parameters of one `set_parameters` call. When a name repeats, the
/// last occurrence wins.
#[derive(Clone, Copy)]
pub struct ParameterView<'a> {
    source: ParameterSource<'a>,
}

impl<'a> ParameterView<'a> {
    /// View over the attribute run of a `Component` frame.
    pub fn from_frames(attributes: &'a [Frame]) -> Self {
        Self {
            source: ParameterSource::Frames(attributes),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a AttributeValue)> + 'a {
        let (frames, owned): (&'a [Frame], &'a [(Arc<str>, AttributeValue)]) = match self.source {
            ParameterSource::Frames(frames) => (frames, &[]),
            ParameterSource::Owned(owned) => (&[], owned),
        };
        frames
            .iter()
            .filter_map(|frame| match &frame.kind {
                FrameKind::Attribute { name, value, .. } => Some((&**name, value)),
                _ => None,
            })
            .chain(owned.iter().map(|(name, value)| (&**name, value)))
    }

    pub fn get(&self, name: &str) -> Option<&'a AttributeValue> {
        self.iter()
            .filter(|(candidate, _)| *candidate == name)
            .last()
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn to_owned(&self) -> Parameters {
        Parameters {
            entries: self
                .iter()
                .map(|(name, value)| (Arc::from(name), value.clone()))
                .collect(),
        }
    }
}

impl fmt::Debug for ParameterView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// Owned parameters, used for root components.
#[derive(Clone, Debug, Default)]
pub struct Parameters {
    entries: Vec<(Arc<str>, AttributeValue)>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.entries.push((Arc::from(name), value.into()));
        self
    }

    pub fn view(&self) -> ParameterView<'_> {
        ParameterView {
            source: ParameterSource::Owned(&self.entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Greeting;

    impl Component for Greeting {
        fn attach(&mut self, _handle: RenderHandle) {}

        fn set_parameters(&mut self, _parameters: ParameterView<'_>) -> LifecycleTask {
            LifecycleTask::completed()
        }

        fn build_render_tree(&self, builder: &mut RenderTreeBuilder) {
            builder.add_text(0, "greeting");
        }
    }

    #[test]
    fn component_type_round_trips_through_the_factory() {
        let greeting = component_type::<Greeting>();
        assert_eq!(greeting.name(), "Greeting");
        assert_eq!(greeting.type_id(), TypeId::of::<Greeting>());
        assert!(instantiate_component(&greeting).is_some());
    }

    #[test]
    fn foreign_factories_are_not_components() {
        let foreign = ComponentType::new(TypeId::of::<u8>(), "u8", || Box::new(0u8));
        assert!(instantiate_component(&foreign).is_none());
    }

    #[test]
    fn frame_parameters_take_the_last_occurrence() {
        let frames = vec![
            Frame::attribute(1, "title", "first"),
            Frame::attribute(2, "count", 3i64),
            Frame::attribute(3, "title", "second"),
        ];
        let view = ParameterView::from_frames(&frames);
        assert_eq!(view.len(), 3);
        assert_eq!(view.get("title").and_then(AttributeValue::as_text), Some("second"));
        assert_eq!(view.get("count").and_then(AttributeValue::as_int), Some(3));
        assert!(view.get("missing").is_none());
    }

    #[test]
    fn owned_parameters_view_like_frames() {
        let params = Parameters::new().with("label", "go").with("enabled", true);
        let view = params.view();
        assert!(!view.is_empty());
        assert_eq!(view.get("enabled").and_then(AttributeValue::as_bool), Some(true));
        let copy = view.to_owned();
        assert_eq!(copy.view().get("label").and_then(AttributeValue::as_text), Some("go"));
    }
}
