//! The renderer: owns every component state, runs render turns and hands
//! each turn's batch to the display.
//!
//! A turn drains pending notices, renders queued components in queue order
//! (children discovered during a diff are appended behind their parent),
//! processes disposals, routes failures and finally delivers one batch. The
//! renderer is single-threaded; `Dispatcher` puts it on its own thread and
//! serializes all access from elsewhere.

use crate::component::{Component, LifecycleTask, ParameterView, Parameters, instantiate_component};
use crate::config::RendererConfig;
use crate::error::{ComponentError, DisplayError, RenderError};
use crate::event::{EventArgs, EventFieldInfo, EventHandler, EventRegistry, apply_field_value};
use crate::handle::RenderHandle;
use crate::hooks::{DisplayHook, DisplayTask, ExceptionSink, LogExceptionSink, error_chain};
use crate::notice::{Notice, NoticeReceiver, NoticeSender, TaskKind};
use crate::state::{ClearThen, ComponentState, ComponentTable, Lifecycle};
use core_types::{ComponentId, ElementReferenceId, EventHandlerId, IdGenerator};
use futures::channel::{mpsc, oneshot};
use futures::executor::LocalSpawner;
use futures::future::{AbortHandle, Abortable, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use render_tree::debug::outline_frames;
use render_tree::frame::attribute_run_end;
use render_tree::{
    DiffHost, EventCallback, Frame, FrameKind, FramePool, PoolStats, RenderBatchBuilder,
    RenderTreeBuilder, compute_diff,
};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Frames listed per component when tracing render output.
const OUTLINE_CAP: usize = 64;

/// Resolves once no lifecycle, disposal or display task is in flight, or
/// when the renderer is disposed.
#[must_use = "a Quiescence does nothing unless awaited"]
#[derive(Debug)]
pub struct Quiescence {
    waiter: Option<oneshot::Receiver<()>>,
}

impl Quiescence {
    fn ready() -> Self {
        Self { waiter: None }
    }

    pub fn is_ready(&self) -> bool {
        self.waiter.is_none()
    }
}

impl Future for Quiescence {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let Some(waiter) = self.waiter.as_mut() else {
            return Poll::Ready(());
        };
        match Pin::new(waiter).poll(cx) {
            // Cancelled means the renderer went away, which is quiet enough.
            Poll::Ready(_) => {
                self.waiter = None;
                Poll::Ready(())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Everything the differ may touch while the batch builder is borrowed.
struct RendererCore {
    components: ComponentTable,
    roots: Vec<ComponentId>,
    ids: IdGenerator,
    events: EventRegistry,
    pool: FramePool,
    notices: NoticeSender,
    spawner: LocalSpawner,
    /// Component whose diff is running; owns the handler ids assigned meanwhile.
    diffing: Option<ComponentId>,
    /// Renders requested while the batch builder was unavailable.
    requested: Vec<ComponentId>,
    failures: Vec<RenderError>,
    next_task: u64,
    in_flight: usize,
}

impl RendererCore {
    fn create_component(
        &mut self,
        parent: Option<ComponentId>,
        component: Option<Box<dyn Component>>,
    ) -> ComponentId {
        let id = self.ids.next_component();
        self.components.insert(ComponentState::new(id, parent, component));
        if let Some(state) = self.components.get_mut(id) {
            if let Some(component) = state.component.as_mut() {
                component.attach(RenderHandle::new(id, self.notices.clone()));
            }
            state.lifecycle = Lifecycle::Attached;
        }
        id
    }

    /// Ids are never reused, so a missing id that was issued is stale.
    fn missing(&self, id: ComponentId) -> RenderError {
        if id.0 != 0 && self.ids.last_component().is_some_and(|last| id <= last) {
            RenderError::StaleComponent(id)
        } else {
            RenderError::UnknownComponent(id)
        }
    }

    fn set_component_parameters(&mut self, id: ComponentId, parameters: ParameterView<'_>) {
        let Some(component) = self
            .components
            .get_mut(id)
            .and_then(|state| state.component.as_mut())
        else {
            return;
        };
        let task = component.set_parameters(parameters);
        if self.run_task(id, TaskKind::Parameters, task) {
            self.requested.push(id);
        }
    }

    /// Returns `false` when the task failed synchronously.
    fn run_task(&mut self, component: ComponentId, kind: TaskKind, task: LifecycleTask) -> bool {
        match task {
            LifecycleTask::Completed(Ok(())) => true,
            LifecycleTask::Completed(Err(source)) => {
                self.failures.push(RenderError::Lifecycle { component, source });
                false
            }
            LifecycleTask::Pending(future) => {
                self.spawn_task(component, kind, future);
                true
            }
        }
    }

    fn spawn_task(
        &mut self,
        component: ComponentId,
        kind: TaskKind,
        future: LocalBoxFuture<'static, Result<(), ComponentError>>,
    ) {
        let task = self.next_task;
        self.next_task += 1;
        let (abort, registration) = AbortHandle::new_pair();
        let notices = self.notices.clone();
        let spawned = self.spawner.spawn_local(async move {
            let notice = match Abortable::new(future, registration).await {
                Ok(result) => Notice::TaskCompleted {
                    component,
                    task,
                    kind,
                    result,
                },
                Err(_aborted) => Notice::TaskCancelled { component, task },
            };
            let _ = notices.unbounded_send(notice);
        });
        match spawned {
            Ok(()) => {
                self.in_flight += 1;
                if let Some(state) = self.components.get_mut(component) {
                    state.tasks.push((task, abort));
                }
            }
            Err(err) => self.failures.push(RenderError::Lifecycle {
                component,
                source: ComponentError::with_source("could not spawn lifecycle task", err),
            }),
        }
    }

    fn spawn_notice(&mut self, future: impl Future<Output = Notice> + 'static) -> bool {
        let notices = self.notices.clone();
        let spawned = self.spawner.spawn_local(async move {
            let _ = notices.unbounded_send(future.await);
        });
        if spawned.is_ok() {
            self.in_flight += 1;
        }
        spawned.is_ok()
    }

    fn finish_task(&mut self, component: ComponentId, task: u64) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if let Some(state) = self.components.get_mut(component) {
            state.tasks.retain(|(id, _)| *id != task);
        }
    }
}

impl DiffHost for RendererCore {
    fn instantiate_child(
        &mut self,
        parent: ComponentId,
        frames: &[Frame],
        index: usize,
    ) -> ComponentId {
        let component_type = match &frames[index].kind {
            FrameKind::Component { component_type, .. } => Some(*component_type),
            _ => None,
        };
        let component = component_type.as_ref().and_then(instantiate_component);
        let instantiated = component.is_some();
        let id = self.create_component(Some(parent), component);
        if !instantiated {
            let name = component_type.map_or("<not a component>", |ty| ty.name());
            self.failures.push(RenderError::Lifecycle {
                component: id,
                source: ComponentError::new(format!("`{name}` did not produce a component")),
            });
            return id;
        }
        log::trace!(target: "renderer", "instantiated {id} under {parent}");
        let end = attribute_run_end(frames, index);
        self.set_component_parameters(id, ParameterView::from_frames(&frames[index + 1..end]));
        id
    }

    fn update_child_parameters(&mut self, child: ComponentId, frames: &[Frame], index: usize) {
        if !self.components.is_live(child) {
            log::debug!(target: "renderer", "skipping parameters for {child}: no longer live");
            return;
        }
        let end = attribute_run_end(frames, index);
        self.set_component_parameters(child, ParameterView::from_frames(&frames[index + 1..end]));
    }

    fn assign_event_handler(&mut self, callback: &EventCallback) -> EventHandlerId {
        let id = self.ids.next_event_handler();
        // Only diffs assign handlers; id 0 is never issued and has no ancestors.
        let owner = self.diffing.or(callback.receiver()).unwrap_or(ComponentId(0));
        self.events.register(id, owner, callback.clone());
        id
    }

    fn track_replaced_event_handler(&mut self, old: EventHandlerId, new: EventHandlerId) {
        self.events.record_replacement(old, new);
    }

    fn assign_element_reference(&mut self) -> ElementReferenceId {
        self.ids.next_element_reference()
    }
}

pub struct Renderer {
    config: RendererConfig,
    core: RendererCore,
    batch: RenderBatchBuilder,
    display: Box<dyn DisplayHook>,
    sink: Box<dyn ExceptionSink>,
    inbox: Option<NoticeReceiver>,
    /// Components rendered this turn, with their first-render flag.
    rendered: Vec<(ComponentId, bool)>,
    waiters: Vec<oneshot::Sender<()>>,
    disposed: bool,
}

impl Renderer {
    /// `spawner` drives pending lifecycle and display tasks; it must belong
    /// to an executor running on this thread.
    pub fn new(
        config: RendererConfig,
        display: Box<dyn DisplayHook>,
        spawner: LocalSpawner,
    ) -> Self {
        let (notices, inbox) = mpsc::unbounded();
        let pool = FramePool::new(config.pool.clone());
        Self {
            config,
            core: RendererCore {
                components: ComponentTable::default(),
                roots: Vec::new(),
                ids: IdGenerator::default(),
                events: EventRegistry::default(),
                pool,
                notices,
                spawner,
                diffing: None,
                requested: Vec::new(),
                failures: Vec::new(),
                next_task: 0,
                in_flight: 0,
            },
            batch: RenderBatchBuilder::new(),
            display,
            sink: Box::new(LogExceptionSink),
            inbox: Some(inbox),
            rendered: Vec::new(),
            waiters: Vec::new(),
            disposed: false,
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_exception_sink(&mut self, sink: Box<dyn ExceptionSink>) {
        self.sink = sink;
    }

    /// Attaches a root component. It renders once `render_root` supplies
    /// its parameters.
    pub fn attach_root(
        &mut self,
        component: Box<dyn Component>,
    ) -> Result<ComponentId, RenderError> {
        self.ensure_alive()?;
        let id = self.core.create_component(None, Some(component));
        if let Err(err) = self.display.root_attached(id) {
            self.core.components.remove(id);
            return Err(err.into());
        }
        self.core.roots.push(id);
        log::debug!(target: "renderer", "attached root {id}");
        Ok(id)
    }

    pub fn attach_root_of<C: Component + Default>(&mut self) -> Result<ComponentId, RenderError> {
        self.attach_root(Box::new(C::default()))
    }

    /// Supplies parameters to a root and runs the resulting turn. The
    /// returned future resolves when follow-up async work has settled.
    pub fn render_root(
        &mut self,
        id: ComponentId,
        parameters: Parameters,
    ) -> Result<Quiescence, RenderError> {
        self.ensure_alive()?;
        self.check_root(id)?;
        self.core.set_component_parameters(id, parameters.view());
        self.process_render_queue();
        Ok(self.quiescence())
    }

    /// Disposes a root and its whole subtree in one batch.
    pub fn remove_root(&mut self, id: ComponentId) -> Result<(), RenderError> {
        self.ensure_alive()?;
        self.check_root(id)?;
        self.core.roots.retain(|root| *root != id);
        self.batch.enqueue_disposal(id);
        self.process_render_queue();
        Ok(())
    }

    pub fn request_render(&mut self, id: ComponentId) -> Result<(), RenderError> {
        self.ensure_alive()?;
        match self.core.components.lifecycle(id) {
            None => return Err(self.core.missing(id)),
            Some(lifecycle) if !lifecycle.is_live() => return Err(RenderError::StaleComponent(id)),
            Some(_) => {}
        }
        self.enqueue_render(id);
        self.process_render_queue();
        Ok(())
    }

    /// Runs the handler registered as `handler_id` (following replacements
    /// made since the display last saw it), then re-renders its receiver.
    pub fn dispatch_event(
        &mut self,
        handler_id: EventHandlerId,
        field: Option<EventFieldInfo>,
        args: EventArgs,
    ) -> Result<Quiescence, RenderError> {
        self.ensure_alive()?;
        let (resolved, registration) = self
            .core
            .events
            .resolve(handler_id)
            .map(|(id, registration)| (id, registration.clone()))
            .ok_or(RenderError::UnknownEventHandler(handler_id))?;
        if resolved != handler_id {
            log::debug!(target: "renderer.events", "{handler_id} was replaced by {resolved}");
        }
        // The frames carry the newest id even while the display still sends older ones.
        let latest = self.core.events.latest(resolved);
        let receiver = registration.callback.receiver();
        if let Some(receiver) = receiver
            && !self.core.components.is_live(receiver)
        {
            return Err(RenderError::StaleComponent(receiver));
        }
        let Some(handler) = registration.callback.delegate().downcast_ref::<EventHandler>() else {
            log::warn!(
                target: "renderer.events",
                "{resolved} carries a delegate this renderer can't run"
            );
            return Err(RenderError::UnknownEventHandler(handler_id));
        };

        if let Some(field) = &field
            && let Some(state) = self.core.components.get_mut(field.component_id)
            && !apply_field_value(&mut state.current, latest, &field.field_value)
        {
            log::debug!(
                target: "renderer.events",
                "{latest} not found in {} frames",
                field.component_id
            );
        }

        log::trace!(target: "renderer.events", "dispatching {resolved} with {args:?}");
        let task = handler.invoke(&args);
        match receiver {
            Some(receiver) => {
                if self.core.run_task(receiver, TaskKind::Event, task) {
                    self.enqueue_render(receiver);
                }
            }
            None => {
                self.core.run_task(registration.owner, TaskKind::Detached, task);
            }
        }
        self.process_render_queue();
        Ok(self.quiescence())
    }

    /// Handles notices that arrived since the last turn and runs the turn
    /// they cause, if any.
    pub fn process_notices(&mut self) {
        self.drain_inbox();
        self.process_render_queue();
    }

    /// Disposes every component and rejects further work. Calling it again
    /// is a no-op. Pending dispose hooks finish on the executor; see
    /// `check_disposal`.
    pub fn dispose(&mut self) -> Result<(), RenderError> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        log::debug!(
            target: "renderer",
            "disposing renderer with {} component(s)",
            self.core.components.len()
        );
        self.drain_inbox();
        for id in self.core.components.ids() {
            self.batch.enqueue_disposal(id);
        }
        self.process_disposals();
        self.report_failures();
        self.batch.clear_for_next_batch();
        self.rendered.clear();
        self.core.roots.clear();
        // Dropping the senders resolves every outstanding Quiescence.
        self.waiters.clear();

        let remaining = self
            .core
            .components
            .ids()
            .into_iter()
            .filter(|id| self.core.components.lifecycle(*id) != Some(Lifecycle::Disposing))
            .count();
        if remaining > 0 {
            return Err(RenderError::LiveComponentsAtDisposal { remaining });
        }
        Ok(())
    }

    /// After `dispose` and once the executor ran the pending dispose hooks:
    /// fails if any component is still alive.
    pub fn check_disposal(&mut self) -> Result<(), RenderError> {
        self.drain_inbox();
        self.process_disposals();
        self.report_failures();
        match self.core.components.len() {
            0 => Ok(()),
            remaining => Err(RenderError::LiveComponentsAtDisposal { remaining }),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn component_count(&self) -> usize {
        self.core.components.len()
    }

    pub fn root_ids(&self) -> &[ComponentId] {
        &self.core.roots
    }

    /// Disposed ids stay answerable: they report `Disposed` forever.
    pub fn lifecycle(&self, id: ComponentId) -> Option<Lifecycle> {
        match self.core.components.lifecycle(id) {
            Some(lifecycle) => Some(lifecycle),
            None if matches!(self.core.missing(id), RenderError::StaleComponent(_)) => {
                Some(Lifecycle::Disposed)
            }
            None => None,
        }
    }

    pub fn current_frames(&self, id: ComponentId) -> Option<&[Frame]> {
        self.core.components.get(id).map(|state| state.current.frames())
    }

    pub fn registered_event_handlers(&self) -> usize {
        self.core.events.len()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.core.pool.stats()
    }

    pub(crate) fn take_notice_receiver(&mut self) -> Option<NoticeReceiver> {
        self.inbox.take()
    }

    pub(crate) fn restore_notice_receiver(&mut self, inbox: NoticeReceiver) {
        self.inbox = Some(inbox);
    }

    pub(crate) fn accept_notice(&mut self, notice: Notice) {
        match notice {
            Notice::RenderRequested(id) => {
                if self.core.components.is_live(id) {
                    self.enqueue_render(id);
                } else {
                    log::debug!(target: "renderer", "dropping render request for {id}: not live");
                }
            }
            Notice::TaskCompleted {
                component,
                task,
                kind,
                result,
            } => {
                self.core.finish_task(component, task);
                match result {
                    Ok(()) if kind.renders_on_completion() => self.enqueue_render(component),
                    Ok(()) => {}
                    Err(source) => {
                        self.core.failures.push(RenderError::Lifecycle { component, source })
                    }
                }
            }
            Notice::TaskCancelled { component, task } => {
                log::trace!(target: "renderer", "task {task} of {component} cancelled");
                self.core.finish_task(component, task);
            }
            Notice::DisposeCompleted { component, result } => {
                self.core.in_flight = self.core.in_flight.saturating_sub(1);
                if let Err(source) = result {
                    self.core.failures.push(RenderError::Lifecycle { component, source });
                }
                self.finalize_disposal(component);
            }
            Notice::DisplayCompleted {
                released_handlers,
                rendered,
                result,
            } => {
                self.core.in_flight = self.core.in_flight.saturating_sub(1);
                self.core.events.remove(&released_handlers);
                match result {
                    Ok(()) => self.run_after_render(rendered),
                    Err(err) => self.core.failures.push(err.into()),
                }
            }
        }
    }

    fn ensure_alive(&self) -> Result<(), RenderError> {
        if self.disposed {
            return Err(RenderError::RendererDisposed);
        }
        Ok(())
    }

    fn check_root(&self, id: ComponentId) -> Result<(), RenderError> {
        match self.core.components.lifecycle(id) {
            None => Err(self.core.missing(id)),
            Some(lifecycle) if !lifecycle.is_live() => Err(RenderError::StaleComponent(id)),
            Some(_) if !self.core.roots.contains(&id) => Err(RenderError::NotARootComponent(id)),
            Some(_) => Ok(()),
        }
    }

    fn quiescence(&mut self) -> Quiescence {
        if self.core.in_flight == 0 {
            return Quiescence::ready();
        }
        let (sender, waiter) = oneshot::channel();
        self.waiters.push(sender);
        Quiescence { waiter: Some(waiter) }
    }

    fn drain_inbox(&mut self) {
        let Some(mut inbox) = self.inbox.take() else {
            return;
        };
        while let Ok(Some(notice)) = inbox.try_next() {
            self.accept_notice(notice);
        }
        self.inbox = Some(inbox);
    }

    /// Queues `id` unless it already sits in the queue, so requests made
    /// within one turn collapse into a single render.
    fn enqueue_render(&mut self, id: ComponentId) {
        let Some(state) = self.core.components.get_mut(id) else {
            return;
        };
        if !state.lifecycle.is_live() || state.queued {
            return;
        }
        state.queued = true;
        if state.lifecycle == Lifecycle::Rendered {
            state.lifecycle = Lifecycle::RenderPending;
        }
        self.batch.enqueue_render(id);
    }

    fn process_render_queue(&mut self) {
        if self.disposed {
            return;
        }
        loop {
            self.run_turn();
            let more = self.batch.has_pending_renders()
                || !self.core.failures.is_empty()
                || !self.core.requested.is_empty();
            if !more {
                break;
            }
        }
        if self.core.in_flight == 0 {
            for waiter in self.waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }

    fn run_turn(&mut self) {
        loop {
            self.drain_inbox();
            self.process_disposals();
            for id in std::mem::take(&mut self.core.requested) {
                self.enqueue_render(id);
            }
            self.route_failures();
            match self.batch.next_render() {
                Some(id) => self.render_component(id),
                None => break,
            }
        }
        if !self.rendered.is_empty() || !self.batch.is_empty() {
            self.complete_turn();
        }
    }

    fn render_component(&mut self, id: ComponentId) {
        let core = &mut self.core;
        let Some(state) = core.components.get_mut(id) else {
            return;
        };
        state.queued = false;
        if !state.lifecycle.is_live() {
            return;
        }
        let clear = state.clear.take();
        let mut builder = RenderTreeBuilder::rent(&mut core.pool, Some(id));
        if clear.is_none()
            && let Some(component) = &state.component
        {
            component.build_render_tree(&mut builder);
        }
        let mut new = match builder.finish(&mut core.pool) {
            Ok(sequence) => sequence,
            Err(source) => {
                if state.lifecycle == Lifecycle::RenderPending {
                    state.lifecycle = Lifecycle::Rendered;
                }
                core.failures.push(RenderError::MalformedTree { component: id, source });
                return;
            }
        };
        if log::log_enabled!(target: "renderer", log::Level::Trace) {
            log::trace!(
                target: "renderer",
                "{id} rendered:\n{}",
                outline_frames(new.frames(), OUTLINE_CAP).join("\n")
            );
        }
        let old = std::mem::take(&mut state.current);

        core.diffing = Some(id);
        let diff = compute_diff(core, &mut self.batch, id, old.frames(), new.frames_mut());
        core.diffing = None;
        if let Some(diff) = diff {
            self.batch.push_diff(diff);
        }

        let Some(state) = core.components.get_mut(id) else {
            old.release(&mut core.pool);
            new.release(&mut core.pool);
            return;
        };
        let first_render = !state.has_rendered;
        state.has_rendered = true;
        state.commit_frames(old, new, &mut core.pool);
        if !self.rendered.iter().any(|(rendered, _)| *rendered == id) {
            self.rendered.push((id, first_render));
        }
        log::trace!(target: "renderer", "rendered {id} (first: {first_render})");

        match clear {
            Some(ClearThen::Rebuild) => self.enqueue_render(id),
            Some(ClearThen::Dispose) => self.batch.enqueue_disposal(id),
            None => {}
        }
    }

    fn complete_turn(&mut self) {
        let mut displayed = true;
        if !self.batch.is_empty() {
            let batch = self.batch.batch();
            if self.config.log_batches {
                log::debug!(
                    target: "renderer",
                    "batch: {} diff(s), {} edit(s), {} reference frame(s), {} disposed",
                    batch.updated_components().len(),
                    batch.edit_count(),
                    batch.reference_frames().len(),
                    batch.disposed_component_ids().len()
                );
            }
            let released = batch.disposed_event_handler_ids().to_vec();
            match self.display.update_display(&batch) {
                DisplayTask::Completed(result) => {
                    self.core.events.remove(&released);
                    displayed = match result {
                        Ok(()) => true,
                        Err(err) => {
                            self.core.failures.push(err.into());
                            false
                        }
                    };
                }
                DisplayTask::Pending(future) => {
                    // after_render waits for the display acknowledgement.
                    let handlers = released.clone();
                    let rendered = self.rendered.clone();
                    let spawned = self.core.spawn_notice(async move {
                        Notice::DisplayCompleted {
                            released_handlers: handlers,
                            rendered,
                            result: future.await,
                        }
                    });
                    if !spawned {
                        self.core.events.remove(&released);
                        self.core
                            .failures
                            .push(DisplayError::new("could not spawn display task").into());
                    }
                    displayed = false;
                }
            }
        }

        let rendered = std::mem::take(&mut self.rendered);
        let core = &mut self.core;
        for (id, _) in &rendered {
            if let Some(state) = core.components.get_mut(*id) {
                state.release_previous(&mut core.pool);
            }
        }
        self.batch.clear_for_next_batch();

        if displayed {
            self.run_after_render(rendered);
        }
    }

    /// Skips components disposed while the display was busy.
    fn run_after_render(&mut self, rendered: Vec<(ComponentId, bool)>) {
        for (id, first_render) in rendered {
            let Some(state) = self.core.components.get_mut(id) else {
                continue;
            };
            if !state.lifecycle.is_live() {
                continue;
            }
            let Some(component) = state.component.as_mut() else {
                continue;
            };
            let task = component.after_render(first_render);
            self.core.run_task(id, TaskKind::Detached, task);
        }
    }

    fn process_disposals(&mut self) {
        while let Some(id) = self.batch.next_disposal() {
            self.dispose_component(id);
        }
    }

    fn dispose_component(&mut self, id: ComponentId) {
        let Some(state) = self.core.components.get_mut(id) else {
            return;
        };
        if matches!(state.lifecycle, Lifecycle::Disposing | Lifecycle::Disposed) {
            return;
        }
        state.lifecycle = Lifecycle::Disposing;
        state.queued = false;
        let cancelled = state.cancel_tasks();
        for frame in state.current.frames() {
            match &frame.kind {
                FrameKind::Component {
                    component_id: Some(child),
                    ..
                } => self.batch.enqueue_disposal(*child),
                FrameKind::Attribute {
                    event_handler_id: Some(handler),
                    ..
                } => self.batch.record_disposed_event_handler(*handler),
                _ => {}
            }
        }
        self.batch.discard_render(id);
        self.batch.record_disposed_component(id);
        log::debug!(target: "renderer", "disposing {id} ({cancelled} task(s) cancelled)");

        let task = match state.component.as_mut() {
            Some(component) => component.dispose(),
            None => LifecycleTask::completed(),
        };
        match task {
            LifecycleTask::Completed(result) => {
                if let Err(source) = result {
                    self.core.failures.push(RenderError::Lifecycle { component: id, source });
                }
                self.finalize_disposal(id);
            }
            LifecycleTask::Pending(future) => {
                let spawned = self.core.spawn_notice(async move {
                    Notice::DisposeCompleted {
                        component: id,
                        result: future.await,
                    }
                });
                if !spawned {
                    self.core.failures.push(RenderError::Lifecycle {
                        component: id,
                        source: ComponentError::new("could not spawn dispose task"),
                    });
                    self.finalize_disposal(id);
                }
            }
        }
    }

    fn finalize_disposal(&mut self, id: ComponentId) {
        let core = &mut self.core;
        if let Some(mut state) = core.components.remove(id) {
            state.release_frames(&mut core.pool);
            state.lifecycle = Lifecycle::Disposed;
        }
        core.roots.retain(|root| *root != id);
    }

    /// Offers each failure to the nearest live ancestor that handles errors;
    /// unclaimed failures go to the exception sink.
    fn route_failures(&mut self) {
        for error in std::mem::take(&mut self.core.failures) {
            let source = match &error {
                RenderError::Lifecycle { component, .. }
                | RenderError::MalformedTree { component, .. } => Some(*component),
                _ => None,
            };
            if let Some(source) = source
                && self.offer_to_boundary(source, &error)
            {
                continue;
            }
            self.report(&error);
            if self.config.dispose_on_lifecycle_failure
                && let Some(source) = source
                && let Some(state) = self.core.components.get_mut(source)
                && state.lifecycle.is_live()
            {
                state.clear = Some(ClearThen::Dispose);
                self.enqueue_render(source);
            }
        }
    }

    fn offer_to_boundary(&mut self, source: ComponentId, error: &RenderError) -> bool {
        for ancestor in self.core.components.ancestors(source) {
            let Some(state) = self.core.components.get_mut(ancestor) else {
                continue;
            };
            if !state.lifecycle.is_live() {
                continue;
            }
            let handled = state
                .component
                .as_mut()
                .is_some_and(|component| component.handle_error(error));
            if handled {
                log::debug!(target: "renderer", "{ancestor} handled failure of {source}");
                state.clear = Some(ClearThen::Rebuild);
                self.enqueue_render(ancestor);
                return true;
            }
        }
        false
    }

    /// Sink-only routing for when no component may render any more.
    fn report_failures(&mut self) {
        for error in std::mem::take(&mut self.core.failures) {
            self.report(&error);
        }
    }

    fn report(&mut self, error: &RenderError) {
        log::debug!(target: "renderer", "unhandled: {}", error_chain(error));
        self.sink.handle_exception(error);
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        let live = self.core.components.len();
        if !self.disposed && live > 0 {
            log::warn!(
                target: "renderer",
                "renderer dropped with {live} live component(s); call dispose first"
            );
        }
    }
}
