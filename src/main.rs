//! Small demo: a counter rendered on the dispatcher thread, clicked a few
//! times from the main thread. Run with `RUST_LOG=info` (or `debug`) to see
//! the batches; pass a TOML file to override the renderer config.

use render_tree::FrameKind;
use renderer::{
    Component, ComponentId, Dispatcher, DisplayHook, DisplayTask, EventArgs, EventHandlerId,
    LifecycleTask, ParameterView, Parameters, RenderBatch, RenderHandle, RenderTreeBuilder,
    Renderer, RendererConfig, component_type, handler,
};
use std::cell::Cell;
use std::error::Error;
use std::rc::Rc;

const CLICKS: usize = 3;

/// Prints every edit the renderer delivers.
struct LogDisplay;

impl DisplayHook for LogDisplay {
    fn root_attached(&mut self, component_id: ComponentId) -> Result<(), renderer::DisplayError> {
        log::info!(target: "display", "root {component_id} attached");
        Ok(())
    }

    fn update_display(&mut self, batch: &RenderBatch<'_>) -> DisplayTask {
        for diff in batch.updated_components() {
            for edit in batch.edits_for(diff) {
                log::info!(target: "display", "{}: {edit}", diff.component_id);
            }
        }
        for disposed in batch.disposed_component_ids() {
            log::info!(target: "display", "{disposed} disposed");
        }
        DisplayTask::completed()
    }
}

#[derive(Default)]
struct Counter {
    count: Rc<Cell<u32>>,
}

impl Component for Counter {
    fn attach(&mut self, _handle: RenderHandle) {}

    fn set_parameters(&mut self, _parameters: ParameterView<'_>) -> LifecycleTask {
        LifecycleTask::completed()
    }

    fn build_render_tree(&self, builder: &mut RenderTreeBuilder) {
        let count = Rc::clone(&self.count);
        builder.open_element(0, "div");
        builder.open_element(1, "button");
        builder.add_event_handler(
            2,
            "onclick",
            handler(move |_| {
                count.set(count.get() + 1);
                LifecycleTask::completed()
            }),
        );
        builder.add_text(3, "increment");
        builder.close_element();
        let caption = format!("clicked {}", self.count.get());
        builder.add_component(4, component_type::<Label>(), [("text", caption)]);
        builder.close_element();
    }
}

#[derive(Default)]
struct Label {
    text: String,
}

impl Component for Label {
    fn attach(&mut self, _handle: RenderHandle) {}

    fn set_parameters(&mut self, parameters: ParameterView<'_>) -> LifecycleTask {
        self.text = parameters
            .get("text")
            .and_then(|value| value.as_text())
            .unwrap_or_default()
            .to_string();
        LifecycleTask::completed()
    }

    fn build_render_tree(&self, builder: &mut RenderTreeBuilder) {
        builder.open_element(0, "span");
        builder.add_text(1, &self.text);
        builder.close_element();
    }
}

fn load_config() -> Result<RendererConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => Ok(RendererConfig::from_toml_str(&std::fs::read_to_string(path)?)?),
        None => Ok(RendererConfig::default()),
    }
}

fn click_target(renderer: &Renderer, root: ComponentId) -> Option<EventHandlerId> {
    renderer.current_frames(root)?.iter().find_map(|frame| match frame.kind {
        FrameKind::Attribute { event_handler_id, .. } => event_handler_id,
        _ => None,
    })
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let dispatcher = Dispatcher::spawn(config, || Box::new(LogDisplay) as Box<dyn DisplayHook>)?;

    let root = dispatcher
        .invoke(|renderer| -> Result<ComponentId, renderer::RenderError> {
            let root = renderer.attach_root_of::<Counter>()?;
            let _ = renderer.render_root(root, Parameters::new())?;
            Ok(root)
        })
        .wait()??;

    for _ in 0..CLICKS {
        // Each render binds a fresh handler id, so look it up per click.
        let clicked = dispatcher
            .invoke(move |renderer| -> Result<(), renderer::RenderError> {
                if let Some(target) = click_target(renderer, root) {
                    let _ = renderer.dispatch_event(target, None, EventArgs::Empty)?;
                }
                Ok(())
            })
            .wait()?;
        clicked?;
    }

    let components = dispatcher.invoke(|renderer| renderer.component_count()).wait()?;
    log::info!("{components} component(s) live before shutdown");
    dispatcher.shutdown()?;
    Ok(())
}
