//! Narrow interfaces to the embedder: the display that consumes batches and
//! the sink for failures nobody awaited.

use crate::error::{DisplayError, RenderError};
use core_types::ComponentId;
use futures::future::{FutureExt, LocalBoxFuture};
use render_tree::RenderBatch;
use std::error::Error;
use std::future::Future;

pub enum DisplayTask {
    Completed(Result<(), DisplayError>),
    Pending(LocalBoxFuture<'static, Result<(), DisplayError>>),
}

impl DisplayTask {
    pub fn completed() -> Self {
        DisplayTask::Completed(Ok(()))
    }

    pub fn pending(future: impl Future<Output = Result<(), DisplayError>> + 'static) -> Self {
        DisplayTask::Pending(future.boxed_local())
    }
}

pub trait DisplayHook {
    /// A root component got an id; its output will arrive in later batches.
    fn root_attached(&mut self, _component_id: ComponentId) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Applies one turn's batch. The batch borrows renderer buffers and is
    /// gone once this returns; a pending task must own what it still needs.
    fn update_display(&mut self, batch: &RenderBatch<'_>) -> DisplayTask;
}

pub trait ExceptionSink {
    fn handle_exception(&mut self, error: &RenderError);
}

/// Default sink: logs the error with its source chain.
#[derive(Debug, Default)]
pub struct LogExceptionSink;

impl ExceptionSink for LogExceptionSink {
    fn handle_exception(&mut self, error: &RenderError) {
        log::error!(target: "renderer", "{}", error_chain(error));
    }
}

pub(crate) fn error_chain(error: &dyn Error) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        source = cause.source();
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComponentError;

    #[test]
    fn chain_lists_every_cause() {
        let error = RenderError::Lifecycle {
            component: ComponentId(2),
            source: ComponentError::with_source("fetch failed", std::io::Error::other("timeout")),
        };
        assert_eq!(error_chain(&error), "component#2 failed: fetch failed: timeout");
    }
}
