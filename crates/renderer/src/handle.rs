use crate::notice::{Notice, NoticeSender};
use core_types::ComponentId;

/// A component's link back to its renderer. `Send`, so it can be moved into
/// work running on other threads; requests are delivered as notices and
/// coalesced into the next turn.
#[derive(Clone, Debug)]
pub struct RenderHandle {
    component_id: ComponentId,
    notices: NoticeSender,
}

impl RenderHandle {
    pub(crate) fn new(component_id: ComponentId, notices: NoticeSender) -> Self {
        Self {
            component_id,
            notices,
        }
    }

    pub fn component_id(&self) -> ComponentId {
        self.component_id
    }

    /// Asks for a re-render. Returns `false` once the renderer is gone.
    pub fn request_render(&self) -> bool {
        self.notices
            .unbounded_send(Notice::RenderRequested(self.component_id))
            .is_ok()
    }

    pub fn is_renderer_alive(&self) -> bool {
        !self.notices.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::channel::mpsc;

    #[test]
    fn requests_fail_once_the_receiver_is_gone() {
        let (tx, rx) = mpsc::unbounded();
        let handle = RenderHandle::new(ComponentId(3), tx);
        assert!(handle.request_render());
        assert!(handle.is_renderer_alive());
        drop(rx);
        assert!(!handle.request_render());
        assert!(!handle.is_renderer_alive());
    }
}
