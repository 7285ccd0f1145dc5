//! Runs a `Renderer` on a dedicated thread and serializes access to it.
//!
//! Work from other threads is queued on the thread's inbox and executed in
//! submission order. Work submitted from the renderer thread itself runs
//! immediately when the renderer is idle, and right after the current work
//! item (ahead of the inbox) when it is not.

use crate::config::RendererConfig;
use crate::error::{DispatchError, RenderError};
use crate::hooks::DisplayHook;
use crate::notice::NoticeReceiver;
use crate::renderer::Renderer;
use futures::channel::{mpsc, oneshot};
use futures::executor::{LocalPool, block_on};
use futures::{StreamExt, select_biased};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce(&mut Renderer) + Send>;
type ShutdownAck = oneshot::Sender<Result<(), RenderError>>;

enum Message {
    Work(Job),
    Shutdown(ShutdownAck),
}

thread_local! {
    static OWNED: RefCell<Option<Rc<RefCell<Renderer>>>> = const { RefCell::new(None) };
    static DEFERRED: RefCell<VecDeque<Job>> = const { RefCell::new(VecDeque::new()) };
}

struct Shared {
    inbox: mpsc::UnboundedSender<Message>,
    owner: ThreadId,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Shared {
    fn drop(&mut self) {
        let thread = self
            .thread
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(thread) = thread else {
            return;
        };
        let (ack, _) = oneshot::channel();
        let _ = self.inbox.unbounded_send(Message::Shutdown(ack));
        if thread::current().id() != self.owner && thread.join().is_err() {
            log::error!(target: "renderer.dispatcher", "dispatcher thread panicked");
        }
    }
}

/// Handle to a renderer thread. Cheap to clone and `Send + Sync`; the
/// thread shuts down when `shutdown` is called or the last handle drops.
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Starts the renderer thread. `make_display` runs on that thread, so the
    /// display itself need not be `Send`.
    pub fn spawn<F>(config: RendererConfig, make_display: F) -> Result<Self, DispatchError>
    where
        F: FnOnce() -> Box<dyn DisplayHook> + Send + 'static,
    {
        let (inbox, messages) = mpsc::unbounded();
        let name = config.dispatcher_thread_name.clone();
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || run(config, make_display, messages))
            .map_err(DispatchError::ThreadSpawn)?;
        let owner = thread.thread().id();
        log::debug!(target: "renderer.dispatcher", "started renderer thread {owner:?}");
        Ok(Self {
            shared: Arc::new(Shared {
                inbox,
                owner,
                thread: Mutex::new(Some(thread)),
            }),
        })
    }

    /// Whether the caller runs on the renderer thread.
    pub fn check_access(&self) -> bool {
        thread::current().id() == self.shared.owner
    }

    /// Schedules `work` against the renderer. A panic inside `work` is
    /// caught and reported as `WorkPanicked`; the renderer keeps running.
    ///
    /// From another thread the work joins the inbox in FIFO order. On the
    /// renderer thread it runs inline only while the renderer is idle. Work
    /// submitted from inside other work cannot borrow the renderer again, so
    /// it is deferred until the current item returns (ahead of the inbox),
    /// and waiting on its `Invocation` there yields `WouldDeadlock`.
    pub fn invoke<R, F>(&self, work: F) -> Invocation<R>
    where
        F: FnOnce(&mut Renderer) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let job: Job = Box::new(move |renderer| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| work(renderer)))
                .map_err(|_| DispatchError::WorkPanicked);
            if result.is_err() {
                log::error!(target: "renderer.dispatcher", "dispatched work panicked");
            }
            let _ = sender.send(result);
        });
        if !self.check_access() {
            if self.shared.inbox.unbounded_send(Message::Work(job)).is_err() {
                log::debug!(target: "renderer.dispatcher", "work submitted after shutdown");
            }
        } else if let Some(job) = run_inline(job) {
            DEFERRED.with(|deferred| deferred.borrow_mut().push_back(job));
        }
        Invocation {
            receiver,
            owner: self.shared.owner,
        }
    }

    /// Disposes the renderer and joins its thread. Work still queued is
    /// dropped and its invocations resolve to `Shutdown`. Idempotent.
    pub fn shutdown(&self) -> Result<(), DispatchError> {
        if self.check_access() {
            return Err(DispatchError::WouldDeadlock);
        }
        let thread = self
            .shared
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(thread) = thread else {
            return Ok(());
        };
        let (ack, done) = oneshot::channel();
        let outcome = if self.shared.inbox.unbounded_send(Message::Shutdown(ack)).is_ok() {
            block_on(done).unwrap_or(Ok(()))
        } else {
            Ok(())
        };
        if thread.join().is_err() {
            return Err(DispatchError::WorkPanicked);
        }
        log::debug!(target: "renderer.dispatcher", "renderer thread stopped");
        outcome.map_err(DispatchError::Disposal)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("owner", &self.shared.owner).finish()
    }
}

/// Result of `Dispatcher::invoke`. Await it, or `wait` from another thread.
#[must_use = "an Invocation does nothing unless awaited or waited on"]
#[derive(Debug)]
pub struct Invocation<R> {
    receiver: oneshot::Receiver<Result<R, DispatchError>>,
    owner: ThreadId,
}

impl<R> Invocation<R> {
    /// Blocks until the work ran. On the renderer thread this only succeeds
    /// for work that already ran inline.
    pub fn wait(mut self) -> Result<R, DispatchError> {
        if thread::current().id() == self.owner {
            return match self.receiver.try_recv() {
                Ok(Some(result)) => result,
                Ok(None) => Err(DispatchError::WouldDeadlock),
                Err(_canceled) => Err(DispatchError::Shutdown),
            };
        }
        block_on(self)
    }
}

impl<R> Future for Invocation<R> {
    type Output = Result<R, DispatchError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(DispatchError::Shutdown)))
    }
}

/// Runs `job` now if the renderer on this thread is idle; hands it back
/// otherwise.
fn run_inline(job: Job) -> Option<Job> {
    OWNED.with(|slot| {
        let slot = slot.borrow();
        let Some(renderer) = slot.as_ref() else {
            return Some(job);
        };
        match renderer.try_borrow_mut() {
            Ok(mut renderer) => {
                job(&mut *renderer);
                run_deferred(&mut renderer);
                None
            }
            Err(_) => Some(job),
        }
    })
}

fn run<F>(config: RendererConfig, make_display: F, messages: mpsc::UnboundedReceiver<Message>)
where
    F: FnOnce() -> Box<dyn DisplayHook>,
{
    let mut pool = LocalPool::new();
    let mut renderer = Renderer::new(config, make_display(), pool.spawner());
    let Some(notices) = renderer.take_notice_receiver() else {
        return;
    };
    let renderer = Rc::new(RefCell::new(renderer));
    OWNED.with(|slot| *slot.borrow_mut() = Some(Rc::clone(&renderer)));

    let (ack, notices) = pool.run_until(pump(Rc::clone(&renderer), messages, notices));

    let disposed = renderer.borrow_mut().dispose();
    pool.run_until_stalled();
    let checked = {
        let mut renderer = renderer.borrow_mut();
        renderer.restore_notice_receiver(notices);
        renderer.check_disposal()
    };
    let outcome = disposed.and(checked);
    match ack {
        Some(ack) => {
            let _ = ack.send(outcome);
        }
        None => {
            if let Err(err) = outcome {
                log::error!(target: "renderer.dispatcher", "renderer disposal failed: {err}");
            }
        }
    }
    OWNED.with(|slot| slot.borrow_mut().take());
    DEFERRED.with(|deferred| deferred.borrow_mut().clear());
}

/// Runs work that was submitted from inside the renderer while it was busy.
fn run_deferred(renderer: &mut Renderer) {
    while let Some(job) = DEFERRED.with(|deferred| deferred.borrow_mut().pop_front()) {
        job(renderer);
    }
}

/// Feeds notices and submitted work to the renderer until shutdown. Spawned
/// lifecycle tasks make progress whenever this is waiting.
async fn pump(
    renderer: Rc<RefCell<Renderer>>,
    mut messages: mpsc::UnboundedReceiver<Message>,
    mut notices: NoticeReceiver,
) -> (Option<ShutdownAck>, NoticeReceiver) {
    loop {
        select_biased! {
            notice = notices.next() => {
                if let Some(notice) = notice {
                    let mut renderer = renderer.borrow_mut();
                    renderer.accept_notice(notice);
                    renderer.process_notices();
                    run_deferred(&mut renderer);
                }
            }
            message = messages.next() => match message {
                Some(Message::Work(job)) => {
                    let mut renderer = renderer.borrow_mut();
                    job(&mut *renderer);
                    run_deferred(&mut renderer);
                    renderer.process_notices();
                }
                Some(Message::Shutdown(ack)) => return (Some(ack), notices),
                None => return (None, notices),
            },
        }
    }
}
