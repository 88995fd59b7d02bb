//! The appliance loop: one dedicated thread that owns every camera, vision,
//! audio and catalog operation. Callers only post [`Message`]s.

use std::io;
use std::mem;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

use lighthouse_types::{ImageFrame, Task};
use thiserror::Error;
use tracing::{debug, info, warn};

const LOOP_THREAD_NAME: &str = "lighthouse-loop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("could not capture a picture")]
    CouldNotCapture,

    #[error("could not extract a description from the picture")]
    CouldNotExtractDescription,

    #[error("could not record a voice label")]
    CouldNotRecordVoiceLabel,
}

impl RecordError {
    pub fn code(self) -> u8 {
        match self {
            RecordError::CouldNotCapture => 0,
            RecordError::CouldNotExtractDescription => 1,
            RecordError::CouldNotRecordVoiceLabel => 2,
        }
    }
}

type SuccessCallback = Box<dyn FnOnce(ImageFrame) + Send>;
type ErrorCallback = Box<dyn FnOnce(RecordError) + Send>;

/// Completion callbacks of a RECORD request. Exactly one of them runs,
/// unless the request is discarded or superseded.
pub struct RecordDelegate {
    on_success: SuccessCallback,
    on_error: ErrorCallback,
}

impl RecordDelegate {
    pub fn new<S, E>(on_success: S, on_error: E) -> Self
    where
        S: FnOnce(ImageFrame) + Send + 'static,
        E: FnOnce(RecordError) + Send + 'static,
    {
        Self {
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
        }
    }

    pub fn succeed(self, frame: ImageFrame) {
        (self.on_success)(frame);
    }

    pub fn fail(self, error: RecordError) {
        (self.on_error)(error);
    }
}

/// A value handed back through the loop; used to observe that everything
/// posted before it has been processed.
pub struct ValueDelegate {
    value: i64,
    callback: Box<dyn FnOnce(i64) + Send>,
}

impl ValueDelegate {
    pub fn new<F>(value: i64, callback: F) -> Self
    where
        F: FnOnce(i64) + Send + 'static,
    {
        Self {
            value,
            callback: Box::new(callback),
        }
    }

    pub fn invoke(self) {
        (self.callback)(self.value);
    }
}

pub enum Message {
    Record(RecordDelegate),
    Identify,
    Wait(Option<ValueDelegate>),
    Shutdown,
}

impl Message {
    pub fn task(&self) -> Task {
        match self {
            Message::Record(_) => Task::Record,
            Message::Identify => Task::Identify,
            Message::Wait(_) => Task::Wait,
            Message::Shutdown => Task::Shutdown,
        }
    }
}

/// The most recently requested task, shared between callers and the loop.
#[derive(Debug)]
pub struct TaskToken(AtomicU8);

impl TaskToken {
    pub fn new(task: Task) -> Self {
        Self(AtomicU8::new(task.code()))
    }

    pub fn set(&self, task: Task) {
        self.0.store(task.code(), Ordering::SeqCst);
    }

    pub fn get(&self) -> Task {
        Task::from_code(self.0.load(Ordering::SeqCst)).expect("task token holds a valid task code")
    }
}

/// Handed to a running task. The task is cancelled once a different task
/// has been requested after it started.
#[derive(Debug, Clone)]
pub struct CancelToken {
    token: Arc<TaskToken>,
    started: Task,
}

impl CancelToken {
    pub fn new(token: Arc<TaskToken>, started: Task) -> Self {
        Self { token, started }
    }

    pub fn started(&self) -> Task {
        self.started
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.get() != self.started
    }
}

/// Work the loop performs for RECORD and IDENTIFY. Errors are reported
/// through the delegate or feedback, never returned.
pub trait TaskHandler: Send {
    fn record(&mut self, delegate: RecordDelegate, cancel: &CancelToken);

    fn identify(&mut self, cancel: &CancelToken);
}

#[derive(Default)]
struct Pending {
    stamp: u64,
    messages: Vec<Message>,
}

/// Message queue plus the latest-task token. Both are updated under the
/// same lock so the token never runs ahead of the queue.
pub struct Mailbox {
    pending: Mutex<Pending>,
    signal: Condvar,
    token: Arc<TaskToken>,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Pending::default()),
            signal: Condvar::new(),
            token: Arc::new(TaskToken::new(Task::Wait)),
        }
    }

    pub fn token(&self) -> Arc<TaskToken> {
        Arc::clone(&self.token)
    }

    pub fn send(&self, message: Message) {
        let task = message.task();
        {
            let mut pending = self.pending.lock().expect("mailbox lock poisoned");
            if task == Task::Shutdown && !pending.messages.is_empty() {
                debug!(
                    discarded = pending.messages.len(),
                    "shutdown discards queued messages"
                );
                pending.messages.clear();
            }
            pending.messages.push(message);
            pending.stamp += 1;
            self.token.set(task);
        }
        debug!(task = %task, "message sent");
        self.signal.notify_one();
    }

    /// Blocks until the stamp moves past `seen`, then takes the whole batch.
    fn next_batch(&self, seen: &mut u64) -> Vec<Message> {
        let mut pending = self.pending.lock().expect("mailbox lock poisoned");
        while pending.stamp == *seen {
            pending = self.signal.wait(pending).expect("mailbox lock poisoned");
        }
        *seen = pending.stamp;
        mem::take(&mut pending.messages)
    }
}

/// Runs until a SHUTDOWN message has been processed.
pub fn run(mailbox: &Mailbox, handler: &mut dyn TaskHandler) {
    let mut seen = 0u64;
    loop {
        let batch = mailbox.next_batch(&mut seen);
        debug!(messages = batch.len(), stamp = seen, "loop woke");
        let mut shutting_down = false;
        for message in batch {
            if shutting_down {
                match message {
                    Message::Wait(Some(delegate)) => delegate.invoke(),
                    other => debug!(task = %other.task(), "message after shutdown dropped"),
                }
                continue;
            }
            match message {
                Message::Record(delegate) => {
                    debug!("dispatching record");
                    let cancel = CancelToken::new(mailbox.token(), Task::Record);
                    handler.record(delegate, &cancel);
                }
                Message::Identify => {
                    debug!("dispatching identify");
                    let cancel = CancelToken::new(mailbox.token(), Task::Identify);
                    handler.identify(&cancel);
                }
                Message::Wait(Some(delegate)) => delegate.invoke(),
                Message::Wait(None) => debug!("stop requested"),
                Message::Shutdown => shutting_down = true,
            }
        }
        if shutting_down {
            info!("event loop finished");
            return;
        }
    }
}

/// Owns the loop thread.
pub struct EventLoop {
    mailbox: Arc<Mailbox>,
    thread: Option<JoinHandle<()>>,
}

impl EventLoop {
    pub fn spawn<H>(mut handler: H) -> io::Result<Self>
    where
        H: TaskHandler + 'static,
    {
        let mailbox = Arc::new(Mailbox::new());
        let loop_mailbox = Arc::clone(&mailbox);
        let thread = thread::Builder::new()
            .name(LOOP_THREAD_NAME.to_string())
            .spawn(move || run(&loop_mailbox, &mut handler))?;
        info!("event loop started");
        Ok(Self {
            mailbox,
            thread: Some(thread),
        })
    }

    pub fn send(&self, message: Message) {
        if self.thread.is_none() {
            warn!(task = %message.task(), "event loop already stopped; message dropped");
            return;
        }
        self.mailbox.send(message);
    }

    pub fn token(&self) -> Arc<TaskToken> {
        self.mailbox.token()
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Posts STOP then SHUTDOWN and waits for the loop thread to finish.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        self.mailbox.send(Message::Wait(None));
        self.mailbox.send(Message::Shutdown);
        if thread.join().is_err() {
            warn!("event loop thread panicked");
        }
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}
