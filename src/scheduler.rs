//! Background worker (single consumer)
//!
//! One dedicated thread owns the tree builder and drives the rule manager
//! from a message queue fed by the host:
//!
//! - `ContentChanged` rebuilds the tree and re-evaluates the rules.
//!   Queued change messages are coalesced into one rebuild.
//! - With no message for `poll_interval`, the worker polls the content
//!   source as if an unforced change had been signalled.
//! - The auto-action sweep runs once `auto_action_delay` has elapsed after
//!   a successful update.
//! - A build or update that lost a race with the host content is re-posted
//!   as a forced rebuild.
//!
//! Host notifications are delivered outside the manager lock.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, error, trace};

use crate::dom::{ChangeSeq, TreeBuilder};
use crate::error::Result;
use crate::host::{ContentSource, HostSink};
use crate::resource::ManagerRef;

/// Messages posted to the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// The host content changed; `force` rebuilds even at an unchanged size
    ContentChanged { force: bool },
    CheckAutoAction,
    Stop,
}

pub struct Scheduler {
    sender: Sender<Message>,
    handle: Option<JoinHandle<()>>,
    seq: ChangeSeq,
}

impl Scheduler {
    /// Spawn the worker and request an initial build
    pub fn spawn(
        manager: ManagerRef,
        source: Arc<dyn ContentSource>,
        sink: Arc<dyn HostSink>,
    ) -> Result<Self> {
        let config = manager.with_manager(|m| m.config().clone())?;
        let seq = ChangeSeq::new();
        let (tx, rx) = mpsc::channel();
        let worker = Worker {
            builder: TreeBuilder::new(seq.clone(), config.cancel_superseded_builds),
            manager,
            source,
            sink,
            sender: tx.clone(),
            poll_interval: config.poll_interval(),
        };
        let handle = thread::Builder::new()
            .name("webaccess-worker".into())
            .spawn(move || worker.run(rx))?;
        let scheduler = Scheduler {
            sender: tx,
            handle: Some(handle),
            seq,
        };
        scheduler.content_changed(true);
        Ok(scheduler)
    }

    /// Change sequence bumped on every content change notification
    pub fn seq(&self) -> &ChangeSeq {
        &self.seq
    }

    /// Signal a host content change; false once the worker is gone
    pub fn content_changed(&self, force: bool) -> bool {
        self.seq.bump();
        self.sender.send(Message::ContentChanged { force }).is_ok()
    }

    /// Request an auto-action sweep now
    pub fn check_auto_action(&self) -> bool {
        self.sender.send(Message::CheckAutoAction).is_ok()
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the worker and wait for it
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let _ = self.sender.send(Message::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    builder: TreeBuilder,
    manager: ManagerRef,
    source: Arc<dyn ContentSource>,
    sink: Arc<dyn HostSink>,
    /// Re-posts forced rebuilds
    sender: Sender<Message>,
    poll_interval: Duration,
}

impl Worker {
    fn run(mut self, rx: Receiver<Message>) {
        debug!("worker started");
        loop {
            let deadline = self
                .manager
                .with_manager(|m| m.auto_action_deadline())
                .ok()
                .flatten();
            let timeout = deadline.map_or(self.poll_interval, |at| {
                at.saturating_duration_since(Instant::now())
                    .min(self.poll_interval)
            });
            let message = match rx.recv_timeout(timeout) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => match deadline {
                    Some(at) if at <= Instant::now() => Message::CheckAutoAction,
                    _ => Message::ContentChanged { force: false },
                },
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let keep_going = match message {
                Message::Stop => false,
                Message::CheckAutoAction => {
                    self.sweep();
                    true
                }
                Message::ContentChanged { force } => self.coalesce(force, &rx),
            };
            if !keep_going {
                break;
            }
        }
        debug!("worker stopped");
    }

    /// Merge queued change messages into one rebuild
    fn coalesce(&mut self, mut force: bool, rx: &Receiver<Message>) -> bool {
        let mut sweep = false;
        loop {
            match rx.try_recv() {
                Ok(Message::ContentChanged { force: more }) => force |= more,
                Ok(Message::CheckAutoAction) => sweep = true,
                Ok(Message::Stop) | Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => break,
            }
        }
        self.rebuild(force);
        if sweep {
            self.sweep();
        }
        true
    }

    fn repost(&self) {
        let _ = self.sender.send(Message::ContentChanged { force: true });
    }

    fn rebuild(&mut self, force: bool) {
        let doc = match self.builder.update(self.source.as_ref(), force) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                trace!("content unchanged");
                return;
            }
            Err(err) => {
                if err.is_retryable() {
                    self.repost();
                }
                return;
            }
        };
        let window_title = self.source.window_title();
        let seq = self.builder.seq().clone();
        let outcome = self
            .manager
            .with_manager(|m| -> Result<_> {
                let snapshot = m.update(doc, &seq, window_title.as_deref())?;
                Ok((snapshot, m.check_page_title()))
            })
            .and_then(|inner| inner);
        match outcome {
            Ok((snapshot, title)) => {
                self.sink.rules_updated(&snapshot);
                if let Some(title) = title {
                    debug!(title = %title, "page title changed");
                    self.sink.page_title_changed(&title);
                }
            }
            Err(err) if err.is_retryable() => {
                self.builder.reset();
                self.repost();
            }
            Err(err) => error!(error = %err, "update failed"),
        }
    }

    fn sweep(&self) {
        let now = Instant::now();
        match self.manager.with_manager(|m| m.check_auto_action(now)) {
            Ok(actions) => {
                for action in &actions {
                    debug!(rule = %action.rule, action = %action.action, "auto action");
                    self.sink.execute_action(action);
                }
            }
            Err(err) => error!(error = %err, "auto action sweep failed"),
        }
    }
}
