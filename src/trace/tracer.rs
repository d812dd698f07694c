// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The tracer: one dedicated thread that owns every write to the trace store.
//!
//! Processor units never touch the store. They submit [`TraceEvent`]s through
//! a cloned [`TraceHandle`]; the tracer drains its queue in arrival order and
//! applies each action. Actions from one unit are therefore written in the
//! order that unit submitted them. A failed write is logged and counted and
//! never reaches the submitter.
//!
//! Deferred writes are committed every `commit_every` actions, whenever the
//! queue runs dry, and at shutdown.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::errors::TraceError;
use crate::observability::messages::trace::{
    TraceActionDropped, TraceWriteFailed, TracerStarted, TracerStopped,
};
use crate::observability::messages::StructuredLog;
use crate::trace::action::{TraceAction, TraceEvent};
use crate::trace::db::TraceDb;

const TRACER_THREAD_NAME: &str = "conduit-tracer";

enum TracerMessage {
    Action(TraceAction),
    Stop,
}

/// Totals reported when the tracer stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TracerSummary {
    pub applied: u64,
    pub failed: u64,
}

/// Cheap, cloneable submission side of the tracer.
///
/// A disabled handle accepts and discards everything, so processors run the
/// same way with or without a trace store.
#[derive(Debug, Clone, Default)]
pub struct TraceHandle {
    sender: Option<UnboundedSender<TracerMessage>>,
}

impl std::fmt::Debug for TracerMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TracerMessage::Action(action) => write!(f, "Action({})", action.label()),
            TracerMessage::Stop => f.write_str("Stop"),
        }
    }
}

impl TraceHandle {
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }

    /// Timestamp `event` now and queue it. Never blocks.
    pub fn submit(&self, event: TraceEvent) {
        let Some(sender) = &self.sender else {
            return;
        };
        let action = TraceAction::new(event);
        if let Err(err) = sender.send(TracerMessage::Action(action)) {
            if let TracerMessage::Action(action) = err.0 {
                TraceActionDropped {
                    action: action.label(),
                }
                .log();
            }
        }
    }
}

pub struct Tracer {
    handle: TraceHandle,
    thread: Option<JoinHandle<TracerSummary>>,
}

impl Tracer {
    /// Spawn the tracer thread over a read-write store.
    pub fn start(db: Arc<TraceDb>, commit_every: usize) -> Result<Self, TraceError> {
        if db.is_readonly() {
            return Err(TraceError::ReadOnly {
                path: db.path().to_path_buf(),
            });
        }

        let (sender, receiver) = unbounded_channel();
        let commit_every = commit_every.max(1);

        TracerStarted {
            path: db.path(),
            commit_every,
        }
        .log();

        let thread = std::thread::Builder::new()
            .name(TRACER_THREAD_NAME.to_string())
            .spawn(move || {
                let span = TracerStarted {
                    path: db.path(),
                    commit_every,
                }
                .span("tracer_drain");
                let _guard = span.enter();
                drain(&db, receiver, commit_every)
            })
            .map_err(TraceError::TracerStart)?;

        Ok(Self {
            handle: TraceHandle {
                sender: Some(sender),
            },
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> TraceHandle {
        self.handle.clone()
    }

    /// Apply everything queued so far, commit, and stop the thread.
    pub fn shutdown(mut self) -> TracerSummary {
        self.stop()
    }

    fn stop(&mut self) -> TracerSummary {
        if let Some(sender) = &self.handle.sender {
            let _ = sender.send(TracerMessage::Stop);
        }
        let summary = self
            .thread
            .take()
            .and_then(|thread| thread.join().ok())
            .unwrap_or_default();
        TracerStopped {
            applied: summary.applied,
            failed: summary.failed,
        }
        .log();
        summary
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.stop();
        }
    }
}

fn drain(db: &TraceDb, mut receiver: UnboundedReceiver<TracerMessage>, commit_every: usize) -> TracerSummary {
    let mut summary = TracerSummary::default();
    let mut pending = 0usize;

    loop {
        let message = match receiver.try_recv() {
            Ok(message) => message,
            Err(TryRecvError::Empty) => {
                if pending > 0 {
                    commit(db, &mut summary);
                    pending = 0;
                }
                match receiver.blocking_recv() {
                    Some(message) => message,
                    None => break,
                }
            }
            Err(TryRecvError::Disconnected) => break,
        };

        let action = match message {
            TracerMessage::Action(action) => action,
            TracerMessage::Stop => break,
        };

        match action.record_to_db(db) {
            Ok(()) => summary.applied += 1,
            Err(err) => {
                summary.failed += 1;
                TraceWriteFailed {
                    action: action.label(),
                    error: &err,
                }
                .log();
            }
        }

        if action.commits_immediately() {
            pending = 0;
        } else {
            pending += 1;
            if pending >= commit_every {
                commit(db, &mut summary);
                pending = 0;
            }
        }
    }

    receiver.close();
    commit(db, &mut summary);
    summary
}

fn commit(db: &TraceDb, summary: &mut TracerSummary) {
    if let Err(err) = db.commit() {
        summary.failed += 1;
        TraceWriteFailed {
            action: "commit",
            error: &err,
        }
        .log();
    }
}
