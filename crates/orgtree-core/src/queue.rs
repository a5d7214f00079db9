//! In-process front of the propagation task queue.
//!
//! The engine's whole contract with the queue is "enqueue with these
//! parameters, receive a task identifier synchronously". `TaskQueue`
//! honors it by assigning a fresh id and handing the task to the external
//! worker over an mpsc channel; the worker that actually pushes policies
//! to managed endpoints lives outside this codebase.

use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ports::{Notifier, Result};
use crate::types::{JobOp, Node, NodeKind};

/// One unit of propagation work, as handed to the external worker.
/// `old` is carried only for `changed` operations.
#[derive(Debug, Clone)]
pub struct PropagationTask {
    pub task_id: String,
    pub op: JobOp,
    pub kind: NodeKind,
    pub new: Node,
    pub old: Option<Node>,
}

pub struct TaskQueue {
    tx: mpsc::UnboundedSender<PropagationTask>,
}

impl TaskQueue {
    /// Returns the queue front and the receiving end the worker consumes.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PropagationTask>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for TaskQueue {
    async fn enqueue(
        &self,
        op: JobOp,
        kind: NodeKind,
        new: &Node,
        old: Option<&Node>,
    ) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        let task = PropagationTask {
            task_id: task_id.clone(),
            op,
            kind,
            new: new.clone(),
            old: old.cloned(),
        };
        self.tx
            .send(task)
            .map_err(|_| anyhow!("propagation queue is closed"))?;
        tracing::debug!(%task_id, op = op.as_str(), kind = %kind, "propagation task enqueued");
        Ok(task_id)
    }
}

/// Test double: records every enqueued task and returns its id.
#[derive(Default)]
pub struct RecordingNotifier {
    tasks: Mutex<Vec<PropagationTask>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<PropagationTask> {
        self.tasks.lock().expect("recording notifier lock").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn enqueue(
        &self,
        op: JobOp,
        kind: NodeKind,
        new: &Node,
        old: Option<&Node>,
    ) -> Result<String> {
        let task_id = Uuid::new_v4().to_string();
        self.tasks
            .lock()
            .expect("recording notifier lock")
            .push(PropagationTask {
                task_id: task_id.clone(),
                op,
                kind,
                new: new.clone(),
                old: old.cloned(),
            });
        Ok(task_id)
    }
}
