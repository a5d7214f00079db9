//! Job-status fan-out registry.
//!
//! A process-wide mapping from channel name to subscriber set. Each
//! subscriber owns its delivery channel; `broadcast` iterates a snapshot of
//! the current senders, so subscribing or unsubscribing during a broadcast
//! never deadlocks or skips established subscribers. The transport that
//! carries events beyond this process (websocket fan-out) is an external
//! collaborator.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{JobOp, JobStatus};

/// Default channel the admin UI listens on.
pub const ADMIN_CHANNEL: &str = "admin";

pub type SubscriberId = Uuid;

/// One job-status transition, as pushed to subscribers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct JobEvent {
    pub job_id: String,
    pub objid: Uuid,
    pub op: JobOp,
    pub status: JobStatus,
    pub last_update: DateTime<Utc>,
}

#[derive(Default)]
pub struct ChannelRegistry {
    channels: RwLock<HashMap<String, HashMap<SubscriberId, mpsc::UnboundedSender<JobEvent>>>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber on a channel, returning its id and the
    /// receiving end of its delivery channel.
    pub fn subscribe(&self, channel: &str) -> (SubscriberId, mpsc::UnboundedReceiver<JobEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.channels
            .write()
            .expect("acquire exclusive write access on registry")
            .entry(channel.to_string())
            .or_default()
            .insert(id, tx);
        (id, rx)
    }

    /// Returns whether the subscriber was present.
    pub fn unsubscribe(&self, channel: &str, id: SubscriberId) -> bool {
        let mut channels = self
            .channels
            .write()
            .expect("acquire exclusive write access on registry");
        match channels.get_mut(channel) {
            Some(subscribers) => {
                let removed = subscribers.remove(&id).is_some();
                if subscribers.is_empty() {
                    channels.remove(channel);
                }
                removed
            }
            None => false,
        }
    }

    /// Deliver an event to every current subscriber of the channel,
    /// returning the delivered count. Subscribers whose receiver is gone
    /// are pruned.
    pub fn broadcast(&self, channel: &str, event: &JobEvent) -> usize {
        let snapshot: Vec<(SubscriberId, mpsc::UnboundedSender<JobEvent>)> = {
            let channels = self
                .channels
                .read()
                .expect("acquire shared read access on registry");
            match channels.get(channel) {
                Some(subscribers) => subscribers
                    .iter()
                    .map(|(id, tx)| (*id, tx.clone()))
                    .collect(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, tx) in snapshot {
            if tx.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(id);
            }
        }

        if !dead.is_empty() {
            let mut channels = self
                .channels
                .write()
                .expect("acquire exclusive write access on registry");
            if let Some(subscribers) = channels.get_mut(channel) {
                for id in dead {
                    subscribers.remove(&id);
                }
                if subscribers.is_empty() {
                    channels.remove(channel);
                }
            }
        }
        delivered
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.channels
            .read()
            .expect("acquire shared read access on registry")
            .get(channel)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}
