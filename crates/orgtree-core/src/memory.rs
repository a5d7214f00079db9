//! In-memory persistence for nodes and jobs.
//!
//! `MemoryStore` supports usage in asynchronous and multi-threaded contexts
//! by wrapping the maps with an `RwLock` and `Arc`. It backs the engine's
//! own tests and single-process deployments; production deployments use
//! the Postgres adapter.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OrgtreeError;
use crate::ports::{JobStore, NodeFilter, NodeStore, Result};
use crate::types::{Job, JobStatus, Node, PageWindow};

#[derive(Debug, Default)]
struct InnerMemoryStore {
    nodes: HashMap<Uuid, Node>,
    jobs: HashMap<String, Job>,
}

/// An in-memory store implementing both [`NodeStore`] and [`JobStore`].
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<InnerMemoryStore>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    /// Stable listing order: by name, then id. Pagination windows must tile
    /// the result set across separate calls.
    fn sorted_matches(&self, filter: &NodeFilter) -> Vec<Node> {
        let store = self.read_store();
        let mut nodes: Vec<Node> = store
            .nodes
            .values()
            .filter(|n| filter.matches(n))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        nodes
    }
}

#[async_trait]
impl NodeStore for MemoryStore {
    async fn find(&self, filter: &NodeFilter, window: Option<PageWindow>) -> Result<Vec<Node>> {
        let nodes = self.sorted_matches(filter);
        Ok(match window {
            Some(w) => nodes
                .into_iter()
                .skip(w.skip as usize)
                .take(w.limit as usize)
                .collect(),
            None => nodes,
        })
    }

    async fn count(&self, filter: &NodeFilter) -> Result<u64> {
        let store = self.read_store();
        Ok(store.nodes.values().filter(|n| filter.matches(n)).count() as u64)
    }

    async fn find_one(&self, filter: &NodeFilter) -> Result<Option<Node>> {
        // Point lookups skip the sort.
        if let Some(id) = filter.id {
            let store = self.read_store();
            return Ok(store.nodes.get(&id).filter(|n| filter.matches(n)).cloned());
        }
        Ok(self.sorted_matches(filter).into_iter().next())
    }

    async fn insert(&self, node: &Node) -> Result<Uuid> {
        let mut store = self.write_store();
        let id = node.id.unwrap_or_else(Uuid::new_v4);
        if store.nodes.contains_key(&id) {
            return Err(OrgtreeError::Conflict(format!(
                "the object already exists: {id}"
            )));
        }
        let mut node = node.clone();
        node.id = Some(id);
        store.nodes.insert(id, node);
        Ok(id)
    }

    async fn replace(&self, id: Uuid, node: &Node) -> Result<bool> {
        let mut store = self.write_store();
        if !store.nodes.contains_key(&id) {
            return Ok(false);
        }
        let mut node = node.clone();
        node.id = Some(id);
        store.nodes.insert(id, node);
        Ok(true)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        Ok(self.write_store().nodes.remove(&id).is_some())
    }

    async fn push_member(&self, group_id: Uuid, node_id: Uuid) -> Result<()> {
        let mut store = self.write_store();
        if let Some(group) = store.nodes.get_mut(&group_id) {
            if !group.members.contains(&node_id) {
                group.members.push(node_id);
            }
        }
        Ok(())
    }

    async fn pull_member(&self, group_id: Uuid, node_id: Uuid) -> Result<()> {
        let mut store = self.write_store();
        if let Some(group) = store.nodes.get_mut(&group_id) {
            group.members.retain(|m| *m != node_id);
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let mut store = self.write_store();
        if store.jobs.contains_key(&job.id) {
            return Err(OrgtreeError::Conflict(format!(
                "job {} already exists",
                job.id
            )));
        }
        store.jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.read_store().jobs.get(id).cloned())
    }

    async fn set_status(&self, id: &str, status: JobStatus, at: DateTime<Utc>) -> Result<bool> {
        let mut store = self.write_store();
        match store.jobs.get_mut(id) {
            Some(job) => {
                job.status = status;
                job.last_update = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
