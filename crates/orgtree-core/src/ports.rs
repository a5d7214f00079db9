//! Port traits consumed by the CRUD engine, implemented by storage adapters
//! (`orgtree-postgres`, the in-memory store) and by the task-queue front.
//!
//! All traits are object-safe and shared as `Arc<dyn …>` so the same engine
//! runs against Postgres, the in-memory store, or test doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OrgtreeError;
use crate::types::{Job, JobOp, JobStatus, Node, NodeKind, PageWindow};

pub type Result<T> = std::result::Result<T, OrgtreeError>;

// ── Filters ───────────────────────────────────────────────────

/// Name predicate for collection listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameFilter {
    /// Exact match (`name` query parameter).
    Exact(String),
    /// Case-insensitive substring match (`iname` query parameter).
    Contains(String),
}

/// Conjunctive node filter: every populated field must match.
/// Resource surfaces always pin `kind` to their own discriminator before
/// adding caller-supplied predicates.
#[derive(Debug, Clone, Default)]
pub struct NodeFilter {
    pub kind: Option<NodeKind>,
    pub id: Option<Uuid>,
    pub name: Option<NameFilter>,
}

impl NodeFilter {
    pub fn kind(kind: NodeKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Lookup by id only, across every kind. Tree and membership checks use
    /// this: a referenced parent or group is found wherever it lives.
    pub fn by_id(id: Uuid) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_name(mut self, name: NameFilter) -> Self {
        self.name = Some(name);
        self
    }

    /// Predicate form, used by the in-memory store.
    pub fn matches(&self, node: &Node) -> bool {
        if let Some(kind) = self.kind {
            if node.kind != kind {
                return false;
            }
        }
        if let Some(id) = self.id {
            if node.id != Some(id) {
                return false;
            }
        }
        match &self.name {
            Some(NameFilter::Exact(name)) => {
                if node.name != *name {
                    return false;
                }
            }
            Some(NameFilter::Contains(fragment)) => {
                if !node
                    .name
                    .to_lowercase()
                    .contains(&fragment.to_lowercase())
                {
                    return false;
                }
            }
            None => {}
        }
        true
    }
}

// ── Node store ────────────────────────────────────────────────

/// Thin persistence abstraction over the flat node collection.
///
/// Document-level atomicity only: each call is atomic for a single
/// document, and nothing here spans documents — the engine sequences
/// compensating operations on top.
#[async_trait]
pub trait NodeStore: Send + Sync {
    /// Filtered find, optionally windowed. Ordering is stable across calls
    /// with the same filter so pagination windows tile the result set.
    async fn find(&self, filter: &NodeFilter, window: Option<PageWindow>) -> Result<Vec<Node>>;

    async fn count(&self, filter: &NodeFilter) -> Result<u64>;

    async fn find_one(&self, filter: &NodeFilter) -> Result<Option<Node>>;

    /// Insert, assigning an id when the document carries none.
    /// A duplicate key is a `Conflict`.
    async fn insert(&self, node: &Node) -> Result<Uuid>;

    /// Full-document replace. Returns `false` when no document matched.
    async fn replace(&self, id: Uuid, node: &Node) -> Result<bool>;

    /// Returns `false` when the removal did not take effect.
    async fn remove(&self, id: Uuid) -> Result<bool>;

    /// Add `node_id` to one group's member set. A no-op when the group is
    /// gone or the id is already present — reconciliation must converge
    /// when retried.
    async fn push_member(&self, group_id: Uuid, node_id: Uuid) -> Result<()>;

    /// Remove `node_id` from one group's member set. A no-op when the
    /// group is gone or the id is absent.
    async fn pull_member(&self, group_id: Uuid, node_id: Uuid) -> Result<()>;
}

// ── Job store ─────────────────────────────────────────────────

#[async_trait]
pub trait JobStore: Send + Sync {
    /// A duplicate job id is a `Conflict`.
    async fn insert(&self, job: &Job) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Job>>;

    /// Returns `false` when the job is absent.
    async fn set_status(&self, id: &str, status: JobStatus, at: DateTime<Utc>) -> Result<bool>;
}

// ── Notification / task interface ─────────────────────────────

/// The task queue the engine enqueues propagation work on. The queue and
/// its workers are external; the whole contract is "enqueue with these
/// parameters, receive a task identifier synchronously".
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn enqueue(
        &self,
        op: JobOp,
        kind: NodeKind,
        new: &Node,
        old: Option<&Node>,
    ) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(kind: NodeKind, name: &str) -> Node {
        let mut node = Node::new(kind, name, "root");
        node.id = Some(Uuid::new_v4());
        node
    }

    #[test]
    fn filter_is_conjunctive() {
        let node = sample(NodeKind::Computer, "pc-lab-1");
        let hit = NodeFilter::kind(NodeKind::Computer).with_id(node.id.unwrap());
        let wrong_kind = NodeFilter::kind(NodeKind::User).with_id(node.id.unwrap());
        assert!(hit.matches(&node));
        assert!(!wrong_kind.matches(&node));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(NodeFilter::default().matches(&sample(NodeKind::Ou, "x")));
    }

    #[test]
    fn exact_name_is_case_sensitive() {
        let node = sample(NodeKind::User, "Amaya");
        assert!(NodeFilter::default()
            .with_name(NameFilter::Exact("Amaya".into()))
            .matches(&node));
        assert!(!NodeFilter::default()
            .with_name(NameFilter::Exact("amaya".into()))
            .matches(&node));
    }

    #[test]
    fn contains_name_is_case_insensitive_substring() {
        let node = sample(NodeKind::User, "Amaya Ito");
        assert!(NodeFilter::default()
            .with_name(NameFilter::Contains("MAYA".into()))
            .matches(&node));
        assert!(!NodeFilter::default()
            .with_name(NameFilter::Contains("zz".into()))
            .matches(&node));
    }

    #[test]
    fn by_id_ignores_kind() {
        let node = sample(NodeKind::Group, "teachers");
        assert!(NodeFilter::by_id(node.id.unwrap()).matches(&node));
    }
}
