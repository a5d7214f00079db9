//! Domain types for the node tree and its propagation jobs.
//! Pure value types — no sqlx, no DB dependencies.

// Several enums intentionally use `from_str() -> Option<Self>` instead of
// `FromStr` because they return None for unknown values rather than an error.
#![allow(clippy::should_implement_trait)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Discriminator ─────────────────────────────────────────────

/// Resource kind — discriminator for the shared node collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Root,
    Ou,
    Computer,
    User,
    Group,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Ou => "ou",
            Self::Computer => "computer",
            Self::User => "user",
            Self::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "root" => Some(Self::Root),
            "ou" => Some(Self::Ou),
            "computer" => Some(Self::Computer),
            "user" => Some(Self::User),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    /// Leaf kinds are the ones that can belong to groups.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Computer | Self::User)
    }

    /// Which side of the job contract a mutation of this kind targets.
    pub fn job_target(&self) -> JobTarget {
        match self {
            Self::Group => JobTarget::Group,
            _ => JobTarget::Node,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Node ──────────────────────────────────────────────────────

/// The universal entity stored in the flat node collection.
///
/// `path` is the materialized ancestor chain (see [`crate::path`]).
/// `memberof` is carried by leaf kinds; `members` by groups — the two ends
/// of one symmetric relation. Type-specific fields are opaque to the core
/// and ride along in `attrs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Server-assigned; `None` until the store has inserted the document.
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub memberof: Vec<Uuid>,
    #[serde(default)]
    pub members: Vec<Uuid>,
    #[serde(flatten)]
    pub attrs: serde_json::Map<String, serde_json::Value>,
}

impl Node {
    pub fn new(kind: NodeKind, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            name: name.into(),
            path: path.into(),
            memberof: Vec::new(),
            members: Vec::new(),
            attrs: serde_json::Map::new(),
        }
    }

    /// Field-level overlay used by replace: incoming known fields supersede
    /// the stored ones, incoming `attrs` keys overlay the stored map
    /// key-by-key, and stored keys the request did not carry survive.
    /// `id` and `kind` are never taken from the incoming document.
    pub fn merge_from(&mut self, incoming: &Node) {
        self.name = incoming.name.clone();
        self.path = incoming.path.clone();
        self.memberof = incoming.memberof.clone();
        self.members = incoming.members.clone();
        for (k, v) in &incoming.attrs {
            self.attrs.insert(k.clone(), v.clone());
        }
    }
}

// ── Jobs ──────────────────────────────────────────────────────

/// Target side of a propagation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTarget {
    Node,
    Group,
}

impl JobTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Node => "node",
            Self::Group => "group",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "node" => Some(Self::Node),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// The mutation that triggered a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOp {
    Created,
    Changed,
    Deleted,
}

impl JobOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Changed => "changed",
            Self::Deleted => "deleted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "changed" => Some(Self::Changed),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

/// Job lifecycle status. Transition edges are deliberately not enforced —
/// the external worker reports whatever it observes, last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Pending,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "pending" => Some(Self::Pending),
            "succeeded" => Some(Self::Succeeded),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked asynchronous propagation task, keyed by the task queue's own
/// id. Never deleted by the core — retention is an external concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "_id")]
    pub id: String,
    pub userid: String,
    pub objid: Uuid,
    #[serde(rename = "type")]
    pub target: JobTarget,
    pub op: JobOp,
    pub status: JobStatus,
    pub created: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
}

// ── Pagination ────────────────────────────────────────────────

/// Skip/limit window handed to the store. Absent means unpaginated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub limit: u64,
}

/// One page of a collection listing, in the wire envelope shape.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub pagesize: u64,
    pub pages: u64,
    pub page: u64,
    pub nodes: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── enum string round-trips ──────────────────────────────────

    #[test]
    fn node_kind_as_str_from_str() {
        for kind in [
            NodeKind::Root,
            NodeKind::Ou,
            NodeKind::Computer,
            NodeKind::User,
            NodeKind::Group,
        ] {
            assert_eq!(NodeKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(NodeKind::from_str("printer"), None);
    }

    #[test]
    fn leaf_kinds() {
        assert!(NodeKind::Computer.is_leaf());
        assert!(NodeKind::User.is_leaf());
        assert!(!NodeKind::Ou.is_leaf());
        assert!(!NodeKind::Group.is_leaf());
        assert!(!NodeKind::Root.is_leaf());
    }

    #[test]
    fn job_target_of_kind() {
        assert_eq!(NodeKind::Group.job_target(), JobTarget::Group);
        assert_eq!(NodeKind::Computer.job_target(), JobTarget::Node);
        assert_eq!(NodeKind::Ou.job_target(), JobTarget::Node);
    }

    #[test]
    fn job_status_rejects_unknown() {
        assert_eq!(JobStatus::from_str("pending"), Some(JobStatus::Pending));
        assert_eq!(JobStatus::from_str("exploded"), None);
    }

    #[test]
    fn job_op_round_trip() {
        for op in [JobOp::Created, JobOp::Changed, JobOp::Deleted] {
            assert_eq!(JobOp::from_str(op.as_str()), Some(op));
        }
    }

    // ── Node serde shape ─────────────────────────────────────────

    #[test]
    fn node_serializes_with_wire_field_names() {
        let mut node = Node::new(NodeKind::Computer, "pc-lab-1", "root");
        node.id = Some(Uuid::nil());
        node.attrs
            .insert("registry".into(), json!({"policy": "strict"}));
        let val = serde_json::to_value(&node).unwrap();
        assert_eq!(val["type"], "computer");
        assert_eq!(val["_id"], Uuid::nil().to_string());
        assert_eq!(val["registry"]["policy"], "strict");
    }

    #[test]
    fn node_deserializes_without_id_or_relations() {
        let node: Node = serde_json::from_value(json!({
            "type": "ou", "name": "Lab", "path": "root"
        }))
        .unwrap();
        assert!(node.id.is_none());
        assert!(node.memberof.is_empty());
        assert!(node.members.is_empty());
    }

    #[test]
    fn unknown_fields_land_in_attrs() {
        let node: Node = serde_json::from_value(json!({
            "type": "user", "name": "amaya", "path": "root",
            "email": "amaya@example.com"
        }))
        .unwrap();
        assert_eq!(node.attrs["email"], "amaya@example.com");
    }

    // ── merge_from ───────────────────────────────────────────────

    #[test]
    fn merge_overlays_known_fields_and_attrs() {
        let mut stored = Node::new(NodeKind::User, "amaya", "root");
        stored.id = Some(Uuid::new_v4());
        stored.attrs.insert("email".into(), json!("old@example.com"));
        stored.attrs.insert("phone".into(), json!("123"));

        let mut incoming = Node::new(NodeKind::User, "amaya-renamed", "root");
        incoming.id = Some(Uuid::new_v4());
        incoming
            .attrs
            .insert("email".into(), json!("new@example.com"));

        let stored_id = stored.id;
        stored.merge_from(&incoming);

        assert_eq!(stored.name, "amaya-renamed");
        assert_eq!(stored.attrs["email"], "new@example.com");
        // keys the request did not carry survive
        assert_eq!(stored.attrs["phone"], "123");
        // id is never taken from the incoming document
        assert_eq!(stored.id, stored_id);
    }
}
