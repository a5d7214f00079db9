//! The CRUD engine: one controller per resource kind, orchestrating
//! input → integrity checks → persistence → membership consistency →
//! job creation and task enqueue.
//!
//! Per-kind behavior is composed from explicit capability stages
//! (`Validator`, `PreSaveHook`, `PostSaveHook`, `PreDeleteHook`) listed in
//! a [`ResourcePolicy`] — no inheritance chain; a kind supplies only the
//! stages it needs and the default for every stage is identity.
//!
//! Ordering guarantees within one request: validation strictly precedes
//! any write; persistence strictly precedes membership reconciliation;
//! reconciliation strictly precedes job creation and task enqueue. The
//! multi-step sequence is not atomic as a whole — Job records are the
//! audit trail for partial failures, not a rollback mechanism.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{FieldError, OrgtreeError};
use crate::jobs::JobTracker;
use crate::membership::{MembershipIntegrity, MembershipReconciler};
use crate::ports::{NameFilter, NodeFilter, NodeStore, Notifier, Result};
use crate::principal::Principal;
use crate::tree::PathIntegrity;
use crate::types::{JobOp, Node, NodeKind, Page, PageWindow};

// ── Capability stages ─────────────────────────────────────────

/// Which lifecycle operation a hook is running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Replace,
    Delete,
}

/// Pre-write integrity check. Pushes field-level errors and returns
/// whether the candidate passed; `Err` is reserved for store failures.
#[async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self,
        store: &dyn NodeStore,
        candidate: &Node,
        previous: Option<&Node>,
        errors: &mut Vec<FieldError>,
    ) -> Result<bool>;
}

/// Subtype-specific normalization immediately before persistence.
#[async_trait]
pub trait PreSaveHook: Send + Sync {
    async fn pre_save(
        &self,
        store: &dyn NodeStore,
        node: &mut Node,
        old: Option<&Node>,
        op: Operation,
    ) -> Result<()>;
}

/// Consistency maintenance immediately after persistence.
#[async_trait]
pub trait PostSaveHook: Send + Sync {
    async fn post_save(
        &self,
        store: &dyn NodeStore,
        node: &Node,
        old: Option<&Node>,
        op: Operation,
    ) -> Result<()>;
}

/// Runs after validation, before the document is removed.
#[async_trait]
pub trait PreDeleteHook: Send + Sync {
    async fn pre_delete(&self, store: &dyn NodeStore, node: &Node) -> Result<()>;
}

/// The ordered stage pipeline for one resource kind.
pub struct ResourcePolicy {
    pub kind: NodeKind,
    pub validators: Vec<Arc<dyn Validator>>,
    pub pre_save: Vec<Arc<dyn PreSaveHook>>,
    pub post_save: Vec<Arc<dyn PostSaveHook>>,
    pub pre_delete: Vec<Arc<dyn PreDeleteHook>>,
}

impl ResourcePolicy {
    /// No stages — every behavior is identity.
    pub fn bare(kind: NodeKind) -> Self {
        Self {
            kind,
            validators: Vec::new(),
            pre_save: Vec::new(),
            post_save: Vec::new(),
            pre_delete: Vec::new(),
        }
    }

    /// Tree entity: path integrity only. Groups use this — a group carries
    /// a path like any other node but is never reconciled as a member
    /// itself.
    pub fn tree(kind: NodeKind) -> Self {
        let mut policy = Self::bare(kind);
        policy.validators.push(Arc::new(PathIntegrity));
        policy
    }

    /// Leaf entity: path integrity, membership precondition, and the
    /// post-save membership reconciler.
    pub fn leaf(kind: NodeKind) -> Self {
        let mut policy = Self::tree(kind);
        policy.validators.push(Arc::new(MembershipIntegrity));
        policy.post_save.push(Arc::new(MembershipReconciler));
        policy
    }

    pub fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Ou | NodeKind::Group => Self::tree(kind),
            NodeKind::Computer | NodeKind::User => Self::leaf(kind),
            NodeKind::Root => Self::bare(kind),
        }
    }
}

// ── Listing parameters ────────────────────────────────────────

/// Collection-listing query: 0-based `page`, `pagesize` (`None` = the
/// configured default, `0` = unpaginated), and at most one name predicate
/// (`name` exact wins over `iname` substring when both are supplied).
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub page: u64,
    pub pagesize: Option<u64>,
    pub name: Option<String>,
    pub iname: Option<String>,
}

// ── Controller ────────────────────────────────────────────────

pub struct ResourceController {
    store: Arc<dyn NodeStore>,
    jobs: Arc<JobTracker>,
    notifier: Arc<dyn Notifier>,
    policy: ResourcePolicy,
    default_pagesize: u64,
}

impl ResourceController {
    pub fn new(
        store: Arc<dyn NodeStore>,
        jobs: Arc<JobTracker>,
        notifier: Arc<dyn Notifier>,
        policy: ResourcePolicy,
        default_pagesize: u64,
    ) -> Self {
        Self {
            store,
            jobs,
            notifier,
            policy,
            default_pagesize,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.policy.kind
    }

    fn base_filter(&self) -> NodeFilter {
        NodeFilter::kind(self.policy.kind)
    }

    fn oid_filter(&self, oid: Uuid) -> NodeFilter {
        self.base_filter().with_id(oid)
    }

    /// Paginated, filtered listing. No side effects.
    ///
    /// `pages` keeps the legacy `count / pagesize` floor — a partial final
    /// page is not counted. Unpaginated listings report one page of
    /// pagesize 1, matching the wire contract callers already depend on.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<Node>> {
        let mut filter = self.base_filter();
        if let Some(name) = &query.name {
            filter = filter.with_name(NameFilter::Exact(name.clone()));
        } else if let Some(iname) = &query.iname {
            filter = filter.with_name(NameFilter::Contains(iname.clone()));
        }

        let count = self.store.count(&filter).await?;
        let pagesize = query.pagesize.unwrap_or(self.default_pagesize);

        let (window, pages, reported_pagesize) = if pagesize > 0 {
            let window = PageWindow {
                skip: query.page * pagesize,
                limit: pagesize,
            };
            (Some(window), count / pagesize, pagesize)
        } else {
            (None, 1, 1)
        };

        let nodes = self.store.find(&filter, window).await?;
        Ok(Page {
            pagesize: reported_pagesize,
            pages,
            page: query.page,
            nodes,
        })
    }

    pub async fn get(&self, oid: Uuid) -> Result<Node> {
        self.store
            .find_one(&self.oid_filter(oid))
            .await?
            .ok_or_else(|| OrgtreeError::NotFound(format!("{} {oid}", self.policy.kind)))
    }

    async fn run_validators(
        &self,
        candidate: &Node,
        previous: Option<&Node>,
    ) -> Result<Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut ok = true;
        for validator in &self.policy.validators {
            ok &= validator
                .validate(self.store.as_ref(), candidate, previous, &mut errors)
                .await?;
        }
        if !ok && errors.is_empty() {
            errors.push(FieldError::integrity(
                candidate.id.map(|id| id.to_string()),
            ));
        }
        Ok(errors)
    }

    /// Enqueue the propagation task, then record the job under the task id
    /// the queue returned.
    async fn notify(
        &self,
        principal: &Principal,
        op: JobOp,
        new: &Node,
        old: Option<&Node>,
    ) -> Result<()> {
        let task_id = self
            .notifier
            .enqueue(op, self.policy.kind, new, old)
            .await?;
        let objid = new
            .id
            .ok_or_else(|| OrgtreeError::Internal(anyhow!("persisted node has no id")))?;
        self.jobs
            .create(
                Some(principal),
                &task_id,
                objid,
                self.policy.kind.job_target(),
                op,
            )
            .await?;
        tracing::info!(
            kind = %self.policy.kind,
            %objid,
            %task_id,
            op = op.as_str(),
            "mutation committed and propagation enqueued"
        );
        Ok(())
    }

    /// Create a new resource. Client-supplied identifiers are stripped —
    /// identifiers are server-assigned.
    pub async fn create(&self, principal: &Principal, mut input: Node) -> Result<Node> {
        input.id = None;
        input.kind = self.policy.kind;

        let errors = self.run_validators(&input, None).await?;
        if !errors.is_empty() {
            return Err(OrgtreeError::ValidationFailed(errors));
        }

        for hook in &self.policy.pre_save {
            hook.pre_save(self.store.as_ref(), &mut input, None, Operation::Create)
                .await?;
        }

        let id = self.store.insert(&input).await?;
        input.id = Some(id);

        for hook in &self.policy.post_save {
            hook.post_save(self.store.as_ref(), &input, None, Operation::Create)
                .await?;
        }

        self.notify(principal, JobOp::Created, &input, None).await?;
        Ok(input)
    }

    /// Replace an existing resource. The id in the body must equal `oid`;
    /// the check runs before any lookup. Unspecified stored fields survive
    /// via field-level merge.
    pub async fn replace(&self, principal: &Principal, oid: Uuid, input: Node) -> Result<Node> {
        match input.id {
            Some(body_id) if body_id == oid => {}
            _ => {
                return Err(OrgtreeError::PreconditionFailed(
                    "the object id is not the same as the id in the url".into(),
                ))
            }
        }

        let stored = self
            .store
            .find_one(&self.oid_filter(oid))
            .await?
            .ok_or_else(|| OrgtreeError::NotFound(format!("{} {oid}", self.policy.kind)))?;
        let old = stored.clone();

        let errors = self.run_validators(&input, Some(&stored)).await?;
        if !errors.is_empty() {
            return Err(OrgtreeError::ValidationFailed(errors));
        }

        let mut merged = stored;
        merged.merge_from(&input);

        for hook in &self.policy.pre_save {
            hook.pre_save(
                self.store.as_ref(),
                &mut merged,
                Some(&old),
                Operation::Replace,
            )
            .await?;
        }

        if !self.store.replace(oid, &merged).await? {
            // Existence was checked above; a no-op replace is a store-side
            // fault, not a missing document.
            return Err(OrgtreeError::StoreFailure(format!(
                "replace of {oid} did not take effect"
            )));
        }

        for hook in &self.policy.post_save {
            hook.post_save(self.store.as_ref(), &merged, Some(&old), Operation::Replace)
                .await?;
        }

        self.notify(principal, JobOp::Changed, &merged, Some(&old))
            .await?;
        Ok(merged)
    }

    /// Delete a resource. The object is validated as stored, so deleting a
    /// structurally inconsistent node is rejected up front.
    pub async fn delete(&self, principal: &Principal, oid: Uuid) -> Result<()> {
        let stored = self
            .store
            .find_one(&self.oid_filter(oid))
            .await?
            .ok_or_else(|| OrgtreeError::NotFound(format!("{} {oid}", self.policy.kind)))?;
        let old = stored.clone();

        let errors = self.run_validators(&stored, None).await?;
        if !errors.is_empty() {
            return Err(OrgtreeError::ValidationFailed(errors));
        }

        for hook in &self.policy.pre_delete {
            hook.pre_delete(self.store.as_ref(), &stored).await?;
        }

        if !self.store.remove(oid).await? {
            return Err(OrgtreeError::StoreFailure(format!(
                "delete of {oid} did not take effect"
            )));
        }

        for hook in &self.policy.post_save {
            hook.post_save(self.store.as_ref(), &stored, Some(&old), Operation::Delete)
                .await?;
        }

        self.notify(principal, JobOp::Deleted, &stored, None).await?;
        Ok(())
    }
}
