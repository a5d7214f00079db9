//! Postgres implementations of the orgtree-core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid a compile-time DB requirement.
//! Nodes are stored as a jsonb document plus extracted filter columns; the
//! document is the source of truth and the columns follow it on every
//! write.

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use orgtree_core::error::OrgtreeError;
use orgtree_core::ports::{JobStore, NameFilter, NodeFilter, NodeStore, Result};
use orgtree_core::types::{Job, JobOp, JobStatus, JobTarget, Node, PageWindow};

/// Map a unique-violation to `Conflict`; anything else is internal.
fn conflict_on_unique(e: sqlx::Error, conflict: impl FnOnce() -> String) -> OrgtreeError {
    match &e {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            OrgtreeError::Conflict(conflict())
        }
        _ => OrgtreeError::Internal(anyhow!(e)),
    }
}

/// Escape LIKE metacharacters in a user-supplied fragment.
fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn decode_node(doc: serde_json::Value) -> Result<Node> {
    serde_json::from_value(doc).map_err(|e| OrgtreeError::Internal(anyhow!(e)))
}

// ── PgNodeStore ───────────────────────────────────────────────

pub struct PgNodeStore {
    pool: PgPool,
}

impl PgNodeStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, filter: &NodeFilter) {
        if let Some(kind) = filter.kind {
            qb.push(" AND kind = ").push_bind(kind.as_str());
        }
        if let Some(id) = filter.id {
            qb.push(" AND id = ").push_bind(id);
        }
        match &filter.name {
            Some(NameFilter::Exact(name)) => {
                qb.push(" AND name = ").push_bind(name.clone());
            }
            Some(NameFilter::Contains(fragment)) => {
                qb.push(" AND name ILIKE ")
                    .push_bind(format!("%{}%", escape_like(fragment)));
            }
            None => {}
        }
    }
}

#[async_trait]
impl NodeStore for PgNodeStore {
    async fn find(&self, filter: &NodeFilter, window: Option<PageWindow>) -> Result<Vec<Node>> {
        let mut qb = QueryBuilder::new("SELECT doc FROM nodes WHERE true");
        Self::push_filter(&mut qb, filter);
        qb.push(" ORDER BY name, id");
        if let Some(window) = window {
            qb.push(" LIMIT ")
                .push_bind(window.limit as i64)
                .push(" OFFSET ")
                .push_bind(window.skip as i64);
        }
        let docs: Vec<serde_json::Value> = qb
            .build_query_scalar()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        docs.into_iter().map(decode_node).collect()
    }

    async fn count(&self, filter: &NodeFilter) -> Result<u64> {
        let mut qb = QueryBuilder::new("SELECT count(*) FROM nodes WHERE true");
        Self::push_filter(&mut qb, filter);
        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(count as u64)
    }

    async fn find_one(&self, filter: &NodeFilter) -> Result<Option<Node>> {
        let mut qb = QueryBuilder::new("SELECT doc FROM nodes WHERE true");
        Self::push_filter(&mut qb, filter);
        qb.push(" LIMIT 1");
        let doc: Option<serde_json::Value> = qb
            .build_query_scalar()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        doc.map(decode_node).transpose()
    }

    async fn insert(&self, node: &Node) -> Result<Uuid> {
        let id = node.id.unwrap_or_else(Uuid::new_v4);
        let mut node = node.clone();
        node.id = Some(id);
        let doc = serde_json::to_value(&node).map_err(|e| anyhow!(e))?;
        sqlx::query("INSERT INTO nodes (id, kind, name, path, doc) VALUES ($1, $2, $3, $4, $5)")
            .bind(id)
            .bind(node.kind.as_str())
            .bind(&node.name)
            .bind(&node.path)
            .bind(&doc)
            .execute(&self.pool)
            .await
            .map_err(|e| conflict_on_unique(e, || format!("the object already exists: {id}")))?;
        tracing::debug!(%id, kind = node.kind.as_str(), "node inserted");
        Ok(id)
    }

    async fn replace(&self, id: Uuid, node: &Node) -> Result<bool> {
        let mut node = node.clone();
        node.id = Some(id);
        let doc = serde_json::to_value(&node).map_err(|e| anyhow!(e))?;
        let result =
            sqlx::query("UPDATE nodes SET kind = $2, name = $3, path = $4, doc = $5 WHERE id = $1")
                .bind(id)
                .bind(node.kind.as_str())
                .bind(&node.name)
                .bind(&node.path)
                .bind(&doc)
                .execute(&self.pool)
                .await
                .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn push_member(&self, group_id: Uuid, node_id: Uuid) -> Result<()> {
        // Containment guard keeps the member list a set, so a retried
        // reconcile converges. Missing group rows are a no-op.
        sqlx::query(
            r#"
            UPDATE nodes
            SET doc = jsonb_set(
                doc, '{members}',
                coalesce(doc->'members', '[]'::jsonb) || to_jsonb($2::text)
            )
            WHERE id = $1
              AND NOT coalesce(doc->'members', '[]'::jsonb) @> to_jsonb($2::text)
            "#,
        )
        .bind(group_id)
        .bind(node_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }

    async fn pull_member(&self, group_id: Uuid, node_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE nodes
            SET doc = jsonb_set(
                doc, '{members}',
                coalesce(doc->'members', '[]'::jsonb) - $2::text
            )
            WHERE id = $1
            "#,
        )
        .bind(group_id)
        .bind(node_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        Ok(())
    }
}

// ── PgJobStore ────────────────────────────────────────────────

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PgJobRow {
    id: String,
    userid: String,
    objid: Uuid,
    target: String,
    op: String,
    status: String,
    created: DateTime<Utc>,
    last_update: DateTime<Utc>,
}

impl TryFrom<PgJobRow> for Job {
    type Error = String;

    fn try_from(row: PgJobRow) -> std::result::Result<Self, String> {
        Ok(Job {
            target: JobTarget::from_str(&row.target)
                .ok_or_else(|| format!("unknown job target: {}", row.target))?,
            op: JobOp::from_str(&row.op).ok_or_else(|| format!("unknown job op: {}", row.op))?,
            status: JobStatus::from_str(&row.status)
                .ok_or_else(|| format!("unknown job status: {}", row.status))?,
            id: row.id,
            userid: row.userid,
            objid: row.objid,
            created: row.created,
            last_update: row.last_update,
        })
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (id, userid, objid, target, op, status, created, last_update)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&job.id)
        .bind(&job.userid)
        .bind(job.objid)
        .bind(job.target.as_str())
        .bind(job.op.as_str())
        .bind(job.status.as_str())
        .bind(job.created)
        .bind(job.last_update)
        .execute(&self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, || format!("job {} already exists", job.id)))?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, PgJobRow>(
            "SELECT id, userid, objid, target, op, status, created, last_update \
             FROM jobs WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| anyhow!(e))?;
        row.map(|r| {
            r.try_into()
                .map_err(|e: String| OrgtreeError::Internal(anyhow!(e)))
        })
        .transpose()
    }

    async fn set_status(&self, id: &str, status: JobStatus, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE jobs SET status = $2, last_update = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| anyhow!(e))?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Bundle ────────────────────────────────────────────────────

/// All adapters over one pool, for one-line wiring at startup.
pub struct PgStores {
    pub nodes: PgNodeStore,
    pub jobs: PgJobStore,
}

impl PgStores {
    pub fn new(pool: PgPool) -> Self {
        Self {
            nodes: PgNodeStore::new(pool.clone()),
            jobs: PgJobStore::new(pool),
        }
    }
}
