//! Process-wide tracking of outstanding asynchronous propagation jobs.
//!
//! One job per committed mutation, keyed by the task queue's own id — the
//! queue is the source of the identifier, so a duplicate `create` indicates
//! a retried enqueue and must not silently duplicate tracking state.
//! Every operation is gated by a permission check keyed on the identifier
//! before any lookup; the concrete authorization rule is an external
//! collaborator's responsibility, so the gate only requires an
//! authenticated caller.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::OrgtreeError;
use crate::ports::{JobStore, Result};
use crate::principal::Principal;
use crate::types::{Job, JobOp, JobStatus, JobTarget};

pub struct JobTracker {
    store: Arc<dyn JobStore>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    // TODO: per-job ownership rule once the authorization collaborator
    // exposes one; today any authenticated caller passes.
    fn check_permissions(&self, principal: Option<&Principal>, _job_id: &str) -> bool {
        principal.is_some()
    }

    fn assert_permissions<'p>(
        &self,
        principal: Option<&'p Principal>,
        job_id: &str,
    ) -> Result<&'p Principal> {
        match principal {
            Some(p) if self.check_permissions(principal, job_id) => Ok(p),
            _ => Err(OrgtreeError::Forbidden(format!(
                "job operation on {job_id} requires an authenticated caller"
            ))),
        }
    }

    /// Record a freshly enqueued task. Jobs start in `created`.
    ///
    /// Missing required parameters and an id collision fail with distinct
    /// errors: `PreconditionFailed` versus `Conflict`.
    pub async fn create(
        &self,
        principal: Option<&Principal>,
        job_id: &str,
        objid: Uuid,
        target: JobTarget,
        op: JobOp,
    ) -> Result<Job> {
        let principal = self.assert_permissions(principal, job_id)?;

        if job_id.is_empty() {
            return Err(OrgtreeError::PreconditionFailed(
                "job id is required".into(),
            ));
        }

        if self.store.get(job_id).await?.is_some() {
            return Err(OrgtreeError::Conflict(format!(
                "job {job_id} already exists"
            )));
        }

        let now = Utc::now();
        let job = Job {
            id: job_id.to_string(),
            userid: principal.actor_id.clone(),
            objid,
            target,
            op,
            status: JobStatus::Created,
            created: now,
            last_update: now,
        };
        self.store.insert(&job).await?;
        tracing::debug!(job_id, op = op.as_str(), "job recorded");
        Ok(job)
    }

    /// Apply a status report from the external worker.
    ///
    /// The status value is validated before the job is looked up; an
    /// unrecognized value leaves the stored job untouched. Transition edges
    /// are not enforced — any recognized status may follow any other.
    pub async fn update_status(
        &self,
        principal: Option<&Principal>,
        job_id: &str,
        status: &str,
    ) -> Result<Job> {
        self.assert_permissions(principal, job_id)?;

        let status = JobStatus::from_str(status).ok_or_else(|| {
            OrgtreeError::PreconditionFailed(format!("unrecognized job status: {status}"))
        })?;

        let Some(mut job) = self.store.get(job_id).await? else {
            return Err(OrgtreeError::NotFound(format!("job {job_id}")));
        };

        let now = Utc::now();
        if !self.store.set_status(job_id, status, now).await? {
            return Err(OrgtreeError::NotFound(format!("job {job_id}")));
        }
        job.status = status;
        job.last_update = now;
        Ok(job)
    }

    pub async fn get(&self, principal: Option<&Principal>, job_id: &str) -> Result<Job> {
        self.assert_permissions(principal, job_id)?;
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| OrgtreeError::NotFound(format!("job {job_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn tracker() -> JobTracker {
        JobTracker::new(Arc::new(MemoryStore::new()))
    }

    fn alice() -> Principal {
        Principal::in_process("alice", vec!["admin".into()])
    }

    #[tokio::test]
    async fn create_records_a_created_job() {
        let tracker = tracker();
        let objid = Uuid::new_v4();
        let job = tracker
            .create(Some(&alice()), "task-1", objid, JobTarget::Node, JobOp::Created)
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Created);
        assert_eq!(job.userid, "alice");
        assert_eq!(job.objid, objid);
        assert_eq!(job.created, job.last_update);
    }

    #[tokio::test]
    async fn create_twice_is_conflict_and_leaves_first_job_unchanged() {
        let tracker = tracker();
        let alice = alice();
        let first = tracker
            .create(Some(&alice), "task-1", Uuid::new_v4(), JobTarget::Node, JobOp::Created)
            .await
            .unwrap();

        let err = tracker
            .create(Some(&alice), "task-1", Uuid::new_v4(), JobTarget::Group, JobOp::Deleted)
            .await
            .unwrap_err();
        assert!(matches!(err, OrgtreeError::Conflict(_)));

        let stored = tracker.get(Some(&alice), "task-1").await.unwrap();
        assert_eq!(stored.objid, first.objid);
        assert_eq!(stored.op, JobOp::Created);
    }

    #[tokio::test]
    async fn create_with_empty_id_is_precondition_failure() {
        let err = tracker()
            .create(Some(&alice()), "", Uuid::new_v4(), JobTarget::Node, JobOp::Created)
            .await
            .unwrap_err();
        assert!(matches!(err, OrgtreeError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn anonymous_caller_is_rejected_before_any_lookup() {
        let tracker = tracker();
        for result in [
            tracker
                .create(None, "task-1", Uuid::new_v4(), JobTarget::Node, JobOp::Created)
                .await
                .err(),
            tracker.get(None, "task-1").await.err(),
            tracker.update_status(None, "task-1", "pending").await.err(),
        ] {
            assert!(matches!(result, Some(OrgtreeError::Forbidden(_))));
        }
    }

    #[tokio::test]
    async fn update_status_refreshes_last_update() {
        let tracker = tracker();
        let alice = alice();
        let job = tracker
            .create(Some(&alice), "task-1", Uuid::new_v4(), JobTarget::Node, JobOp::Changed)
            .await
            .unwrap();

        let updated = tracker
            .update_status(Some(&alice), "task-1", "succeeded")
            .await
            .unwrap();
        assert_eq!(updated.status, JobStatus::Succeeded);
        assert!(updated.last_update >= job.last_update);
    }

    #[tokio::test]
    async fn unrecognized_status_is_rejected_and_job_unchanged() {
        let tracker = tracker();
        let alice = alice();
        tracker
            .create(Some(&alice), "task-1", Uuid::new_v4(), JobTarget::Node, JobOp::Created)
            .await
            .unwrap();

        let err = tracker
            .update_status(Some(&alice), "task-1", "exploded")
            .await
            .unwrap_err();
        assert!(matches!(err, OrgtreeError::PreconditionFailed(_)));

        let stored = tracker.get(Some(&alice), "task-1").await.unwrap();
        assert_eq!(stored.status, JobStatus::Created);
    }

    #[tokio::test]
    async fn invalid_status_is_reported_even_when_job_is_missing() {
        // Status recognition is checked before existence.
        let err = tracker()
            .update_status(Some(&alice()), "task-404", "exploded")
            .await
            .unwrap_err();
        assert!(matches!(err, OrgtreeError::PreconditionFailed(_)));
    }

    #[tokio::test]
    async fn update_status_of_missing_job_is_not_found() {
        let err = tracker()
            .update_status(Some(&alice()), "task-404", "pending")
            .await
            .unwrap_err();
        assert!(matches!(err, OrgtreeError::NotFound(_)));
    }

    #[tokio::test]
    async fn transition_edges_are_not_enforced() {
        let tracker = tracker();
        let alice = alice();
        tracker
            .create(Some(&alice), "task-1", Uuid::new_v4(), JobTarget::Node, JobOp::Created)
            .await
            .unwrap();
        for status in ["succeeded", "pending", "failed", "created"] {
            tracker
                .update_status(Some(&alice), "task-1", status)
                .await
                .unwrap();
        }
        let stored = tracker.get(Some(&alice), "task-1").await.unwrap();
        assert_eq!(stored.status, JobStatus::Created);
    }

    #[tokio::test]
    async fn get_missing_job_is_not_found() {
        let err = tracker().get(Some(&alice()), "task-404").await.unwrap_err();
        assert!(matches!(err, OrgtreeError::NotFound(_)));
    }
}
