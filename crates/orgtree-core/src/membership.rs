//! Group-membership consistency.
//!
//! `Group.members` and `Node.memberof` are the two ends of one symmetric
//! relation. The precondition check rejects mutations that reference
//! missing groups before anything is written; the reconciler restores the
//! symmetric invariant after persistence by applying the minimal
//! add/remove delta, one group document at a time — partial application
//! under failure is tolerated, and a retried reconcile converges because
//! the per-group updates are idempotent.

use async_trait::async_trait;
use uuid::Uuid;

use crate::controller::{Operation, PostSaveHook, Validator};
use crate::error::{FieldError, OrgtreeError};
use crate::ports::{NodeFilter, NodeStore, Result};
use crate::types::Node;

/// Computes `(to_add, to_remove)` between two membership lists,
/// preserving the order of first appearance.
pub fn membership_delta(old: &[Uuid], new: &[Uuid]) -> (Vec<Uuid>, Vec<Uuid>) {
    let adds = new.iter().filter(|g| !old.contains(g)).copied().collect();
    let removes = old.iter().filter(|g| !new.contains(g)).copied().collect();
    (adds, removes)
}

/// Precondition: every id in the declared `memberof` set references an
/// existing node. Any missing id invalidates the whole mutation before any
/// write occurs; all missing ids are reported together.
pub struct MembershipIntegrity;

#[async_trait]
impl Validator for MembershipIntegrity {
    async fn validate(
        &self,
        store: &dyn NodeStore,
        candidate: &Node,
        _previous: Option<&Node>,
        errors: &mut Vec<FieldError>,
    ) -> Result<bool> {
        let mut ok = true;
        for group_id in &candidate.memberof {
            if store
                .find_one(&NodeFilter::by_id(*group_id))
                .await?
                .is_none()
            {
                errors.push(FieldError::new(
                    candidate.id.map(|id| id.to_string()),
                    "memberof",
                    format!("the group {group_id} doesn't exist"),
                ));
                ok = false;
            }
        }
        Ok(ok)
    }
}

/// Post-persistence reconciler for leaf entities. Never registered for
/// group documents themselves.
pub struct MembershipReconciler;

#[async_trait]
impl PostSaveHook for MembershipReconciler {
    async fn post_save(
        &self,
        store: &dyn NodeStore,
        node: &Node,
        old: Option<&Node>,
        op: Operation,
    ) -> Result<()> {
        // A deleted node belongs to no group.
        let new_memberof: &[Uuid] = match op {
            Operation::Delete => &[],
            _ => &node.memberof,
        };
        let old_memberof: &[Uuid] = old.map(|o| o.memberof.as_slice()).unwrap_or(&[]);

        let (adds, removes) = membership_delta(old_memberof, new_memberof);
        if adds.is_empty() && removes.is_empty() {
            return Ok(());
        }

        let node_id = node.id.ok_or_else(|| {
            OrgtreeError::PreconditionFailed("cannot reconcile membership of an unsaved node".into())
        })?;

        // One group document per update; removes first, mirroring the
        // wire-level $pull/$push sequencing.
        for group_id in removes {
            store.pull_member(group_id, node_id).await?;
        }
        for group_id in adds {
            store.push_member(group_id, node_id).await?;
        }
        Ok(())
    }
}
