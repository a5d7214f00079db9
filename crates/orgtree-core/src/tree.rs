//! Tree-path integrity validation.
//!
//! A candidate node's declared `path` must be consistent with its declared
//! parent's stored path: the parent exists, and the parent's own path is
//! the candidate's path with the last element removed. The check runs on
//! every create, replace and delete of a tree entity — delete validates
//! the object as it currently stands, so a structurally inconsistent node
//! is rejected here instead of surfacing a confusing error elsewhere.

use async_trait::async_trait;
use uuid::Uuid;

use crate::controller::Validator;
use crate::error::FieldError;
use crate::path;
use crate::ports::{NodeFilter, NodeStore, Result};
use crate::types::Node;

/// Validator enforcing the materialized-path invariant.
pub struct PathIntegrity;

#[async_trait]
impl Validator for PathIntegrity {
    async fn validate(
        &self,
        store: &dyn NodeStore,
        candidate: &Node,
        previous: Option<&Node>,
        errors: &mut Vec<FieldError>,
    ) -> Result<bool> {
        // Unchanged path was already verified at a prior write.
        if let Some(previous) = previous {
            if candidate.path == previous.path {
                return Ok(true);
            }
        }

        let parent_id = path::parent_id(&candidate.path);
        if parent_id == path::ROOT_SENTINEL {
            return Ok(true);
        }

        let object_id = candidate.id.map(|id| id.to_string());

        let Ok(parent_id) = Uuid::parse_str(parent_id) else {
            errors.push(FieldError::new(
                object_id,
                "path",
                format!("parent doesn't exist {parent_id}"),
            ));
            return Ok(false);
        };

        let Some(parent) = store.find_one(&NodeFilter::by_id(parent_id)).await? else {
            errors.push(FieldError::new(
                object_id,
                "path",
                format!("parent doesn't exist {parent_id}"),
            ));
            return Ok(false);
        };

        // Guards against a parent having moved without the child being
        // re-pathed.
        if parent.path != path::parent_path(&candidate.path) {
            errors.push(FieldError::new(
                object_id,
                "path",
                format!("the parent object {parent_id} has a different path"),
            ));
            return Ok(false);
        }

        Ok(true)
    }
}
