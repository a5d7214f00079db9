//! Shared application state: one controller per resource kind over the
//! same stores, the job tracker, and the status fan-out registry.

use std::sync::Arc;

use orgtree_core::controller::{ResourceController, ResourcePolicy};
use orgtree_core::events::ChannelRegistry;
use orgtree_core::jobs::JobTracker;
use orgtree_core::ports::{JobStore, NodeStore, Notifier};
use orgtree_core::types::NodeKind;

#[derive(Clone)]
pub struct AppState {
    pub ous: Arc<ResourceController>,
    pub computers: Arc<ResourceController>,
    pub users: Arc<ResourceController>,
    pub groups: Arc<ResourceController>,
    pub jobs: Arc<JobTracker>,
    pub events: Arc<ChannelRegistry>,
}

impl AppState {
    pub fn new(
        nodes: Arc<dyn NodeStore>,
        job_store: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
        default_pagesize: u64,
    ) -> Self {
        let jobs = Arc::new(JobTracker::new(job_store));
        let controller = |kind: NodeKind| {
            Arc::new(ResourceController::new(
                nodes.clone(),
                jobs.clone(),
                notifier.clone(),
                ResourcePolicy::for_kind(kind),
                default_pagesize,
            ))
        };
        Self {
            ous: controller(NodeKind::Ou),
            computers: controller(NodeKind::Computer),
            users: controller(NodeKind::User),
            groups: controller(NodeKind::Group),
            jobs,
            events: Arc::new(ChannelRegistry::new()),
        }
    }
}
