//! orgtree-core — the hierarchical admin-entity engine.
//!
//! Organizational units, computers, users and groups live as nodes in one
//! flat collection, addressed by a materialized ancestor path. The engine
//! keeps three things consistent across concurrent, partial-failure-prone
//! mutations: the tree-path invariant, the symmetric group-membership
//! relation, and the job-tracked propagation pipeline that bridges
//! synchronous requests to asynchronous policy pushes.
//!
//! Storage and the task queue are port traits (`ports`), consumed as
//! `Arc<dyn …>` so the same engine runs against Postgres
//! (`orgtree-postgres`), the in-memory store (`memory`), or test doubles.

pub mod controller;
pub mod error;
pub mod events;
pub mod jobs;
pub mod membership;
pub mod memory;
pub mod path;
pub mod ports;
pub mod principal;
pub mod queue;
pub mod tree;
pub mod types;

pub use error::{FieldError, OrgtreeError};
pub use principal::Principal;
