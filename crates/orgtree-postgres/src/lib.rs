//! orgtree-postgres — PostgreSQL adapter for the orgtree-core port traits.
//!
//! Schema lives in `migrations/0001_init.sql`; apply it before pointing the
//! server at a database.

pub mod store;

pub use store::{PgJobStore, PgNodeStore, PgStores};
