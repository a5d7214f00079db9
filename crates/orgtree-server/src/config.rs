//! Env-driven server configuration:
//!   ORGTREE_DATABASE_URL     — Postgres connection string (required)
//!   ORGTREE_JWT_SECRET       — JWT HMAC secret (required)
//!   ORGTREE_BIND_ADDR        — listen address (default: 0.0.0.0:4200)
//!   ORGTREE_DEFAULT_PAGESIZE — collection page size (default: 30)

pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub default_pagesize: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("ORGTREE_DATABASE_URL")
                .expect("ORGTREE_DATABASE_URL must be set"),
            jwt_secret: std::env::var("ORGTREE_JWT_SECRET")
                .expect("ORGTREE_JWT_SECRET must be set"),
            bind_addr: std::env::var("ORGTREE_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:4200".into()),
            default_pagesize: std::env::var("ORGTREE_DEFAULT_PAGESIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        }
    }
}
