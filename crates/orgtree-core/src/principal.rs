use std::collections::HashMap;

use uuid::Uuid;

use crate::error::OrgtreeError;

/// Caller identity, carried explicitly into every mutation and job
/// operation. There is no implicit or thread-local identity anywhere in the
/// codebase.
#[derive(Debug, Clone)]
pub struct Principal {
    pub actor_id: String,
    pub roles: Vec<String>,
    pub claims: HashMap<String, String>,
    /// Ids of the organizational units this caller is scoped to. Carried as
    /// data only — the subtree filter computed from it belongs to an
    /// external collaborator.
    pub ou_scope: Vec<Uuid>,
}

impl Principal {
    /// Construct from validated JWT claims at the server boundary.
    /// The server middleware calls this; core logic never reads raw tokens.
    pub fn from_jwt_claims(claims: &JwtClaims) -> Result<Self, OrgtreeError> {
        let actor_id = claims
            .sub
            .clone()
            .ok_or_else(|| OrgtreeError::Forbidden("missing sub claim".into()))?;
        Ok(Self {
            actor_id,
            roles: claims.roles.clone().unwrap_or_default(),
            claims: claims.extra.clone().unwrap_or_default(),
            ou_scope: Vec::new(),
        })
    }

    /// Construct explicitly for in-process callers and tests.
    pub fn in_process(actor_id: impl Into<String>, roles: Vec<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            roles,
            claims: HashMap::new(),
            ou_scope: Vec::new(),
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

/// JWT claims shape expected from the identity provider.
/// Deserialized by the server JWT middleware.
#[derive(Debug, serde::Deserialize)]
pub struct JwtClaims {
    pub sub: Option<String>,
    pub roles: Option<Vec<String>>,
    pub exp: Option<usize>,
    #[serde(flatten)]
    pub extra: Option<HashMap<String, String>>,
}
