use thiserror::Error;

/// Error taxonomy for every layer of the tree engine.
///
/// Validation failures are values, not unwinding — the controller
/// accumulates `FieldError`s and returns them in one `ValidationFailed`,
/// while store-level and authorization errors terminate the request
/// immediately.
#[derive(Debug, Error)]
pub enum OrgtreeError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {} field error(s)", .0.len())]
    ValidationFailed(Vec<FieldError>),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The store acknowledged that a write did not take effect after its
    /// precondition had already been checked (e.g. a delete removed zero
    /// documents). Distinct from `NotFound`.
    #[error("store failure: {0}")]
    StoreFailure(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl OrgtreeError {
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::ValidationFailed(_) => 422,
            Self::Conflict(_) => 409,
            Self::Forbidden(_) => 403,
            Self::PreconditionFailed(_) => 400,
            Self::StoreFailure(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}

/// One field-level integrity error, as accumulated during validation.
#[derive(Debug, Clone, serde::Serialize)]
pub struct FieldError {
    /// Id of the object the error refers to, when it has one.
    pub object_id: Option<String>,
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(
        object_id: Option<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            object_id,
            field: field.into(),
            message: message.into(),
        }
    }

    /// The catch-all pushed when a validator rejects without naming a field.
    pub fn integrity(object_id: Option<String>) -> Self {
        Self::new(object_id, "object", "integrity error")
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.object_id {
            Some(id) => write!(f, "[{}] {}: {}", id, self.field, self.message),
            None => write!(f, "{}: {}", self.field, self.message),
        }
    }
}
