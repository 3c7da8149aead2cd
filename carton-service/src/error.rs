use shared::CartonSize;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

pub type Result<T, E = InventoryError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Carton,
    Reservation,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Account => "account",
            Entity::Carton => "carton",
            Entity::Reservation => "reservation",
        })
    }
}

/// Every failure the service reports. Whatever the variant, the surrounding
/// transaction has been rolled back by the time the caller sees it.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: Uuid },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not enough cartons of size {size} available: requested {requested}, available {available}")]
    CartonNotAvailable {
        size: CartonSize,
        requested: i32,
        available: i32,
    },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] StoreError),
}

impl InventoryError {
    pub fn not_found(entity: Entity, id: impl Into<Uuid>) -> Self {
        InventoryError::NotFound { entity, id: id.into() }
    }

    /// Stable machine-readable code for the transport layer.
    pub fn code(&self) -> &'static str {
        match self {
            InventoryError::NotFound { .. } => "E_NOT_FOUND",
            InventoryError::Forbidden(_) => "E_FORBIDDEN",
            InventoryError::CartonNotAvailable { .. } => "E_CARTON_NOT_AVAILABLE",
            InventoryError::InvalidRequest(_) => "E_INVALID_REQUEST",
            InventoryError::Conflict(_) => "E_CONFLICT",
            InventoryError::Internal(_) => "E_INTERNAL",
        }
    }
}

// Required by diesel-async's transaction error bound.
impl From<diesel::result::Error> for InventoryError {
    fn from(err: diesel::result::Error) -> Self {
        InventoryError::Internal(StoreError::Database(err))
    }
}
