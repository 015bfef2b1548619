use std::collections::BTreeMap;

use uuid::Uuid;

use super::value_objects::OrderStatus;
use crate::store::StoreError;

// ============================================================================
// Order Errors
// ============================================================================

/// Field name → human readable problems with that field.
pub type FieldIssues = BTreeMap<String, Vec<String>>;

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid order data")]
    Validation(FieldIssues),

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Items unavailable or unknown: {0:?}")]
    ItemUnavailable(Vec<Uuid>),

    #[error("Unknown order status: {0}")]
    InvalidStatus(String),

    #[error("Cannot move order from {from} back to {to}")]
    BackwardTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Catalog item not found: {0}")]
    ItemNotFound(Uuid),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage failure")]
    Storage(#[from] StoreError),
}

impl OrderError {
    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation",
            OrderError::EmptyOrder => "empty_order",
            OrderError::ItemUnavailable(_) => "item_unavailable",
            OrderError::InvalidStatus(_) => "invalid_status",
            OrderError::BackwardTransition { .. } => "backward_transition",
            OrderError::NotFound(_) => "not_found",
            OrderError::ItemNotFound(_) => "item_not_found",
            OrderError::Conflict(_) => "conflict",
            OrderError::Storage(_) => "storage",
        }
    }
}
