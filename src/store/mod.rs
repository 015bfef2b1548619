// ============================================================================
// Order Store - persistence boundary for orders, audit trail and catalog
// ============================================================================
//
// Every implementation must serialize writers per order: the second of two
// concurrent `advance_status` calls observes the first one's committed status
// as its `previous_status`. Status and audit entry are written together or
// not at all.
//
// ============================================================================

mod memory;
mod postgres;
#[cfg(test)]
pub(crate) mod failing;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::catalog::CatalogItem;
use crate::domain::order::{AdvanceStatus, OrderError, OrderSnapshot, OrderStatus, PlaceOrder, TransitionPolicy};

pub use memory::InMemoryOrderStore;
pub use postgres::{connect_postgres, PostgresOrderStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt stored data: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Prices `order` against the catalog and persists it under `id` with its
    /// anchor audit entry, in one transaction.
    async fn create_order(&self, id: Uuid, order: &PlaceOrder) -> Result<OrderSnapshot, OrderError>;

    /// Applies `command` under the order's lock and returns the hydrated
    /// snapshot including the new audit entry.
    async fn advance_status(
        &self,
        command: &AdvanceStatus,
        policy: TransitionPolicy,
    ) -> Result<OrderSnapshot, OrderError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<OrderSnapshot>, OrderError>;

    /// Orders whose status is in `statuses` (all when empty), newest first.
    async fn list_orders(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderSnapshot>, OrderError>;

    async fn upsert_catalog_item(&self, item: CatalogItem) -> Result<(), OrderError>;

    /// Fails with `Conflict` while any order line references the item.
    async fn delete_catalog_item(&self, id: Uuid) -> Result<(), OrderError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
