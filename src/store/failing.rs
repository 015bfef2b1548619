use async_trait::async_trait;
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::domain::catalog::CatalogItem;
use crate::domain::order::{AdvanceStatus, OrderError, OrderSnapshot, OrderStatus, PlaceOrder, TransitionPolicy};

/// Store whose backend is down; every call fails with a storage error.
pub struct FailingOrderStore;

fn down() -> StoreError {
    StoreError::Unavailable("connection reset by peer".to_string())
}

#[async_trait]
impl OrderStore for FailingOrderStore {
    async fn create_order(&self, _id: Uuid, _order: &PlaceOrder) -> Result<OrderSnapshot, OrderError> {
        Err(down().into())
    }

    async fn advance_status(
        &self,
        _command: &AdvanceStatus,
        _policy: TransitionPolicy,
    ) -> Result<OrderSnapshot, OrderError> {
        Err(down().into())
    }

    async fn get_order(&self, _id: Uuid) -> Result<Option<OrderSnapshot>, OrderError> {
        Err(down().into())
    }

    async fn list_orders(&self, _statuses: &[OrderStatus]) -> Result<Vec<OrderSnapshot>, OrderError> {
        Err(down().into())
    }

    async fn upsert_catalog_item(&self, _item: CatalogItem) -> Result<(), OrderError> {
        Err(down().into())
    }

    async fn delete_catalog_item(&self, _id: Uuid) -> Result<(), OrderError> {
        Err(down().into())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(down())
    }
}
