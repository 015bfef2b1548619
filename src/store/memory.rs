use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::{OrderStore, StoreError};
use crate::domain::catalog::CatalogItem;
use crate::domain::order::{
    AdvanceStatus, OrderCode, OrderError, OrderSnapshot, OrderStatus, PlaceOrder, TransitionPolicy,
};

// ============================================================================
// In-memory Order Store
// ============================================================================
//
// Lock order is always catalog -> index -> order. Each order sits behind its
// own mutex, so transitions on different orders run in parallel while two
// transitions on the same order queue up.
//
// ============================================================================

#[derive(Default)]
struct OrderIndex {
    by_id: HashMap<Uuid, Arc<Mutex<OrderSnapshot>>>,
    codes: HashSet<OrderCode>,
    /// catalog item id -> number of order lines referencing it
    item_refs: HashMap<Uuid, usize>,
}

#[derive(Default)]
pub struct InMemoryOrderStore {
    catalog: RwLock<HashMap<Uuid, CatalogItem>>,
    index: RwLock<OrderIndex>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_catalog(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let store = Self::new();
        {
            let mut catalog = store.catalog.write().await;
            for item in items {
                catalog.insert(item.id, item);
            }
        }
        store
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(&self, id: Uuid, order: &PlaceOrder) -> Result<OrderSnapshot, OrderError> {
        // Held until the order is indexed so availability cannot change
        // between pricing and insertion.
        let catalog = self.catalog.read().await;
        let priced = order.price(&catalog)?;

        let mut index = self.index.write().await;
        let mut code = OrderCode::generate();
        while index.codes.contains(&code) {
            code = OrderCode::generate();
        }

        let snapshot = OrderSnapshot::open(id, code.clone(), priced, Utc::now());
        for line in &snapshot.items {
            *index.item_refs.entry(line.item_id).or_default() += 1;
        }
        index.codes.insert(code);
        index
            .by_id
            .insert(snapshot.id, Arc::new(Mutex::new(snapshot.clone())));

        Ok(snapshot)
    }

    async fn advance_status(
        &self,
        command: &AdvanceStatus,
        policy: TransitionPolicy,
    ) -> Result<OrderSnapshot, OrderError> {
        let handle = self
            .index
            .read()
            .await
            .by_id
            .get(&command.order_id)
            .cloned()
            .ok_or(OrderError::NotFound(command.order_id))?;

        let mut order = handle.lock().await;
        let record = order.plan_transition(command, policy, Utc::now())?;
        order.apply_transition(record);
        Ok(order.clone())
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<OrderSnapshot>, OrderError> {
        let handle = self.index.read().await.by_id.get(&id).cloned();
        match handle {
            Some(handle) => Ok(Some(handle.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderSnapshot>, OrderError> {
        let handles: Vec<_> = self.index.read().await.by_id.values().cloned().collect();

        let mut orders = Vec::with_capacity(handles.len());
        for handle in handles {
            let order = handle.lock().await;
            if statuses.is_empty() || statuses.contains(&order.status) {
                orders.push(order.clone());
            }
        }
        orders.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(orders)
    }

    async fn upsert_catalog_item(&self, item: CatalogItem) -> Result<(), OrderError> {
        self.catalog.write().await.insert(item.id, item);
        Ok(())
    }

    async fn delete_catalog_item(&self, id: Uuid) -> Result<(), OrderError> {
        let mut catalog = self.catalog.write().await;
        if !catalog.contains_key(&id) {
            return Err(OrderError::ItemNotFound(id));
        }

        let index = self.index.read().await;
        if index.item_refs.get(&id).copied().unwrap_or(0) > 0 {
            return Err(OrderError::Conflict(format!(
                "catalog item {id} is referenced by existing orders"
            )));
        }

        catalog.remove(&id);
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
