use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::broadcast::{Broadcaster, Subscription};
use crate::domain::catalog::CatalogItem;
use crate::metrics::Metrics;
use crate::store::OrderStore;

use super::aggregate::OrderSnapshot;
use super::commands::{AdvanceStatus, PlaceOrder};
use super::errors::OrderError;
use super::events::OrderEvent;
use super::value_objects::{OrderStatus, TransitionPolicy};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Store (atomic write + audit entry) → Broadcaster
//
// Events are published only after the store returned the committed snapshot.
// Commit and publish for one order happen under the same `OrderLocks` stripe,
// so subscribers see each order's versions in commit order.
// Nothing here retries: a failed call leaves the order exactly as it was.
//
// ============================================================================

const LOCK_STRIPES: usize = 64;

/// Fixed set of mutexes keyed by order id. Two orders may share a stripe;
/// one order always maps to the same one.
struct OrderLocks {
    stripes: Vec<Mutex<()>>,
}

impl OrderLocks {
    fn new(count: usize) -> Self {
        Self {
            stripes: (0..count.max(1)).map(|_| Mutex::new(())).collect(),
        }
    }

    async fn lock(&self, order_id: Uuid) -> MutexGuard<'_, ()> {
        let slot = (order_id.as_u128() % self.stripes.len() as u128) as usize;
        self.stripes[slot].lock().await
    }
}

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    broadcaster: Broadcaster,
    policy: TransitionPolicy,
    metrics: Arc<Metrics>,
    locks: Arc<OrderLocks>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        broadcaster: Broadcaster,
        policy: TransitionPolicy,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            broadcaster,
            policy,
            metrics,
            locks: Arc::new(OrderLocks::new(LOCK_STRIPES)),
        }
    }

    /// Validates, prices and persists a new order, then announces it.
    pub async fn create(&self, command: PlaceOrder) -> Result<OrderSnapshot, OrderError> {
        let command = command
            .normalized()
            .inspect_err(|e| self.reject("create", e))?;

        // The id is assigned here so the stripe is held before the order is
        // visible to anyone else.
        let order_id = Uuid::now_v7();
        let _guard = self.locks.lock(order_id).await;

        let started = Instant::now();
        let result = self.store.create_order(order_id, &command).await;
        self.metrics.observe_store("create", started.elapsed().as_secs_f64());
        let order = result.inspect_err(|e| self.reject("create", e))?;

        self.metrics.orders_created.inc();
        tracing::info!(
            order_id = %order.id,
            code = %order.code,
            total = %order.total,
            items = order.items.len(),
            "Order created"
        );

        self.broadcaster.publish(OrderEvent::Created(order.clone()));
        Ok(order)
    }

    /// Moves an order to the requested status and announces the new snapshot.
    pub async fn advance(&self, command: AdvanceStatus) -> Result<OrderSnapshot, OrderError> {
        let _guard = self.locks.lock(command.order_id).await;

        let started = Instant::now();
        let result = self.store.advance_status(&command, self.policy).await;
        self.metrics.observe_store("advance", started.elapsed().as_secs_f64());
        let order = result.inspect_err(|e| self.reject("advance", e))?;

        // The entry just appended is the one this call produced.
        if let Some(entry) = order.history.last() {
            self.metrics
                .record_transition(entry.previous_status.as_str(), entry.new_status.as_str());
            tracing::info!(
                order_id = %order.id,
                code = %order.code,
                from = %entry.previous_status,
                to = %entry.new_status,
                actor = ?entry.actor.as_ref().map(|a| a.id),
                version = order.version,
                "Order status changed"
            );
        }

        self.broadcaster.publish(OrderEvent::StatusChanged(order.clone()));
        Ok(order)
    }

    pub async fn get(&self, id: Uuid) -> Result<OrderSnapshot, OrderError> {
        self.store
            .get_order(id)
            .await
            .and_then(|order| order.ok_or(OrderError::NotFound(id)))
            .inspect_err(|e| self.reject("get", e))
    }

    /// Newest first; an empty filter lists everything.
    pub async fn list(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderSnapshot>, OrderError> {
        self.store
            .list_orders(statuses)
            .await
            .inspect_err(|e| self.reject("list", e))
    }

    pub async fn upsert_catalog_item(&self, item: CatalogItem) -> Result<(), OrderError> {
        let id = item.id;
        self.store.upsert_catalog_item(item).await?;
        tracing::debug!(item_id = %id, "Catalog item upserted");
        Ok(())
    }

    pub async fn delete_catalog_item(&self, id: Uuid) -> Result<(), OrderError> {
        self.store
            .delete_catalog_item(id)
            .await
            .inspect_err(|e| self.reject("delete_catalog_item", e))?;
        tracing::info!(item_id = %id, "Catalog item deleted");
        Ok(())
    }

    pub fn subscribe(&self) -> Subscription {
        self.broadcaster.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.broadcaster.subscriber_count()
    }

    fn reject(&self, operation: &str, error: &OrderError) {
        self.metrics.record_rejection(operation, error.reason());
        match error {
            OrderError::Storage(cause) => {
                tracing::error!(operation, error = %cause, "Order store failure");
            }
            other => {
                tracing::debug!(operation, reason = other.reason(), error = %other, "Order request rejected");
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
