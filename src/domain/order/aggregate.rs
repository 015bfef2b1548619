use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commands::{AdvanceStatus, PlaceOrder};
use super::errors::{FieldIssues, OrderError};
use super::history::{AuditTrail, TransitionRecord};
use super::value_objects::{LineItem, OrderCode, OrderStatus, TransitionPolicy};
use crate::domain::catalog::CatalogItem;

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Stores call into this module while holding their per-order lock or row
// lock, so every decision here is made against committed state.
//
// ============================================================================

/// Fully hydrated order, including its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub id: Uuid,
    pub code: OrderCode,
    pub customer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
    pub status: OrderStatus,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub items: Vec<LineItem>,
    pub history: AuditTrail,
    /// Number of committed audit entries; grows by one per transition.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order request priced against the catalog, not yet persisted.
#[derive(Debug, Clone)]
pub struct PricedOrder {
    pub customer_name: String,
    pub table_label: Option<String>,
    pub contact: Option<String>,
    pub items: Vec<LineItem>,
    pub total: Decimal,
}

impl PlaceOrder {
    /// Prices every line at the catalog's current price. `catalog` must be
    /// the same read the store holds for the rest of the transaction.
    pub fn price(&self, catalog: &HashMap<Uuid, CatalogItem>) -> Result<PricedOrder, OrderError> {
        let unavailable: Vec<Uuid> = self
            .item_ids()
            .into_iter()
            .filter(|id| !catalog.get(id).is_some_and(|item| item.is_available))
            .collect();

        if !unavailable.is_empty() {
            return Err(OrderError::ItemUnavailable(unavailable));
        }

        let mut items = Vec::with_capacity(self.items.len());
        for request in &self.items {
            let Some(entry) = catalog.get(&request.item_id) else {
                return Err(OrderError::ItemUnavailable(vec![request.item_id]));
            };
            items.push(LineItem {
                item_id: entry.id,
                name: entry.name.clone(),
                quantity: request.quantity,
                unit_price: entry.price,
                notes: request.notes.clone(),
            });
        }

        let total = items
            .iter()
            .map(LineItem::subtotal)
            .sum::<Decimal>()
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        // Totals are stored as NUMERIC(10, 2).
        let max_total = Decimal::new(99_999_999_99, 2);
        if total > max_total {
            let mut issues = FieldIssues::new();
            issues
                .entry("items".to_string())
                .or_default()
                .push(format!("Order total must not exceed {max_total}"));
            return Err(OrderError::Validation(issues));
        }

        Ok(PricedOrder {
            customer_name: self.customer_name.clone(),
            table_label: self.table_label.clone(),
            contact: self.contact.clone(),
            items,
            total,
        })
    }
}

impl OrderSnapshot {
    /// Opens a new order in `received` with its anchor audit entry.
    pub fn open(id: Uuid, code: OrderCode, priced: PricedOrder, now: DateTime<Utc>) -> Self {
        let mut history = AuditTrail::new();
        let created_at = history.next_timestamp(now);
        history.push(TransitionRecord::anchor(created_at));

        Self {
            id,
            code,
            customer_name: priced.customer_name,
            table_label: priced.table_label,
            contact: priced.contact,
            status: OrderStatus::Received,
            total: priced.total,
            items: priced.items,
            history,
            version: 1,
            created_at,
            updated_at: created_at,
        }
    }

    /// Decides the audit entry for `command` against the current status.
    /// Same-status requests are accepted and produce a no-op entry.
    pub fn plan_transition(
        &self,
        command: &AdvanceStatus,
        policy: TransitionPolicy,
        now: DateTime<Utc>,
    ) -> Result<TransitionRecord, OrderError> {
        let from = self.status;
        let to = command.status;

        if policy == TransitionPolicy::ForwardOnly && to < from {
            return Err(OrderError::BackwardTransition { from, to });
        }

        Ok(TransitionRecord {
            id: Uuid::now_v7(),
            previous_status: from,
            new_status: to,
            note: command.note.clone(),
            created_at: self.history.next_timestamp(now),
            actor: command.actor.clone(),
        })
    }

    pub fn apply_transition(&mut self, record: TransitionRecord) {
        self.status = record.new_status;
        self.updated_at = record.created_at;
        self.version += 1;
        self.history.push(record);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
