use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::OrderSnapshot;

// ============================================================================
// Order Events - what subscribers receive after a commit
// ============================================================================

/// Wire shape: `{"type": "created" | "updated", "order": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "order")]
pub enum OrderEvent {
    #[serde(rename = "created")]
    Created(OrderSnapshot),
    #[serde(rename = "updated")]
    StatusChanged(OrderSnapshot),
}

impl OrderEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::Created(_) => "created",
            OrderEvent::StatusChanged(_) => "updated",
        }
    }

    pub fn snapshot(&self) -> &OrderSnapshot {
        match self {
            OrderEvent::Created(order) | OrderEvent::StatusChanged(order) => order,
        }
    }

    pub fn order_id(&self) -> Uuid {
        self.snapshot().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::aggregate::PricedOrder;
    use crate::domain::order::value_objects::OrderCode;
    use chrono::Utc;
    use rust_decimal::Decimal;

    #[test]
    fn test_event_wire_shape() {
        let order = OrderSnapshot::open(
            Uuid::new_v4(),
            OrderCode::generate(),
            PricedOrder {
                customer_name: "Bia".to_string(),
                table_label: None,
                contact: None,
                items: vec![],
                total: Decimal::new(2500, 2),
            },
            Utc::now(),
        );

        let json = serde_json::to_value(OrderEvent::StatusChanged(order.clone())).unwrap();
        assert_eq!(json["type"], "updated");
        assert_eq!(json["order"]["id"], order.id.to_string());
        assert_eq!(json["order"]["status"], "received");
        assert_eq!(json["order"]["total"], 25.0);

        let created = serde_json::to_value(OrderEvent::Created(order)).unwrap();
        assert_eq!(created["type"], "created");
    }
}
