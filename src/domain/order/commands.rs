use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::{FieldIssues, OrderError};
use super::value_objects::{LineItemRequest, OrderStatus, Operator};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Request to place a new order. Prices are never taken from the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrder {
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub table_label: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub items: Vec<LineItemRequest>,
}

impl PlaceOrder {
    const MIN_NAME_LEN: usize = 2;
    /// Largest quantity accepted on one line.
    pub const MAX_QUANTITY: i32 = 999;

    /// Reads a request body field by field. Missing or mistyped fields come
    /// back as field issues instead of failing the whole body at once.
    pub fn from_json(body: &Value) -> Result<Self, OrderError> {
        let mut issues = FieldIssues::new();
        let Some(fields) = body.as_object() else {
            push_issue(&mut issues, "body", "Expected a JSON object");
            return Err(OrderError::Validation(issues));
        };

        let customer_name = match fields.get("customerName") {
            Some(Value::String(name)) => name.clone(),
            None | Some(Value::Null) => {
                push_issue(&mut issues, "customerName", "Customer name is required");
                String::new()
            }
            Some(_) => {
                push_issue(&mut issues, "customerName", "Customer name must be a string");
                String::new()
            }
        };
        let table_label = optional_text(fields, "tableLabel", "tableLabel", &mut issues);
        let contact = optional_text(fields, "contact", "contact", &mut issues);

        let mut items = Vec::new();
        match fields.get("items") {
            None | Some(Value::Null) => {}
            Some(Value::Array(lines)) => {
                for (index, line) in lines.iter().enumerate() {
                    if let Some(item) = line_from_json(index, line, &mut issues) {
                        items.push(item);
                    }
                }
            }
            Some(_) => push_issue(&mut issues, "items", "Items must be a list"),
        }

        if !issues.is_empty() {
            return Err(OrderError::Validation(issues));
        }
        Ok(Self {
            customer_name,
            table_label,
            contact,
            items,
        })
    }

    /// Trims free-text fields and checks field-level rules.
    pub fn normalized(mut self) -> Result<Self, OrderError> {
        if self.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        self.customer_name = self.customer_name.trim().to_string();
        self.table_label = non_blank(self.table_label);
        self.contact = non_blank(self.contact);
        for item in &mut self.items {
            item.notes = non_blank(item.notes.take());
        }

        let mut issues = FieldIssues::new();
        if self.customer_name.chars().count() < Self::MIN_NAME_LEN {
            issues
                .entry("customerName".to_string())
                .or_default()
                .push(format!(
                    "Customer name must have at least {} characters",
                    Self::MIN_NAME_LEN
                ));
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.quantity < 1 {
                push_issue(&mut issues, &format!("items.{index}.quantity"), QUANTITY_MESSAGE);
            } else if item.quantity > Self::MAX_QUANTITY {
                push_issue(
                    &mut issues,
                    &format!("items.{index}.quantity"),
                    &format!("Quantity must be at most {}", Self::MAX_QUANTITY),
                );
            }
        }

        if issues.is_empty() {
            Ok(self)
        } else {
            Err(OrderError::Validation(issues))
        }
    }

    /// Distinct catalog ids referenced by the request, in request order.
    pub fn item_ids(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = Vec::with_capacity(self.items.len());
        for item in &self.items {
            if !ids.contains(&item.item_id) {
                ids.push(item.item_id);
            }
        }
        ids
    }
}

const QUANTITY_MESSAGE: &str = "Quantity must be a positive integer";

fn push_issue(issues: &mut FieldIssues, field: &str, message: &str) {
    issues.entry(field.to_string()).or_default().push(message.to_string());
}

fn optional_text(
    fields: &Map<String, Value>,
    key: &str,
    path: &str,
    issues: &mut FieldIssues,
) -> Option<String> {
    match fields.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            push_issue(issues, path, "Expected a string");
            None
        }
    }
}

fn line_from_json(index: usize, line: &Value, issues: &mut FieldIssues) -> Option<LineItemRequest> {
    let Some(fields) = line.as_object() else {
        push_issue(issues, &format!("items.{index}"), "Expected an object");
        return None;
    };

    let item_id = fields
        .get("itemId")
        .and_then(Value::as_str)
        .and_then(|raw| Uuid::parse_str(raw).ok());
    if item_id.is_none() {
        push_issue(issues, &format!("items.{index}.itemId"), "Item id must be a UUID");
    }

    let quantity = fields
        .get("quantity")
        .and_then(Value::as_i64)
        .and_then(|q| i32::try_from(q).ok());
    if quantity.is_none() {
        push_issue(issues, &format!("items.{index}.quantity"), QUANTITY_MESSAGE);
    }

    let notes = optional_text(fields, "notes", &format!("items.{index}.notes"), issues);

    Some(LineItemRequest {
        item_id: item_id?,
        quantity: quantity?,
        notes,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Request to move an order to `status`.
#[derive(Debug, Clone)]
pub struct AdvanceStatus {
    pub order_id: Uuid,
    pub status: OrderStatus,
    pub actor: Option<Operator>,
    pub note: Option<String>,
}

impl AdvanceStatus {
    pub fn new(order_id: Uuid, status: OrderStatus) -> Self {
        Self {
            order_id,
            status,
            actor: None,
            note: None,
        }
    }

    /// Parses the raw status string received from the caller.
    pub fn parse(order_id: Uuid, status: &str) -> Result<Self, OrderError> {
        let status = status
            .parse::<OrderStatus>()
            .map_err(|_| OrderError::InvalidStatus(status.to_string()))?;
        Ok(Self::new(order_id, status))
    }

    pub fn by(mut self, actor: Option<Operator>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = non_blank(note);
        self
    }
}
