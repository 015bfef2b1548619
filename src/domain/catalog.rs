use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Catalog lookup - the slice of the menu the order engine depends on
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: Uuid,
    pub name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

impl CatalogItem {
    pub fn new(name: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            price,
            is_available: true,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.is_available = false;
        self
    }
}

/// Loads a JSON array of catalog items, used to seed a fresh store.
pub fn parse_seed(json: &str) -> serde_json::Result<Vec<CatalogItem>> {
    serde_json::from_str(json)
}
