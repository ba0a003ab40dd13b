//! Domain entities mirrored from persistent storage.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::types::ReceiptStatus;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// A purchasable part. `version` starts at 0 and increments on every successful write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentRecord {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub version: i32,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentSpecRecord {
    pub id: Uuid,
    pub component_id: Uuid,
    pub spec_key: String,
    pub spec_value: String,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildRecord {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_by: Uuid,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One row per (build, component); repeats are folded into `quantity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildComponentRecord {
    pub build_id: Uuid,
    pub component_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub total_amount: Decimal,
    pub status: ReceiptStatus,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptLineRecord {
    pub id: Uuid,
    pub receipt_id: Uuid,
    pub component_id: Option<Uuid>,
    pub build_id: Option<Uuid>,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A component waiting in a customer's cart. One row per (owner, component).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartItemRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub component_id: Uuid,
    pub quantity: i32,
    pub added_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
