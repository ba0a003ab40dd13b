//! Read models returned by services and cached as JSON.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::pricing::{PriceOverflow, line_subtotal, total_price};
use crate::domain::entities::{
    BuildComponentRecord, BuildRecord, CartItemRecord, CategoryRecord, ComponentRecord,
    ComponentSpecRecord, ReceiptLineRecord, ReceiptRecord,
};
use crate::domain::types::ReceiptStatus;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpecDto {
    pub id: Uuid,
    pub component_id: Uuid,
    pub spec_key: String,
    pub spec_value: String,
    pub display_order: Option<i32>,
}

impl From<ComponentSpecRecord> for ComponentSpecDto {
    fn from(record: ComponentSpecRecord) -> Self {
        Self {
            id: record.id,
            component_id: record.component_id,
            spec_key: record.spec_key,
            spec_value: record.spec_value,
            display_order: record.display_order,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDto {
    pub id: Uuid,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub category_name: String,
    pub brand: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub version: i32,
    pub specs: Vec<ComponentSpecDto>,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ComponentDto {
    /// Specs are ordered by display order (unordered last), then key.
    pub fn from_parts(
        component: ComponentRecord,
        category_name: Option<&str>,
        mut specs: Vec<ComponentSpecRecord>,
    ) -> Self {
        specs.sort_by(|a, b| {
            (a.display_order.is_none(), a.display_order, &a.spec_key).cmp(&(
                b.display_order.is_none(),
                b.display_order,
                &b.spec_key,
            ))
        });

        Self {
            id: component.id,
            name: component.name,
            category_id: component.category_id,
            category_name: category_name.unwrap_or(UNCATEGORIZED).to_string(),
            brand: component.brand,
            price: component.price,
            stock_quantity: component.stock_quantity,
            description: component.description,
            image_url: component.image_url,
            is_active: component.is_active,
            version: component.version,
            specs: specs.into_iter().map(ComponentSpecDto::from).collect(),
            updated_at: component.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl From<CategoryRecord> for CategoryDto {
    fn from(record: CategoryRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            description: record.description,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildComponentDto {
    pub component_id: Uuid,
    pub component_name: String,
    pub category_name: String,
    pub brand: Option<String>,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub image_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildDto {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub components: Vec<BuildComponentDto>,
    /// Sum of unit price times quantity, computed when the DTO is assembled.
    pub total_price: Decimal,
}

impl BuildDto {
    /// Rows whose component cannot be resolved are left out.
    pub fn from_parts(
        build: BuildRecord,
        lines: &[BuildComponentRecord],
        components: &HashMap<Uuid, ComponentRecord>,
        categories: &HashMap<Uuid, CategoryRecord>,
    ) -> Result<Self, PriceOverflow> {
        let mut items = lines
            .iter()
            .filter(|line| line.build_id == build.id)
            .filter_map(|line| {
                let component = components.get(&line.component_id)?;
                let category_name = component
                    .category_id
                    .and_then(|id| categories.get(&id))
                    .map(|category| category.name.clone())
                    .unwrap_or_else(|| UNCATEGORIZED.to_string());
                let subtotal = match line_subtotal(component.price, line.quantity) {
                    Ok(subtotal) => subtotal,
                    Err(overflow) => return Some(Err(overflow)),
                };
                Some(Ok(BuildComponentDto {
                    component_id: component.id,
                    component_name: component.name.clone(),
                    category_name,
                    brand: component.brand.clone(),
                    unit_price: component.price,
                    quantity: line.quantity,
                    subtotal,
                    image_url: component.image_url.clone(),
                    is_active: component.is_active,
                }))
            })
            .collect::<Result<Vec<_>, _>>()?;
        items.sort_by(|a, b| {
            (&a.category_name, &a.component_name, a.component_id).cmp(&(
                &b.category_name,
                &b.component_name,
                b.component_id,
            ))
        });

        let total = total_price(items.iter().map(|item| (item.unit_price, item.quantity)))?;

        Ok(Self {
            id: build.id,
            name: build.name,
            description: build.description,
            is_public: build.is_public,
            created_by: build.created_by,
            created_at: build.created_at,
            updated_at: build.updated_at,
            components: items,
            total_price: total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptLineDto {
    pub id: Uuid,
    pub component_id: Option<Uuid>,
    pub build_id: Option<Uuid>,
    pub item_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

impl TryFrom<ReceiptLineRecord> for ReceiptLineDto {
    type Error = PriceOverflow;

    fn try_from(record: ReceiptLineRecord) -> Result<Self, Self::Error> {
        let subtotal = line_subtotal(record.unit_price, record.quantity)?;
        Ok(Self {
            id: record.id,
            component_id: record.component_id,
            build_id: record.build_id,
            item_name: record.item_name,
            quantity: record.quantity,
            unit_price: record.unit_price,
            subtotal,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub total_amount: Decimal,
    pub status: ReceiptStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub lines: Vec<ReceiptLineDto>,
}

impl ReceiptDto {
    pub fn from_parts(
        receipt: ReceiptRecord,
        lines: Vec<ReceiptLineRecord>,
    ) -> Result<Self, PriceOverflow> {
        let lines = lines
            .into_iter()
            .map(ReceiptLineDto::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            id: receipt.id,
            owner_id: receipt.owner_id,
            total_amount: receipt.total_amount,
            status: receipt.status,
            created_at: receipt.created_at,
            updated_at: receipt.updated_at,
            lines,
        })
    }
}

/// Receipt header as shown in listings; lines are only loaded for the detail view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptSummaryDto {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub total_amount: Decimal,
    pub status: ReceiptStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<ReceiptRecord> for ReceiptSummaryDto {
    fn from(record: ReceiptRecord) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            total_amount: record.total_amount,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// A cart item priced at the component's current price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemDto {
    pub id: Uuid,
    pub component_id: Uuid,
    pub component_name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub subtotal: Decimal,
    pub stock_quantity: i32,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}

impl CartItemDto {
    pub fn from_parts(
        item: CartItemRecord,
        component: &ComponentRecord,
    ) -> Result<Self, PriceOverflow> {
        Ok(Self {
            id: item.id,
            component_id: item.component_id,
            component_name: component.name.clone(),
            unit_price: component.price,
            quantity: item.quantity,
            subtotal: line_subtotal(component.price, item.quantity)?,
            stock_quantity: component.stock_quantity,
            is_active: component.is_active,
            added_at: item.added_at,
        })
    }
}
