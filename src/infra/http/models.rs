use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::application::repos::{BuildSort, ComponentSort};
use crate::domain::builds::BuildLine;
use crate::domain::types::ReceiptStatus;

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct ComponentListQuery {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub include_inactive: bool,
    #[serde(default)]
    pub sort: ComponentSort,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct BuildListQuery {
    pub search: Option<String>,
    /// Only the caller's own builds, private ones included.
    #[serde(default)]
    pub mine: bool,
    #[serde(default)]
    pub sort: BuildSort,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SpecListQuery {
    pub component_id: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

/// `owner_id` only narrows an administrator's listing; customers always see their own.
#[derive(Debug, Default, Deserialize)]
pub struct ReceiptListQuery {
    pub owner_id: Option<Uuid>,
    pub status: Option<ReceiptStatus>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ComponentCreateRequest {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ComponentUpdateRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "double_option")]
    pub brand: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct SpecRequest {
    pub spec_key: String,
    pub spec_value: String,
    pub display_order: Option<i32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CategoryRequest {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct BuildLineRequest {
    pub component_id: Uuid,
    pub quantity: i32,
}

impl From<BuildLineRequest> for BuildLine {
    fn from(line: BuildLineRequest) -> Self {
        BuildLine::new(line.component_id, line.quantity)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BuildCreateRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub components: Vec<BuildLineRequest>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BuildUpdateRequest {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub components: Option<Vec<BuildLineRequest>>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ReceiptStatusRequest {
    pub status: ReceiptStatus,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CartAddRequest {
    pub component_id: Uuid,
    #[serde(default = "one")]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CartQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct CartClearedResponse {
    pub removed: u64,
}
