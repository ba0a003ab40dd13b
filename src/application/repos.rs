//! Persistence gateway contracts.
//!
//! Reads and writes are split per entity so services can depend on the narrowest
//! surface they need. Implementations live in `infra::db` (Postgres) and
//! `infra::memory` (in-process).

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paged};
use crate::domain::builds::{BuildDiff, BuildLine};
use crate::domain::entities::{
    BuildComponentRecord, BuildRecord, CartItemRecord, CategoryRecord, ComponentRecord,
    ComponentSpecRecord, ReceiptLineRecord, ReceiptRecord,
};
use crate::domain::types::ReceiptStatus;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
    #[error("record changed since version {expected} was read")]
    VersionConflict { expected: i32 },
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

// ----- Query descriptors -----
//
// Each descriptor renders a canonical string for cache keys. Free text is trimmed
// and lowercased so that semantically identical queries share one cache entry.

fn canonical_text(value: &Option<String>) -> String {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
        .unwrap_or_default()
}

fn canonical_opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentQueryFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub include_inactive: bool,
}

impl ComponentQueryFilter {
    pub fn canonical(&self) -> String {
        format!(
            "search={};category={};brand={};min={};max={};inactive={}",
            canonical_text(&self.search),
            canonical_opt(&self.category_id),
            canonical_text(&self.brand),
            canonical_opt(&self.min_price.map(|p| p.normalize())),
            canonical_opt(&self.max_price.map(|p| p.normalize())),
            self.include_inactive,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentSort {
    #[default]
    NameAsc,
    NameDesc,
    PriceAsc,
    PriceDesc,
    Newest,
}

impl ComponentSort {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentSort::NameAsc => "name_asc",
            ComponentSort::NameDesc => "name_desc",
            ComponentSort::PriceAsc => "price_asc",
            ComponentSort::PriceDesc => "price_desc",
            ComponentSort::Newest => "newest",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryQueryFilter {
    pub search: Option<String>,
}

impl CategoryQueryFilter {
    pub fn canonical(&self) -> String {
        format!("search={}", canonical_text(&self.search))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildQueryFilter {
    pub search: Option<String>,
    pub created_by: Option<Uuid>,
    pub public_only: bool,
}

impl BuildQueryFilter {
    pub fn canonical(&self) -> String {
        format!(
            "search={};owner={};public={}",
            canonical_text(&self.search),
            canonical_opt(&self.created_by),
            self.public_only,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildSort {
    #[default]
    Newest,
    Oldest,
    NameAsc,
}

impl BuildSort {
    pub fn as_str(self) -> &'static str {
        match self {
            BuildSort::Newest => "newest",
            BuildSort::Oldest => "oldest",
            BuildSort::NameAsc => "name_asc",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecQueryFilter {
    pub component_id: Option<Uuid>,
    /// Matched against key and value.
    pub search: Option<String>,
}

impl SpecQueryFilter {
    pub fn canonical(&self) -> String {
        format!(
            "component={};search={}",
            canonical_opt(&self.component_id),
            canonical_text(&self.search),
        )
    }
}

/// `owner_id: None` lists every owner's receipts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptQueryFilter {
    pub owner_id: Option<Uuid>,
    pub status: Option<ReceiptStatus>,
}

impl ReceiptQueryFilter {
    pub fn canonical(&self) -> String {
        format!(
            "owner={};status={}",
            canonical_opt(&self.owner_id),
            self.status.map(ReceiptStatus::as_str).unwrap_or_default(),
        )
    }
}

// ----- Write parameters -----

#[derive(Debug, Clone)]
pub struct CreateComponentParams {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
}

/// Full field replacement guarded by `expected_version`.
#[derive(Debug, Clone)]
pub struct UpdateComponentParams {
    pub id: Uuid,
    pub expected_version: i32,
    pub name: String,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone)]
pub struct CreateSpecParams {
    pub component_id: Uuid,
    pub spec_key: String,
    pub spec_value: String,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct UpdateSpecParams {
    pub id: Uuid,
    pub spec_key: String,
    pub spec_value: String,
    pub display_order: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CategoryParams {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AddCartItemParams {
    pub owner_id: Uuid,
    pub component_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct CreateBuildParams {
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub created_by: Uuid,
    /// Normalised lines; one row is written per entry.
    pub lines: Vec<BuildLine>,
}

#[derive(Debug, Clone)]
pub struct UpdateBuildHeaderParams {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
}

/// A build header together with its component rows.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildWithLines {
    pub build: BuildRecord,
    pub lines: Vec<BuildComponentRecord>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptWithLines {
    pub receipt: ReceiptRecord,
    pub lines: Vec<ReceiptLineRecord>,
}

// ----- Components -----

#[async_trait]
pub trait ComponentsRepo: Send + Sync {
    async fn list_components(
        &self,
        filter: &ComponentQueryFilter,
        sort: ComponentSort,
        page: PageRequest,
    ) -> Result<Paged<ComponentRecord>, RepoError>;

    async fn find_component(&self, id: Uuid) -> Result<Option<ComponentRecord>, RepoError>;

    /// Batch lookup. Missing ids are simply absent from the result.
    async fn find_components(&self, ids: &[Uuid]) -> Result<Vec<ComponentRecord>, RepoError>;

    async fn list_specs(&self, component_id: Uuid)
    -> Result<Vec<ComponentSpecRecord>, RepoError>;

    async fn list_specs_for(
        &self,
        component_ids: &[Uuid],
    ) -> Result<Vec<ComponentSpecRecord>, RepoError>;

    async fn find_spec(&self, id: Uuid) -> Result<Option<ComponentSpecRecord>, RepoError>;

    /// Specs across components, ordered by component, display order, then key.
    async fn search_specs(
        &self,
        filter: &SpecQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ComponentSpecRecord>, RepoError>;

    /// Number of build rows that reference the component.
    async fn count_build_references(&self, component_id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait ComponentsWriteRepo: Send + Sync {
    async fn create_component(
        &self,
        params: CreateComponentParams,
    ) -> Result<ComponentRecord, RepoError>;

    /// Fails with `RepoError::VersionConflict` when the stored version differs
    /// from `expected_version`, and `RepoError::NotFound` when the row is gone.
    async fn update_component(
        &self,
        params: UpdateComponentParams,
    ) -> Result<ComponentRecord, RepoError>;

    /// Sets `is_active = false`, bumps `updated_at` and `version`. The row stays.
    async fn deactivate_component(&self, id: Uuid) -> Result<ComponentRecord, RepoError>;

    async fn create_spec(&self, params: CreateSpecParams)
    -> Result<ComponentSpecRecord, RepoError>;

    async fn update_spec(&self, params: UpdateSpecParams)
    -> Result<ComponentSpecRecord, RepoError>;

    async fn delete_spec(&self, id: Uuid) -> Result<(), RepoError>;
}

// ----- Categories -----

#[async_trait]
pub trait CategoriesRepo: Send + Sync {
    async fn list_categories(
        &self,
        filter: &CategoryQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<CategoryRecord>, RepoError>;

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError>;

    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<CategoryRecord>, RepoError>;

    async fn count_components_in(&self, category_id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait CategoriesWriteRepo: Send + Sync {
    async fn create_category(&self, params: CategoryParams) -> Result<CategoryRecord, RepoError>;

    async fn update_category(
        &self,
        id: Uuid,
        params: CategoryParams,
    ) -> Result<CategoryRecord, RepoError>;

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError>;
}

// ----- Builds -----

#[async_trait]
pub trait BuildsRepo: Send + Sync {
    async fn list_builds(
        &self,
        filter: &BuildQueryFilter,
        sort: BuildSort,
        page: PageRequest,
    ) -> Result<Paged<BuildRecord>, RepoError>;

    async fn find_build(&self, id: Uuid) -> Result<Option<BuildRecord>, RepoError>;

    async fn list_build_lines(&self, build_id: Uuid)
    -> Result<Vec<BuildComponentRecord>, RepoError>;

    async fn list_lines_for_builds(
        &self,
        build_ids: &[Uuid],
    ) -> Result<Vec<BuildComponentRecord>, RepoError>;
}

#[async_trait]
pub trait BuildsWriteRepo: Send + Sync {
    /// Header and rows commit together or not at all.
    async fn create_build(&self, params: CreateBuildParams) -> Result<BuildWithLines, RepoError>;

    /// Header update plus optional row diff, committed as one unit.
    async fn apply_build_update(
        &self,
        header: UpdateBuildHeaderParams,
        diff: Option<BuildDiff>,
    ) -> Result<BuildWithLines, RepoError>;

    /// Removes the header; rows cascade.
    async fn delete_build(&self, id: Uuid) -> Result<(), RepoError>;
}

// ----- Receipts -----

#[async_trait]
pub trait ReceiptsRepo: Send + Sync {
    async fn find_receipt(&self, id: Uuid) -> Result<Option<ReceiptWithLines>, RepoError>;

    /// Receipt headers, newest first.
    async fn list_receipts(
        &self,
        filter: &ReceiptQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ReceiptRecord>, RepoError>;

    /// Receipt lines referencing the component whose receipt is not in a terminal status.
    async fn count_open_lines_for_component(&self, component_id: Uuid) -> Result<u64, RepoError>;
}

#[async_trait]
pub trait ReceiptsWriteRepo: Send + Sync {
    async fn update_receipt_status(
        &self,
        id: Uuid,
        status: ReceiptStatus,
    ) -> Result<ReceiptRecord, RepoError>;
}

// ----- Cart -----

#[async_trait]
pub trait CartRepo: Send + Sync {
    /// The owner's items, oldest first.
    async fn list_cart_items(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Paged<CartItemRecord>, RepoError>;

    async fn find_cart_item(&self, id: Uuid) -> Result<Option<CartItemRecord>, RepoError>;

    /// The owner's item for `component_id`, if any. There is at most one.
    async fn find_cart_item_for(
        &self,
        owner_id: Uuid,
        component_id: Uuid,
    ) -> Result<Option<CartItemRecord>, RepoError>;
}

#[async_trait]
pub trait CartWriteRepo: Send + Sync {
    /// Fails with `RepoError::Duplicate` when the owner already holds the component.
    async fn add_cart_item(&self, params: AddCartItemParams) -> Result<CartItemRecord, RepoError>;

    async fn set_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<CartItemRecord, RepoError>;

    async fn remove_cart_item(&self, id: Uuid) -> Result<(), RepoError>;

    /// Removes every item of the owner and returns how many there were.
    async fn clear_cart(&self, owner_id: Uuid) -> Result<u64, RepoError>;
}
