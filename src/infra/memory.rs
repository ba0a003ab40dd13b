//! In-process catalog store.
//!
//! Implements every repository trait over plain collections behind one async
//! mutex. Each call takes the lock once, so multi-row writes are all-or-nothing.
//! Foreign keys and unique constraints are checked the way the Postgres schema
//! enforces them.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::pagination::{PageRequest, Paged};
use crate::infra::http::HealthProbe;
use crate::application::repos::{
    AddCartItemParams, BuildQueryFilter, BuildSort, BuildWithLines, BuildsRepo, BuildsWriteRepo,
    CartRepo, CartWriteRepo, CategoriesRepo, CategoriesWriteRepo, CategoryParams,
    CategoryQueryFilter, ComponentQueryFilter, ComponentSort, ComponentsRepo,
    ComponentsWriteRepo, CreateBuildParams, CreateComponentParams, CreateSpecParams,
    ReceiptQueryFilter, ReceiptWithLines, ReceiptsRepo, ReceiptsWriteRepo, RepoError,
    SpecQueryFilter, UpdateBuildHeaderParams, UpdateComponentParams, UpdateSpecParams,
};
use crate::domain::builds::BuildDiff;
use crate::domain::entities::{
    BuildComponentRecord, BuildRecord, CartItemRecord, CategoryRecord, ComponentRecord,
    ComponentSpecRecord, ReceiptLineRecord, ReceiptRecord,
};
use crate::domain::pricing::max_price;
use crate::domain::types::ReceiptStatus;

#[derive(Default)]
struct CatalogState {
    categories: HashMap<Uuid, CategoryRecord>,
    components: HashMap<Uuid, ComponentRecord>,
    specs: HashMap<Uuid, ComponentSpecRecord>,
    builds: HashMap<Uuid, BuildRecord>,
    /// Rows keyed by (build, component); the key is the uniqueness constraint.
    build_lines: BTreeMap<(Uuid, Uuid), BuildComponentRecord>,
    receipts: HashMap<Uuid, ReceiptRecord>,
    receipt_lines: HashMap<Uuid, ReceiptLineRecord>,
    cart_items: HashMap<Uuid, CartItemRecord>,
}

impl CatalogState {
    fn lines_of(&self, build_id: Uuid) -> Vec<BuildComponentRecord> {
        self.build_lines
            .range((build_id, Uuid::nil())..=(build_id, Uuid::max()))
            .map(|(_, row)| *row)
            .collect()
    }

    fn ensure_category(&self, id: Option<Uuid>) -> Result<(), RepoError> {
        match id {
            Some(id) if !self.categories.contains_key(&id) => Err(RepoError::InvalidInput {
                message: format!("category {id} does not exist"),
            }),
            _ => Ok(()),
        }
    }

    fn ensure_price(price: Decimal) -> Result<(), RepoError> {
        if price.abs() > max_price() {
            return Err(RepoError::InvalidInput {
                message: format!("numeric field overflow for price {price}"),
            });
        }
        Ok(())
    }

    fn ensure_components(&self, ids: impl IntoIterator<Item = Uuid>) -> Result<(), RepoError> {
        for id in ids {
            if !self.components.contains_key(&id) {
                return Err(RepoError::InvalidInput {
                    message: format!("component {id} does not exist"),
                });
            }
        }
        Ok(())
    }

    fn ensure_unique_category_name(&self, name: &str, except: Option<Uuid>) -> Result<(), RepoError> {
        let taken = self
            .categories
            .values()
            .any(|c| c.name == name && Some(c.id) != except);
        if taken {
            return Err(RepoError::Duplicate {
                constraint: "component_categories_name_key".to_string(),
            });
        }
        Ok(())
    }

    fn ensure_quantity(quantity: i32) -> Result<(), RepoError> {
        if quantity <= 0 {
            return Err(RepoError::InvalidInput {
                message: format!("quantity must be positive, got {quantity}"),
            });
        }
        Ok(())
    }

    fn ensure_unique_spec_key(
        &self,
        component_id: Uuid,
        key: &str,
        except: Option<Uuid>,
    ) -> Result<(), RepoError> {
        let taken = self.specs.values().any(|s| {
            s.component_id == component_id && s.spec_key == key && Some(s.id) != except
        });
        if taken {
            return Err(RepoError::Duplicate {
                constraint: "component_specs_component_key_key".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: Mutex<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a receipt with its lines as if it had been placed at checkout.
    pub async fn insert_receipt(
        &self,
        receipt: ReceiptRecord,
        lines: Vec<ReceiptLineRecord>,
    ) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        state.ensure_components(lines.iter().filter_map(|line| line.component_id))?;
        if state.receipts.contains_key(&receipt.id) {
            return Err(RepoError::Duplicate {
                constraint: "receipts_pkey".to_string(),
            });
        }
        for line in lines {
            state.receipt_lines.insert(line.id, line);
        }
        state.receipts.insert(receipt.id, receipt);
        Ok(())
    }

    pub async fn build_count(&self) -> usize {
        self.state.lock().await.builds.len()
    }
}

#[async_trait]
impl HealthProbe for InMemoryCatalog {
    async fn check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

fn matches_search(search: &Option<String>, fields: &[Option<&str>]) -> bool {
    let Some(term) = search
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
    else {
        return true;
    };
    fields
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(&term))
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> Paged<T> {
    let total = items.len() as u64;
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let limit = page.page_size as usize;
    let items = items.into_iter().skip(offset).take(limit).collect();
    Paged::new(items, total, page)
}

fn compare_components(sort: ComponentSort, a: &ComponentRecord, b: &ComponentRecord) -> Ordering {
    match sort {
        ComponentSort::NameAsc => (a.name.to_lowercase(), a.id).cmp(&(b.name.to_lowercase(), b.id)),
        ComponentSort::NameDesc => (b.name.to_lowercase(), b.id).cmp(&(a.name.to_lowercase(), a.id)),
        ComponentSort::PriceAsc => (a.price, a.id).cmp(&(b.price, b.id)),
        ComponentSort::PriceDesc => (b.price, b.id).cmp(&(a.price, a.id)),
        ComponentSort::Newest => (b.created_at, b.id).cmp(&(a.created_at, a.id)),
    }
}

fn compare_builds(sort: BuildSort, a: &BuildRecord, b: &BuildRecord) -> Ordering {
    match sort {
        BuildSort::Newest => (b.created_at, b.id).cmp(&(a.created_at, a.id)),
        BuildSort::Oldest => (a.created_at, a.id).cmp(&(b.created_at, b.id)),
        BuildSort::NameAsc => (a.name.to_lowercase(), a.id).cmp(&(b.name.to_lowercase(), b.id)),
    }
}

fn to_u64(count: usize) -> u64 {
    count as u64
}

#[async_trait]
impl ComponentsRepo for InMemoryCatalog {
    async fn list_components(
        &self,
        filter: &ComponentQueryFilter,
        sort: ComponentSort,
        page: PageRequest,
    ) -> Result<Paged<ComponentRecord>, RepoError> {
        let state = self.state.lock().await;
        let brand = filter
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_lowercase);

        let mut items: Vec<ComponentRecord> = state
            .components
            .values()
            .filter(|c| filter.include_inactive || c.is_active)
            .filter(|c| filter.category_id.is_none_or(|id| c.category_id == Some(id)))
            .filter(|c| {
                brand
                    .as_deref()
                    .is_none_or(|b| c.brand.as_deref().map(str::to_lowercase).as_deref() == Some(b))
            })
            .filter(|c| filter.min_price.is_none_or(|min| c.price >= min))
            .filter(|c| filter.max_price.is_none_or(|max| c.price <= max))
            .filter(|c| {
                matches_search(
                    &filter.search,
                    &[Some(c.name.as_str()), c.brand.as_deref(), c.description.as_deref()],
                )
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| compare_components(sort, a, b));

        Ok(paginate(items, page))
    }

    async fn find_component(&self, id: Uuid) -> Result<Option<ComponentRecord>, RepoError> {
        Ok(self.state.lock().await.components.get(&id).cloned())
    }

    async fn find_components(&self, ids: &[Uuid]) -> Result<Vec<ComponentRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut seen = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        Ok(seen
            .into_iter()
            .filter_map(|id| state.components.get(&id).cloned())
            .collect())
    }

    async fn list_specs(
        &self,
        component_id: Uuid,
    ) -> Result<Vec<ComponentSpecRecord>, RepoError> {
        self.list_specs_for(&[component_id]).await
    }

    async fn list_specs_for(
        &self,
        component_ids: &[Uuid],
    ) -> Result<Vec<ComponentSpecRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .specs
            .values()
            .filter(|spec| component_ids.contains(&spec.component_id))
            .cloned()
            .collect())
    }

    async fn find_spec(&self, id: Uuid) -> Result<Option<ComponentSpecRecord>, RepoError> {
        Ok(self.state.lock().await.specs.get(&id).cloned())
    }

    async fn search_specs(
        &self,
        filter: &SpecQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ComponentSpecRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut items: Vec<ComponentSpecRecord> = state
            .specs
            .values()
            .filter(|s| filter.component_id.is_none_or(|id| s.component_id == id))
            .filter(|s| {
                matches_search(
                    &filter.search,
                    &[Some(s.spec_key.as_str()), Some(s.spec_value.as_str())],
                )
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            (a.component_id, a.display_order.is_none(), a.display_order, &a.spec_key).cmp(&(
                b.component_id,
                b.display_order.is_none(),
                b.display_order,
                &b.spec_key,
            ))
        });
        Ok(paginate(items, page))
    }

    async fn count_build_references(&self, component_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(to_u64(
            state
                .build_lines
                .values()
                .filter(|row| row.component_id == component_id)
                .count(),
        ))
    }
}

#[async_trait]
impl ComponentsWriteRepo for InMemoryCatalog {
    async fn create_component(
        &self,
        params: CreateComponentParams,
    ) -> Result<ComponentRecord, RepoError> {
        CatalogState::ensure_price(params.price)?;
        let mut state = self.state.lock().await;
        state.ensure_category(params.category_id)?;

        let now = OffsetDateTime::now_utc();
        let record = ComponentRecord {
            id: Uuid::new_v4(),
            name: params.name,
            category_id: params.category_id,
            brand: params.brand,
            price: params.price,
            stock_quantity: params.stock_quantity,
            description: params.description,
            image_url: params.image_url,
            is_active: params.is_active,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        state.components.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_component(
        &self,
        params: UpdateComponentParams,
    ) -> Result<ComponentRecord, RepoError> {
        CatalogState::ensure_price(params.price)?;
        let mut state = self.state.lock().await;
        state.ensure_category(params.category_id)?;

        let record = state
            .components
            .get_mut(&params.id)
            .ok_or(RepoError::NotFound)?;
        if record.version != params.expected_version {
            return Err(RepoError::VersionConflict {
                expected: params.expected_version,
            });
        }

        record.name = params.name;
        record.category_id = params.category_id;
        record.brand = params.brand;
        record.price = params.price;
        record.stock_quantity = params.stock_quantity;
        record.description = params.description;
        record.image_url = params.image_url;
        record.is_active = params.is_active;
        record.version += 1;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn deactivate_component(&self, id: Uuid) -> Result<ComponentRecord, RepoError> {
        let mut state = self.state.lock().await;
        let record = state.components.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.is_active = false;
        record.version += 1;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn create_spec(
        &self,
        params: CreateSpecParams,
    ) -> Result<ComponentSpecRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.ensure_components([params.component_id])?;
        state.ensure_unique_spec_key(params.component_id, &params.spec_key, None)?;

        let record = ComponentSpecRecord {
            id: Uuid::new_v4(),
            component_id: params.component_id,
            spec_key: params.spec_key,
            spec_value: params.spec_value,
            display_order: params.display_order,
        };
        state.specs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_spec(
        &self,
        params: UpdateSpecParams,
    ) -> Result<ComponentSpecRecord, RepoError> {
        let mut state = self.state.lock().await;
        let component_id = state
            .specs
            .get(&params.id)
            .map(|spec| spec.component_id)
            .ok_or(RepoError::NotFound)?;
        state.ensure_unique_spec_key(component_id, &params.spec_key, Some(params.id))?;

        let record = state.specs.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        record.spec_key = params.spec_key;
        record.spec_value = params.spec_value;
        record.display_order = params.display_order;
        Ok(record.clone())
    }

    async fn delete_spec(&self, id: Uuid) -> Result<(), RepoError> {
        self.state
            .lock()
            .await
            .specs
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl CategoriesRepo for InMemoryCatalog {
    async fn list_categories(
        &self,
        filter: &CategoryQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<CategoryRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut items: Vec<CategoryRecord> = state
            .categories
            .values()
            .filter(|c| matches_search(&filter.search, &[Some(c.name.as_str()), c.description.as_deref()]))
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.name.to_lowercase(), a.id).cmp(&(b.name.to_lowercase(), b.id)));
        Ok(paginate(items, page))
    }

    async fn find_category(&self, id: Uuid) -> Result<Option<CategoryRecord>, RepoError> {
        Ok(self.state.lock().await.categories.get(&id).cloned())
    }

    async fn find_categories(&self, ids: &[Uuid]) -> Result<Vec<CategoryRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .categories
            .values()
            .filter(|c| ids.contains(&c.id))
            .cloned()
            .collect())
    }

    async fn count_components_in(&self, category_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(to_u64(
            state
                .components
                .values()
                .filter(|c| c.category_id == Some(category_id))
                .count(),
        ))
    }
}

#[async_trait]
impl CategoriesWriteRepo for InMemoryCatalog {
    async fn create_category(&self, params: CategoryParams) -> Result<CategoryRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.ensure_unique_category_name(&params.name, None)?;

        let now = OffsetDateTime::now_utc();
        let record = CategoryRecord {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(record.id, record.clone());
        Ok(record)
    }

    async fn update_category(
        &self,
        id: Uuid,
        params: CategoryParams,
    ) -> Result<CategoryRecord, RepoError> {
        let mut state = self.state.lock().await;
        state.ensure_unique_category_name(&params.name, Some(id))?;

        let record = state.categories.get_mut(&id).ok_or(RepoError::NotFound)?;
        record.name = params.name;
        record.description = params.description;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(record.clone())
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        if !state.categories.contains_key(&id) {
            return Err(RepoError::NotFound);
        }
        if state.components.values().any(|c| c.category_id == Some(id)) {
            return Err(RepoError::InvalidInput {
                message: format!("category {id} is still referenced by components"),
            });
        }
        state.categories.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl BuildsRepo for InMemoryCatalog {
    async fn list_builds(
        &self,
        filter: &BuildQueryFilter,
        sort: BuildSort,
        page: PageRequest,
    ) -> Result<Paged<BuildRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut items: Vec<BuildRecord> = state
            .builds
            .values()
            .filter(|b| filter.created_by.is_none_or(|owner| b.created_by == owner))
            .filter(|b| !filter.public_only || b.is_public)
            .filter(|b| matches_search(&filter.search, &[Some(b.name.as_str()), b.description.as_deref()]))
            .cloned()
            .collect();
        items.sort_by(|a, b| compare_builds(sort, a, b));
        Ok(paginate(items, page))
    }

    async fn find_build(&self, id: Uuid) -> Result<Option<BuildRecord>, RepoError> {
        Ok(self.state.lock().await.builds.get(&id).cloned())
    }

    async fn list_build_lines(
        &self,
        build_id: Uuid,
    ) -> Result<Vec<BuildComponentRecord>, RepoError> {
        Ok(self.state.lock().await.lines_of(build_id))
    }

    async fn list_lines_for_builds(
        &self,
        build_ids: &[Uuid],
    ) -> Result<Vec<BuildComponentRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(build_ids
            .iter()
            .flat_map(|id| state.lines_of(*id))
            .collect())
    }
}

#[async_trait]
impl BuildsWriteRepo for InMemoryCatalog {
    async fn create_build(&self, params: CreateBuildParams) -> Result<BuildWithLines, RepoError> {
        let mut state = self.state.lock().await;

        // Every check happens before the first insert.
        state.ensure_components(params.lines.iter().map(|line| line.component_id))?;
        let mut seen = Vec::with_capacity(params.lines.len());
        for line in &params.lines {
            if line.quantity <= 0 {
                return Err(RepoError::InvalidInput {
                    message: format!("quantity for component {} must be positive", line.component_id),
                });
            }
            if seen.contains(&line.component_id) {
                return Err(RepoError::Duplicate {
                    constraint: "build_components_pkey".to_string(),
                });
            }
            seen.push(line.component_id);
        }

        let now = OffsetDateTime::now_utc();
        let build = BuildRecord {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            is_public: params.is_public,
            created_by: params.created_by,
            created_at: now,
            updated_at: now,
        };
        for line in &params.lines {
            state.build_lines.insert(
                (build.id, line.component_id),
                BuildComponentRecord {
                    build_id: build.id,
                    component_id: line.component_id,
                    quantity: line.quantity,
                },
            );
        }
        state.builds.insert(build.id, build.clone());
        let lines = state.lines_of(build.id);

        Ok(BuildWithLines { build, lines })
    }

    async fn apply_build_update(
        &self,
        header: UpdateBuildHeaderParams,
        diff: Option<BuildDiff>,
    ) -> Result<BuildWithLines, RepoError> {
        let mut state = self.state.lock().await;
        if !state.builds.contains_key(&header.id) {
            return Err(RepoError::NotFound);
        }

        if let Some(diff) = diff.as_ref() {
            state.ensure_components(diff.insert.iter().map(|line| line.component_id))?;
            let mut rows = state.lines_of(header.id);
            diff.apply_to(header.id, &mut rows);
            state
                .build_lines
                .retain(|(build_id, _), _| *build_id != header.id);
            for row in rows {
                state.build_lines.insert((row.build_id, row.component_id), row);
            }
        }

        let build = state.builds.get_mut(&header.id).ok_or(RepoError::NotFound)?;
        build.name = header.name;
        build.description = header.description;
        build.is_public = header.is_public;
        build.updated_at = OffsetDateTime::now_utc();
        let build = build.clone();
        let lines = state.lines_of(header.id);

        Ok(BuildWithLines { build, lines })
    }

    async fn delete_build(&self, id: Uuid) -> Result<(), RepoError> {
        let mut state = self.state.lock().await;
        if state.builds.remove(&id).is_none() {
            return Err(RepoError::NotFound);
        }
        state.build_lines.retain(|(build_id, _), _| *build_id != id);
        for line in state.receipt_lines.values_mut() {
            if line.build_id == Some(id) {
                line.build_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ReceiptsRepo for InMemoryCatalog {
    async fn find_receipt(&self, id: Uuid) -> Result<Option<ReceiptWithLines>, RepoError> {
        let state = self.state.lock().await;
        let Some(receipt) = state.receipts.get(&id).cloned() else {
            return Ok(None);
        };
        let mut lines: Vec<ReceiptLineRecord> = state
            .receipt_lines
            .values()
            .filter(|line| line.receipt_id == id)
            .cloned()
            .collect();
        lines.sort_by(|a, b| (&a.item_name, a.id).cmp(&(&b.item_name, b.id)));
        Ok(Some(ReceiptWithLines { receipt, lines }))
    }

    async fn list_receipts(
        &self,
        filter: &ReceiptQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ReceiptRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut items: Vec<ReceiptRecord> = state
            .receipts
            .values()
            .filter(|r| filter.owner_id.is_none_or(|owner| r.owner_id == owner))
            .filter(|r| filter.status.is_none_or(|status| r.status == status))
            .cloned()
            .collect();
        items.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(items, page))
    }

    async fn count_open_lines_for_component(&self, component_id: Uuid) -> Result<u64, RepoError> {
        let state = self.state.lock().await;
        Ok(to_u64(
            state
                .receipt_lines
                .values()
                .filter(|line| line.component_id == Some(component_id))
                .filter(|line| {
                    state
                        .receipts
                        .get(&line.receipt_id)
                        .is_some_and(|receipt| !receipt.status.is_terminal())
                })
                .count(),
        ))
    }
}

#[async_trait]
impl ReceiptsWriteRepo for InMemoryCatalog {
    async fn update_receipt_status(
        &self,
        id: Uuid,
        status: ReceiptStatus,
    ) -> Result<ReceiptRecord, RepoError> {
        let mut state = self.state.lock().await;
        let receipt = state.receipts.get_mut(&id).ok_or(RepoError::NotFound)?;
        receipt.status = status;
        receipt.updated_at = OffsetDateTime::now_utc();
        Ok(receipt.clone())
    }
}

#[async_trait]
impl CartRepo for InMemoryCatalog {
    async fn list_cart_items(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Paged<CartItemRecord>, RepoError> {
        let state = self.state.lock().await;
        let mut items: Vec<CartItemRecord> = state
            .cart_items
            .values()
            .filter(|item| item.owner_id == owner_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| (a.added_at, a.id).cmp(&(b.added_at, b.id)));
        Ok(paginate(items, page))
    }

    async fn find_cart_item(&self, id: Uuid) -> Result<Option<CartItemRecord>, RepoError> {
        Ok(self.state.lock().await.cart_items.get(&id).cloned())
    }

    async fn find_cart_item_for(
        &self,
        owner_id: Uuid,
        component_id: Uuid,
    ) -> Result<Option<CartItemRecord>, RepoError> {
        let state = self.state.lock().await;
        Ok(state
            .cart_items
            .values()
            .find(|item| item.owner_id == owner_id && item.component_id == component_id)
            .cloned())
    }
}

#[async_trait]
impl CartWriteRepo for InMemoryCatalog {
    async fn add_cart_item(&self, params: AddCartItemParams) -> Result<CartItemRecord, RepoError> {
        CatalogState::ensure_quantity(params.quantity)?;
        let mut state = self.state.lock().await;
        state.ensure_components([params.component_id])?;
        let taken = state
            .cart_items
            .values()
            .any(|item| item.owner_id == params.owner_id && item.component_id == params.component_id);
        if taken {
            return Err(RepoError::Duplicate {
                constraint: "cart_items_owner_component_key".to_string(),
            });
        }

        let now = OffsetDateTime::now_utc();
        let record = CartItemRecord {
            id: Uuid::new_v4(),
            owner_id: params.owner_id,
            component_id: params.component_id,
            quantity: params.quantity,
            added_at: now,
            updated_at: now,
        };
        state.cart_items.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<CartItemRecord, RepoError> {
        CatalogState::ensure_quantity(quantity)?;
        let mut state = self.state.lock().await;
        let item = state.cart_items.get_mut(&id).ok_or(RepoError::NotFound)?;
        item.quantity = quantity;
        item.updated_at = OffsetDateTime::now_utc();
        Ok(item.clone())
    }

    async fn remove_cart_item(&self, id: Uuid) -> Result<(), RepoError> {
        self.state
            .lock()
            .await
            .cart_items
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn clear_cart(&self, owner_id: Uuid) -> Result<u64, RepoError> {
        let mut state = self.state.lock().await;
        let before = state.cart_items.len();
        state.cart_items.retain(|_, item| item.owner_id != owner_id);
        Ok(to_u64(before - state.cart_items.len()))
    }
}

/// Convenience for seeding receipts in tests and demos.
pub fn receipt_line(
    receipt_id: Uuid,
    component: &ComponentRecord,
    quantity: i32,
) -> ReceiptLineRecord {
    ReceiptLineRecord {
        id: Uuid::new_v4(),
        receipt_id,
        component_id: Some(component.id),
        build_id: None,
        item_name: component.name.clone(),
        quantity,
        unit_price: component.price,
    }
}

/// A receipt header whose total matches `lines`.
pub fn receipt_for(
    id: Uuid,
    owner_id: Uuid,
    status: ReceiptStatus,
    lines: &[ReceiptLineRecord],
) -> ReceiptRecord {
    let now = OffsetDateTime::now_utc();
    let total_amount = lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum();
    ReceiptRecord {
        id,
        owner_id,
        total_amount,
        status,
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builds::{BuildLine, plan_reconciliation};

    async fn seeded_component(catalog: &InMemoryCatalog, name: &str) -> ComponentRecord {
        catalog
            .create_component(CreateComponentParams {
                name: name.to_string(),
                category_id: None,
                brand: None,
                price: Decimal::new(10_000, 2),
                stock_quantity: 5,
                description: None,
                image_url: None,
                is_active: true,
            })
            .await
            .expect("component")
    }

    #[tokio::test]
    async fn stale_version_is_reported_as_conflict() {
        let catalog = InMemoryCatalog::new();
        let component = seeded_component(&catalog, "PSU").await;

        let params = UpdateComponentParams {
            id: component.id,
            expected_version: component.version,
            name: "PSU 750W".to_string(),
            category_id: None,
            brand: None,
            price: component.price,
            stock_quantity: 5,
            description: None,
            image_url: None,
            is_active: true,
        };
        let updated = catalog
            .update_component(params.clone())
            .await
            .expect("first write");
        assert_eq!(updated.version, 1);

        let stale = catalog.update_component(params).await;
        assert!(matches!(stale, Err(RepoError::VersionConflict { expected: 0 })));
    }

    #[tokio::test]
    async fn prices_beyond_the_numeric_column_are_rejected() {
        let catalog = InMemoryCatalog::new();

        let result = catalog
            .create_component(CreateComponentParams {
                name: "Vault".to_string(),
                category_id: None,
                brand: None,
                price: Decimal::MAX,
                stock_quantity: 1,
                description: None,
                image_url: None,
                is_active: true,
            })
            .await;

        assert!(matches!(result, Err(RepoError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn build_with_unknown_component_leaves_nothing_behind() {
        let catalog = InMemoryCatalog::new();
        let known = seeded_component(&catalog, "CPU").await;

        let result = catalog
            .create_build(CreateBuildParams {
                name: "Broken".to_string(),
                description: None,
                is_public: false,
                created_by: Uuid::new_v4(),
                lines: vec![
                    BuildLine::new(known.id, 1),
                    BuildLine::new(Uuid::new_v4(), 1),
                ],
            })
            .await;

        assert!(matches!(result, Err(RepoError::InvalidInput { .. })));
        assert_eq!(catalog.build_count().await, 0);
        assert_eq!(catalog.count_build_references(known.id).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn diff_is_applied_to_one_build_only() {
        let catalog = InMemoryCatalog::new();
        let a = seeded_component(&catalog, "A").await;
        let b = seeded_component(&catalog, "B").await;
        let owner = Uuid::new_v4();

        let mut created = Vec::new();
        for name in ["first", "second"] {
            created.push(
                catalog
                    .create_build(CreateBuildParams {
                        name: name.to_string(),
                        description: None,
                        is_public: true,
                        created_by: owner,
                        lines: vec![BuildLine::new(a.id, 1)],
                    })
                    .await
                    .expect("build"),
            );
        }

        let target = &created[0];
        let diff = plan_reconciliation(&target.lines, &[BuildLine::new(b.id, 2)]);
        let updated = catalog
            .apply_build_update(
                UpdateBuildHeaderParams {
                    id: target.build.id,
                    name: "first".to_string(),
                    description: None,
                    is_public: true,
                },
                Some(diff),
            )
            .await
            .expect("update");

        assert_eq!(
            updated.lines,
            vec![BuildComponentRecord {
                build_id: target.build.id,
                component_id: b.id,
                quantity: 2,
            }]
        );
        let untouched = catalog
            .list_build_lines(created[1].build.id)
            .await
            .expect("lines");
        assert_eq!(untouched, created[1].lines);
    }

    #[tokio::test]
    async fn one_cart_row_per_owner_and_component() {
        let catalog = InMemoryCatalog::new();
        let component = seeded_component(&catalog, "Fan").await;
        let owner = Uuid::new_v4();
        let params = AddCartItemParams {
            owner_id: owner,
            component_id: component.id,
            quantity: 1,
        };

        catalog.add_cart_item(params.clone()).await.expect("first add");
        let again = catalog.add_cart_item(params).await;
        assert!(matches!(again, Err(RepoError::Duplicate { .. })));

        let other_owner = catalog
            .add_cart_item(AddCartItemParams {
                owner_id: Uuid::new_v4(),
                component_id: component.id,
                quantity: 2,
            })
            .await;
        assert!(other_owner.is_ok());

        assert_eq!(catalog.clear_cart(owner).await.expect("clear"), 1);
        let remaining = catalog
            .list_cart_items(owner, PageRequest::default())
            .await
            .expect("list");
        assert_eq!(remaining.total, 0);
    }

    #[tokio::test]
    async fn receipts_list_newest_first_per_owner() {
        let catalog = InMemoryCatalog::new();
        let component = seeded_component(&catalog, "HDD").await;
        let owner = Uuid::new_v4();
        let mut ids = Vec::new();
        for (offset, who) in [(0, owner), (1, Uuid::new_v4()), (2, owner)] {
            let id = Uuid::new_v4();
            let lines = vec![receipt_line(id, &component, 1)];
            let mut receipt = receipt_for(id, who, ReceiptStatus::Pending, &lines);
            receipt.created_at += time::Duration::seconds(offset);
            catalog.insert_receipt(receipt, lines).await.expect("receipt");
            ids.push(id);
        }

        let mine = catalog
            .list_receipts(
                &ReceiptQueryFilter {
                    owner_id: Some(owner),
                    status: None,
                },
                PageRequest::default(),
            )
            .await
            .expect("list");

        assert_eq!(mine.total, 2);
        let listed: Vec<Uuid> = mine.items.iter().map(|r| r.id).collect();
        assert_eq!(listed, vec![ids[2], ids[0]]);
    }

    #[tokio::test]
    async fn terminal_receipts_do_not_count_as_open() {
        let catalog = InMemoryCatalog::new();
        let component = seeded_component(&catalog, "SSD").await;
        let receipt_id = Uuid::new_v4();
        let lines = vec![receipt_line(receipt_id, &component, 1)];
        catalog
            .insert_receipt(
                receipt_for(receipt_id, Uuid::new_v4(), ReceiptStatus::Shipped, &lines),
                lines,
            )
            .await
            .expect("receipt");

        assert_eq!(
            catalog
                .count_open_lines_for_component(component.id)
                .await
                .expect("count"),
            1
        );

        catalog
            .update_receipt_status(receipt_id, ReceiptStatus::Delivered)
            .await
            .expect("status");

        assert_eq!(
            catalog
                .count_open_lines_for_component(component.id)
                .await
                .expect("count"),
            0
        );
    }
}
