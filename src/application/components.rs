use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::application::deletion::{DeletionGuard, component_write_invalidations};
use crate::application::dto::{ComponentDto, ComponentSpecDto};
use crate::application::error::ServiceError;
use crate::application::identity::Actor;
use crate::application::pagination::{PageRequest, Paged};
use crate::application::repos::{
    CategoriesRepo, ComponentQueryFilter, ComponentSort, ComponentsRepo, ComponentsWriteRepo,
    CreateComponentParams, CreateSpecParams, SpecQueryFilter, UpdateComponentParams,
    UpdateSpecParams,
};
use crate::application::retry::OptimisticRetry;
use crate::cache::{CacheAside, CacheKey, CacheNamespace, Invalidation};
use crate::domain::entities::ComponentRecord;
use crate::domain::pricing::price_problems;

#[derive(Debug, Clone)]
pub struct CreateComponentCommand {
    pub name: String,
    pub category_id: Option<Uuid>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub stock_quantity: i32,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Field replacements; `None` keeps the stored value. Values are absolute, never deltas.
#[derive(Debug, Clone, Default)]
pub struct UpdateComponentCommand {
    pub name: Option<String>,
    pub category_id: Option<Option<Uuid>>,
    pub brand: Option<Option<String>>,
    pub price: Option<Decimal>,
    pub stock_quantity: Option<i32>,
    pub description: Option<Option<String>>,
    pub image_url: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SpecCommand {
    pub spec_key: String,
    pub spec_value: String,
    pub display_order: Option<i32>,
}

#[derive(Clone)]
pub struct ComponentService {
    reader: Arc<dyn ComponentsRepo>,
    writer: Arc<dyn ComponentsWriteRepo>,
    categories: Arc<dyn CategoriesRepo>,
    guard: DeletionGuard,
    retry: OptimisticRetry,
    cache: CacheAside,
}

impl ComponentService {
    pub fn new(
        reader: Arc<dyn ComponentsRepo>,
        writer: Arc<dyn ComponentsWriteRepo>,
        categories: Arc<dyn CategoriesRepo>,
        guard: DeletionGuard,
        retry: OptimisticRetry,
        cache: CacheAside,
    ) -> Self {
        Self {
            reader,
            writer,
            categories,
            guard,
            retry,
            cache,
        }
    }

    pub async fn list(
        &self,
        filter: &ComponentQueryFilter,
        sort: ComponentSort,
        page: PageRequest,
    ) -> Result<Paged<ComponentDto>, ServiceError> {
        let key = CacheKey::list(
            CacheNamespace::Components,
            &format!("{};sort={};{}", filter.canonical(), sort.as_str(), page.canonical()),
        );

        self.cache
            .get_or_load(&key, || async {
                let records = self.reader.list_components(filter, sort, page).await?;
                let Paged {
                    items,
                    total,
                    page,
                    page_size,
                } = records;
                let items = self.assemble(items).await?;
                Ok(Paged {
                    items,
                    total,
                    page,
                    page_size,
                })
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<ComponentDto, ServiceError> {
        let key = CacheKey::detail(CacheNamespace::Components, id);

        self.cache
            .get_or_load(&key, || async {
                let component = self
                    .reader
                    .find_component(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("component", id))?;
                let mut assembled = self.assemble(vec![component]).await?;
                assembled
                    .pop()
                    .ok_or_else(|| ServiceError::not_found("component", id))
            })
            .await
    }

    pub async fn create(
        &self,
        actor: &Actor,
        command: CreateComponentCommand,
    ) -> Result<ComponentDto, ServiceError> {
        require_admin(actor, "create components")?;

        let name = command.name.trim().to_string();
        let mut problems = field_problems(Some(&name), Some(command.price), Some(command.stock_quantity));
        if let Some(category_id) = command.category_id
            && self.categories.find_category(category_id).await?.is_none()
        {
            problems.push(format!("category {category_id} does not exist"));
        }
        if !problems.is_empty() {
            return Err(ServiceError::validation_many(problems));
        }

        let component = self
            .writer
            .create_component(CreateComponentParams {
                name,
                category_id: command.category_id,
                brand: normalize_optional(command.brand),
                price: command.price,
                stock_quantity: command.stock_quantity,
                description: normalize_optional(command.description),
                image_url: normalize_optional(command.image_url),
                is_active: command.is_active.unwrap_or(true),
            })
            .await?;

        info!(
            target = "pcshop::components",
            component_id = %component.id,
            actor_id = %actor.id,
            "component created"
        );

        self.cache
            .invalidate(&Invalidation::lists(CacheNamespace::Components))
            .await;

        self.to_dto(component).await
    }

    /// Apply field replacements under optimistic concurrency.
    ///
    /// Each attempt reads the current record and re-applies `command` on top of
    /// it. A version conflict on the write triggers another attempt until the
    /// retry budget is spent.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        command: UpdateComponentCommand,
    ) -> Result<ComponentDto, ServiceError> {
        require_admin(actor, "update components")?;

        let name = command.name.as_deref().map(str::trim);
        let mut problems = field_problems(name, command.price, command.stock_quantity);
        if let Some(Some(category_id)) = command.category_id
            && self.categories.find_category(category_id).await?.is_none()
        {
            problems.push(format!("category {category_id} does not exist"));
        }
        if !problems.is_empty() {
            return Err(ServiceError::validation_many(problems));
        }

        let updated = self
            .retry
            .run("component", |_| async {
                let current = self
                    .reader
                    .find_component(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("component", id))?;
                let params = apply_update(current, &command);
                self.writer
                    .update_component(params)
                    .await
                    .map_err(ServiceError::from)
            })
            .await?;

        info!(
            target = "pcshop::components",
            component_id = %id,
            actor_id = %actor.id,
            version = updated.version,
            "component updated"
        );

        self.cache
            .invalidate_all(&component_write_invalidations(id))
            .await;

        self.to_dto(updated).await
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
        require_admin(actor, "delete components")?;
        self.guard.soft_delete(id).await?;
        info!(
            target = "pcshop::components",
            component_id = %id,
            actor_id = %actor.id,
            "component delete accepted"
        );
        Ok(())
    }

    pub async fn get_spec(&self, spec_id: Uuid) -> Result<ComponentSpecDto, ServiceError> {
        let key = CacheKey::detail(CacheNamespace::Specs, spec_id);

        self.cache
            .get_or_load(&key, || async {
                self.reader
                    .find_spec(spec_id)
                    .await?
                    .map(ComponentSpecDto::from)
                    .ok_or_else(|| ServiceError::not_found("component spec", spec_id))
            })
            .await
    }

    pub async fn list_specs(
        &self,
        filter: &SpecQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ComponentSpecDto>, ServiceError> {
        let key = CacheKey::list(
            CacheNamespace::Specs,
            &format!("{};{}", filter.canonical(), page.canonical()),
        );

        self.cache
            .get_or_load(&key, || async {
                let specs = self.reader.search_specs(filter, page).await?;
                Ok::<_, ServiceError>(specs.map(ComponentSpecDto::from))
            })
            .await
    }

    pub async fn add_spec(
        &self,
        actor: &Actor,
        component_id: Uuid,
        command: SpecCommand,
    ) -> Result<ComponentSpecDto, ServiceError> {
        require_admin(actor, "edit component specs")?;
        let command = validate_spec(command)?;
        self.reader
            .find_component(component_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("component", component_id))?;

        let spec = self
            .writer
            .create_spec(CreateSpecParams {
                component_id,
                spec_key: command.spec_key,
                spec_value: command.spec_value,
                display_order: command.display_order,
            })
            .await?;

        self.invalidate_specs(component_id, spec.id).await;
        Ok(ComponentSpecDto::from(spec))
    }

    pub async fn update_spec(
        &self,
        actor: &Actor,
        spec_id: Uuid,
        command: SpecCommand,
    ) -> Result<ComponentSpecDto, ServiceError> {
        require_admin(actor, "edit component specs")?;
        let command = validate_spec(command)?;
        let existing = self
            .reader
            .find_spec(spec_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("component spec", spec_id))?;

        let spec = self
            .writer
            .update_spec(UpdateSpecParams {
                id: spec_id,
                spec_key: command.spec_key,
                spec_value: command.spec_value,
                display_order: command.display_order,
            })
            .await?;

        self.invalidate_specs(existing.component_id, spec_id).await;
        Ok(ComponentSpecDto::from(spec))
    }

    pub async fn remove_spec(&self, actor: &Actor, spec_id: Uuid) -> Result<(), ServiceError> {
        require_admin(actor, "edit component specs")?;
        let existing = self
            .reader
            .find_spec(spec_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("component spec", spec_id))?;

        self.writer.delete_spec(spec_id).await?;
        self.invalidate_specs(existing.component_id, spec_id).await;
        Ok(())
    }

    /// Specs are embedded in component reads only; builds and carts never show them.
    async fn invalidate_specs(&self, component_id: Uuid, spec_id: Uuid) {
        self.cache
            .invalidate_all(&[
                Invalidation::detail(CacheNamespace::Components, component_id),
                Invalidation::lists(CacheNamespace::Components),
                Invalidation::detail(CacheNamespace::Specs, spec_id),
                Invalidation::lists(CacheNamespace::Specs),
            ])
            .await;
    }

    async fn to_dto(&self, component: ComponentRecord) -> Result<ComponentDto, ServiceError> {
        let id = component.id;
        self.assemble(vec![component])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("component", id))
    }

    /// Attach category names and specs with one batch query each.
    async fn assemble(
        &self,
        components: Vec<ComponentRecord>,
    ) -> Result<Vec<ComponentDto>, ServiceError> {
        let component_ids: Vec<Uuid> = components.iter().map(|c| c.id).collect();
        let mut category_ids: Vec<Uuid> = components.iter().filter_map(|c| c.category_id).collect();
        category_ids.sort_unstable();
        category_ids.dedup();

        let categories: HashMap<Uuid, String> = self
            .categories
            .find_categories(&category_ids)
            .await?
            .into_iter()
            .map(|category| (category.id, category.name))
            .collect();

        let mut specs: HashMap<Uuid, Vec<_>> = HashMap::new();
        for spec in self.reader.list_specs_for(&component_ids).await? {
            specs.entry(spec.component_id).or_default().push(spec);
        }

        Ok(components
            .into_iter()
            .map(|component| {
                let category_name = component
                    .category_id
                    .and_then(|id| categories.get(&id))
                    .map(String::as_str);
                let component_specs = specs.remove(&component.id).unwrap_or_default();
                ComponentDto::from_parts(component, category_name, component_specs)
            })
            .collect())
    }
}

pub(crate) fn require_admin(actor: &Actor, action: &str) -> Result<(), ServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden(format!(
            "actor {} may not {action}",
            actor.id
        )))
    }
}

fn field_problems(name: Option<&str>, price: Option<Decimal>, stock: Option<i32>) -> Vec<String> {
    let mut problems = Vec::new();
    if name.is_some_and(str::is_empty) {
        problems.push("name must not be empty".to_string());
    }
    if let Some(price) = price {
        problems.extend(price_problems(price));
    }
    if let Some(stock) = stock
        && stock < 0
    {
        problems.push(format!("stock quantity must not be negative, got {stock}"));
    }
    problems
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn apply_update(current: ComponentRecord, command: &UpdateComponentCommand) -> UpdateComponentParams {
    UpdateComponentParams {
        id: current.id,
        expected_version: current.version,
        name: command
            .name
            .as_deref()
            .map(|name| name.trim().to_string())
            .unwrap_or(current.name),
        category_id: command.category_id.unwrap_or(current.category_id),
        brand: match &command.brand {
            Some(brand) => normalize_optional(brand.clone()),
            None => current.brand,
        },
        price: command.price.unwrap_or(current.price),
        stock_quantity: command.stock_quantity.unwrap_or(current.stock_quantity),
        description: match &command.description {
            Some(description) => normalize_optional(description.clone()),
            None => current.description,
        },
        image_url: match &command.image_url {
            Some(url) => normalize_optional(url.clone()),
            None => current.image_url,
        },
        is_active: command.is_active.unwrap_or(current.is_active),
    }
}

fn validate_spec(command: SpecCommand) -> Result<SpecCommand, ServiceError> {
    let spec_key = command.spec_key.trim().to_string();
    let spec_value = command.spec_value.trim().to_string();
    let mut problems = Vec::new();
    if spec_key.is_empty() {
        problems.push("spec key must not be empty".to_string());
    }
    if spec_value.is_empty() {
        problems.push("spec value must not be empty".to_string());
    }
    if !problems.is_empty() {
        return Err(ServiceError::validation_many(problems));
    }
    Ok(SpecCommand {
        spec_key,
        spec_value,
        display_order: command.display_order,
    })
}
