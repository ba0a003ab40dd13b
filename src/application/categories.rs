use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::components::require_admin;
use crate::application::dto::CategoryDto;
use crate::application::error::ServiceError;
use crate::application::identity::Actor;
use crate::application::pagination::{PageRequest, Paged};
use crate::application::repos::{
    CategoriesRepo, CategoriesWriteRepo, CategoryParams, CategoryQueryFilter,
};
use crate::cache::{CacheAside, CacheKey, CacheNamespace, Invalidation};

#[derive(Debug, Clone)]
pub struct CategoryCommand {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct CategoryService {
    reader: Arc<dyn CategoriesRepo>,
    writer: Arc<dyn CategoriesWriteRepo>,
    cache: CacheAside,
}

impl CategoryService {
    pub fn new(
        reader: Arc<dyn CategoriesRepo>,
        writer: Arc<dyn CategoriesWriteRepo>,
        cache: CacheAside,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
        }
    }

    pub async fn list(
        &self,
        filter: &CategoryQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<CategoryDto>, ServiceError> {
        let key = CacheKey::list(
            CacheNamespace::Categories,
            &format!("{};{}", filter.canonical(), page.canonical()),
        );

        self.cache
            .get_or_load(&key, || async {
                let records = self.reader.list_categories(filter, page).await?;
                Ok(records.map(CategoryDto::from))
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<CategoryDto, ServiceError> {
        let key = CacheKey::detail(CacheNamespace::Categories, id);

        self.cache
            .get_or_load(&key, || async {
                self.reader
                    .find_category(id)
                    .await?
                    .map(CategoryDto::from)
                    .ok_or_else(|| ServiceError::not_found("category", id))
            })
            .await
    }

    pub async fn create(
        &self,
        actor: &Actor,
        command: CategoryCommand,
    ) -> Result<CategoryDto, ServiceError> {
        require_admin(actor, "create categories")?;
        let params = validate(command)?;

        let category = self.writer.create_category(params).await?;
        info!(
            target = "pcshop::categories",
            category_id = %category.id,
            actor_id = %actor.id,
            "category created"
        );

        self.invalidate(category.id).await;
        Ok(CategoryDto::from(category))
    }

    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        command: CategoryCommand,
    ) -> Result<CategoryDto, ServiceError> {
        require_admin(actor, "update categories")?;
        let params = validate(command)?;

        self.reader
            .find_category(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("category", id))?;

        let category = self.writer.update_category(id, params).await?;
        info!(
            target = "pcshop::categories",
            category_id = %id,
            actor_id = %actor.id,
            "category updated"
        );

        self.invalidate(id).await;
        Ok(CategoryDto::from(category))
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
        require_admin(actor, "delete categories")?;

        let category = self
            .reader
            .find_category(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("category", id))?;

        let in_use = self.reader.count_components_in(id).await?;
        if in_use > 0 {
            return Err(ServiceError::conflict(format!(
                "category '{}' ({id}) still has {in_use} component(s)",
                category.name
            )));
        }

        self.writer.delete_category(id).await?;
        info!(
            target = "pcshop::categories",
            category_id = %id,
            actor_id = %actor.id,
            "category deleted"
        );

        self.invalidate(id).await;
        Ok(())
    }

    /// Category names are embedded in component and build views.
    async fn invalidate(&self, id: Uuid) {
        self.cache
            .invalidate_all(&[
                Invalidation::detail(CacheNamespace::Categories, id),
                Invalidation::lists(CacheNamespace::Categories),
                Invalidation::namespace(CacheNamespace::Components),
                Invalidation::namespace(CacheNamespace::Builds),
            ])
            .await;
    }
}

fn validate(command: CategoryCommand) -> Result<CategoryParams, ServiceError> {
    let name = command.name.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("category name must not be empty"));
    }
    Ok(CategoryParams {
        name: name.to_string(),
        description: command
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty()),
    })
}
