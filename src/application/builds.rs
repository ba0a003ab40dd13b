//! Build reconciliation service.
//!
//! Creates builds from a requested component list and reconciles an existing
//! build's rows against a new desired list. Requested lines are folded per
//! component, then checked against stock and activity before anything is
//! written. Stock is only checked, never reserved, so two concurrent builds may
//! both pass against the same stock figure.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::application::dto::BuildDto;
use crate::application::error::ServiceError;
use crate::application::identity::Actor;
use crate::application::pagination::{PageRequest, Paged};
use crate::application::repos::{
    BuildQueryFilter, BuildSort, BuildWithLines, BuildsRepo, BuildsWriteRepo, CategoriesRepo,
    ComponentsRepo, CreateBuildParams, UpdateBuildHeaderParams,
};
use crate::application::stock::StockValidator;
use crate::cache::{CacheAside, CacheKey, CacheNamespace, Invalidation};
use crate::domain::builds::{BuildLine, LineError, normalize_lines, plan_reconciliation};
use crate::domain::entities::{BuildComponentRecord, BuildRecord, ComponentRecord};
use crate::domain::pricing::total_price;

#[derive(Debug, Clone)]
pub struct CreateBuildCommand {
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub components: Vec<BuildLine>,
}

/// Header fields are replaced wholesale. `components: None` leaves rows untouched.
#[derive(Debug, Clone)]
pub struct UpdateBuildCommand {
    pub name: String,
    pub description: Option<String>,
    pub is_public: bool,
    pub components: Option<Vec<BuildLine>>,
}

#[derive(Clone)]
pub struct BuildService {
    reader: Arc<dyn BuildsRepo>,
    writer: Arc<dyn BuildsWriteRepo>,
    components: Arc<dyn ComponentsRepo>,
    categories: Arc<dyn CategoriesRepo>,
    validator: StockValidator,
    cache: CacheAside,
}

impl BuildService {
    pub fn new(
        reader: Arc<dyn BuildsRepo>,
        writer: Arc<dyn BuildsWriteRepo>,
        components: Arc<dyn ComponentsRepo>,
        categories: Arc<dyn CategoriesRepo>,
        cache: CacheAside,
    ) -> Self {
        let validator = StockValidator::new(components.clone());
        Self {
            reader,
            writer,
            components,
            categories,
            validator,
            cache,
        }
    }

    pub async fn list(
        &self,
        filter: &BuildQueryFilter,
        sort: BuildSort,
        page: PageRequest,
    ) -> Result<Paged<BuildDto>, ServiceError> {
        let key = CacheKey::list(
            CacheNamespace::Builds,
            &format!("{};sort={};{}", filter.canonical(), sort.as_str(), page.canonical()),
        );

        self.cache
            .get_or_load(&key, || async {
                let Paged {
                    items,
                    total,
                    page,
                    page_size,
                } = self.reader.list_builds(filter, sort, page).await?;
                let ids: Vec<Uuid> = items.iter().map(|build| build.id).collect();
                let lines = self.reader.list_lines_for_builds(&ids).await?;
                let items = self.assemble(items, &lines).await?;
                Ok(Paged {
                    items,
                    total,
                    page,
                    page_size,
                })
            })
            .await
    }

    /// Private builds are visible to their owner and administrators only.
    pub async fn get(&self, viewer: Option<&Actor>, id: Uuid) -> Result<BuildDto, ServiceError> {
        let key = CacheKey::detail(CacheNamespace::Builds, id);

        let build: BuildDto = self
            .cache
            .get_or_load(&key, || async {
                let build = self
                    .reader
                    .find_build(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("build", id))?;
                let lines = self.reader.list_build_lines(id).await?;
                self.assemble_one(build, &lines).await
            })
            .await?;

        if !build.is_public && !viewer.is_some_and(|actor| actor.may_manage(build.created_by)) {
            return Err(ServiceError::forbidden(format!("build {id} is private")));
        }
        Ok(build)
    }

    pub async fn create(
        &self,
        actor: &Actor,
        command: CreateBuildCommand,
    ) -> Result<BuildDto, ServiceError> {
        let name = validate_name(&command.name)?;
        let lines = normalize(&command.components)?;
        let found = self.validator.validate(&lines).await?;
        ensure_total_in_range(&lines, &found)?;

        let BuildWithLines { build, lines } = self
            .writer
            .create_build(CreateBuildParams {
                name,
                description: normalize_description(command.description),
                is_public: command.is_public,
                created_by: actor.id,
                lines,
            })
            .await?;

        info!(
            target = "pcshop::builds",
            build_id = %build.id,
            actor_id = %actor.id,
            components = lines.len(),
            "build created"
        );

        self.cache
            .invalidate(&Invalidation::lists(CacheNamespace::Builds))
            .await;

        self.assemble_one(build, &lines).await
    }

    /// Update header fields and, when a component list is given, reconcile rows.
    ///
    /// Rows present only in the stored set are removed, rows in both get the new
    /// quantity, rows only in the desired set are inserted. Input order does not
    /// matter.
    pub async fn update(
        &self,
        actor: &Actor,
        id: Uuid,
        command: UpdateBuildCommand,
    ) -> Result<BuildDto, ServiceError> {
        let existing = self.owned_build(actor, id).await?;
        let name = validate_name(&command.name)?;

        let diff = match &command.components {
            None => None,
            Some(requested) => {
                let desired = normalize(requested)?;
                let found = self.validator.validate(&desired).await?;
                ensure_total_in_range(&desired, &found)?;
                let current = self.reader.list_build_lines(existing.id).await?;
                let diff = plan_reconciliation(&current, &desired);
                debug!(
                    target = "pcshop::builds",
                    build_id = %id,
                    remove = diff.remove.len(),
                    update = diff.update.len(),
                    insert = diff.insert.len(),
                    "planned build reconciliation"
                );
                Some(diff)
            }
        };

        let BuildWithLines { build, lines } = self
            .writer
            .apply_build_update(
                UpdateBuildHeaderParams {
                    id,
                    name,
                    description: normalize_description(command.description),
                    is_public: command.is_public,
                },
                diff,
            )
            .await?;

        info!(
            target = "pcshop::builds",
            build_id = %id,
            actor_id = %actor.id,
            reconciled = command.components.is_some(),
            "build updated"
        );

        self.invalidate_build(id).await;
        self.assemble_one(build, &lines).await
    }

    pub async fn delete(&self, actor: &Actor, id: Uuid) -> Result<(), ServiceError> {
        self.owned_build(actor, id).await?;
        self.writer.delete_build(id).await?;

        info!(
            target = "pcshop::builds",
            build_id = %id,
            actor_id = %actor.id,
            "build deleted"
        );

        self.invalidate_build(id).await;
        Ok(())
    }

    /// Missing builds are `NotFound`; foreign builds are `Forbidden`.
    async fn owned_build(&self, actor: &Actor, id: Uuid) -> Result<BuildRecord, ServiceError> {
        let build = self
            .reader
            .find_build(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("build", id))?;

        if !actor.may_manage(build.created_by) {
            return Err(ServiceError::forbidden(format!(
                "actor {} does not own build {id}",
                actor.id
            )));
        }
        Ok(build)
    }

    async fn invalidate_build(&self, id: Uuid) {
        self.cache
            .invalidate_all(&[
                Invalidation::detail(CacheNamespace::Builds, id),
                Invalidation::lists(CacheNamespace::Builds),
            ])
            .await;
    }

    async fn assemble_one(
        &self,
        build: BuildRecord,
        lines: &[BuildComponentRecord],
    ) -> Result<BuildDto, ServiceError> {
        let id = build.id;
        self.assemble(vec![build], lines)
            .await?
            .pop()
            .ok_or_else(|| ServiceError::not_found("build", id))
    }

    async fn assemble(
        &self,
        builds: Vec<BuildRecord>,
        lines: &[BuildComponentRecord],
    ) -> Result<Vec<BuildDto>, ServiceError> {
        let mut component_ids: Vec<Uuid> = lines.iter().map(|line| line.component_id).collect();
        component_ids.sort_unstable();
        component_ids.dedup();

        let components: HashMap<_, _> = self
            .components
            .find_components(&component_ids)
            .await?
            .into_iter()
            .map(|component| (component.id, component))
            .collect();

        let mut category_ids: Vec<Uuid> =
            components.values().filter_map(|c| c.category_id).collect();
        category_ids.sort_unstable();
        category_ids.dedup();

        let categories: HashMap<_, _> = self
            .categories
            .find_categories(&category_ids)
            .await?
            .into_iter()
            .map(|category| (category.id, category))
            .collect();

        builds
            .into_iter()
            .map(|build| {
                BuildDto::from_parts(build, lines, &components, &categories)
                    .map_err(ServiceError::from)
            })
            .collect()
    }
}

fn validate_name(raw: &str) -> Result<String, ServiceError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ServiceError::validation("build name must not be empty"));
    }
    Ok(name.to_string())
}

fn normalize_description(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Reject a build whose price cannot be represented before anything is written.
fn ensure_total_in_range(
    lines: &[BuildLine],
    components: &HashMap<Uuid, ComponentRecord>,
) -> Result<(), ServiceError> {
    let priced = lines.iter().filter_map(|line| {
        components
            .get(&line.component_id)
            .map(|component| (component.price, line.quantity))
    });
    total_price(priced)
        .map(|_| ())
        .map_err(|_| ServiceError::validation("build total exceeds the supported price range"))
}

fn normalize(lines: &[BuildLine]) -> Result<Vec<BuildLine>, ServiceError> {
    normalize_lines(lines).map_err(|errors| {
        ServiceError::validation_many(errors.iter().map(LineError::to_string).collect())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_names_are_rejected() {
        assert!(matches!(
            validate_name("   "),
            Err(ServiceError::Validation { .. })
        ));
        assert_eq!(validate_name("  Gaming rig ").expect("valid"), "Gaming rig");
    }

    #[test]
    fn line_problems_become_validation_messages() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let error = normalize(&[BuildLine::new(a, 0), BuildLine::new(b, -2)])
            .expect_err("non-positive quantities");

        let messages = error.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.contains(&a.to_string())));
        assert!(messages.iter().any(|m| m.contains(&b.to_string())));
    }

    #[test]
    fn unrepresentable_totals_are_rejected_before_writing() {
        let now = time::OffsetDateTime::now_utc();
        let component = ComponentRecord {
            id: Uuid::new_v4(),
            name: "Vault".to_string(),
            category_id: None,
            brand: None,
            price: rust_decimal::Decimal::MAX,
            stock_quantity: 10,
            description: None,
            image_url: None,
            is_active: true,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        let lines = [BuildLine::new(component.id, 2)];
        let found = HashMap::from([(component.id, component)]);

        let error = ensure_total_in_range(&lines, &found).expect_err("overflow");
        assert!(matches!(error, ServiceError::Validation { .. }));
    }

    #[test]
    fn empty_component_list_is_rejected() {
        let error = normalize(&[]).expect_err("empty");
        assert!(matches!(error, ServiceError::Validation { .. }));
    }
}
