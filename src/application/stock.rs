//! Stock and activity checks for requested build lines.

use std::collections::HashMap;
use std::sync::Arc;

use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::repos::ComponentsRepo;
use crate::domain::builds::BuildLine;
use crate::domain::entities::ComponentRecord;

#[derive(Clone)]
pub struct StockValidator {
    components: Arc<dyn ComponentsRepo>,
}

impl StockValidator {
    pub fn new(components: Arc<dyn ComponentsRepo>) -> Self {
        Self { components }
    }

    /// Check that every line references an existing, active component with enough stock.
    ///
    /// Components are fetched in one batch. All problems are collected into a
    /// single `Validation` error: missing and inactive ids first, then stock
    /// shortfalls for the remaining components. On success the fetched records are
    /// returned keyed by id.
    pub async fn validate(
        &self,
        lines: &[BuildLine],
    ) -> Result<HashMap<Uuid, ComponentRecord>, ServiceError> {
        let ids: Vec<Uuid> = lines.iter().map(|line| line.component_id).collect();
        let found: HashMap<Uuid, ComponentRecord> = self
            .components
            .find_components(&ids)
            .await?
            .into_iter()
            .map(|component| (component.id, component))
            .collect();

        let mut unavailable = Vec::new();
        let mut shortfalls = Vec::new();

        for line in lines {
            match found.get(&line.component_id) {
                None => unavailable.push(format!(
                    "component {} does not exist",
                    line.component_id
                )),
                Some(component) if !component.is_active => unavailable.push(format!(
                    "component '{}' ({}) is inactive",
                    component.name, component.id
                )),
                Some(component) if line.quantity > component.stock_quantity => {
                    shortfalls.push(format!(
                        "component '{}' ({}) has insufficient stock. available: {}, requested: {}",
                        component.name, component.id, component.stock_quantity, line.quantity
                    ))
                }
                Some(_) => {}
            }
        }

        if unavailable.is_empty() && shortfalls.is_empty() {
            return Ok(found);
        }

        unavailable.extend(shortfalls);
        Err(ServiceError::validation_many(unavailable))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use time::OffsetDateTime;

    use super::*;
    use crate::application::pagination::{PageRequest, Paged};
    use crate::application::repos::{
        ComponentQueryFilter, ComponentSort, RepoError, SpecQueryFilter,
    };
    use crate::domain::entities::ComponentSpecRecord;

    struct StubComponents {
        records: Vec<ComponentRecord>,
    }

    #[async_trait]
    impl ComponentsRepo for StubComponents {
        async fn list_components(
            &self,
            _filter: &ComponentQueryFilter,
            _sort: ComponentSort,
            page: PageRequest,
        ) -> Result<Paged<ComponentRecord>, RepoError> {
            Ok(Paged::new(self.records.clone(), self.records.len() as u64, page))
        }

        async fn find_component(&self, id: Uuid) -> Result<Option<ComponentRecord>, RepoError> {
            Ok(self.records.iter().find(|c| c.id == id).cloned())
        }

        async fn find_components(&self, ids: &[Uuid]) -> Result<Vec<ComponentRecord>, RepoError> {
            Ok(self
                .records
                .iter()
                .filter(|c| ids.contains(&c.id))
                .cloned()
                .collect())
        }

        async fn list_specs(
            &self,
            _component_id: Uuid,
        ) -> Result<Vec<ComponentSpecRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn list_specs_for(
            &self,
            _component_ids: &[Uuid],
        ) -> Result<Vec<ComponentSpecRecord>, RepoError> {
            Ok(Vec::new())
        }

        async fn find_spec(&self, _id: Uuid) -> Result<Option<ComponentSpecRecord>, RepoError> {
            Ok(None)
        }

        async fn search_specs(
            &self,
            _filter: &SpecQueryFilter,
            page: PageRequest,
        ) -> Result<Paged<ComponentSpecRecord>, RepoError> {
            Ok(Paged::new(Vec::new(), 0, page))
        }

        async fn count_build_references(&self, _component_id: Uuid) -> Result<u64, RepoError> {
            Ok(0)
        }
    }

    fn component(name: &str, stock: i32, active: bool) -> ComponentRecord {
        let now = OffsetDateTime::now_utc();
        ComponentRecord {
            id: Uuid::new_v4(),
            name: name.to_string(),
            category_id: None,
            brand: None,
            price: Decimal::new(10_000, 2),
            stock_quantity: stock,
            description: None,
            image_url: None,
            is_active: active,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn validator(records: Vec<ComponentRecord>) -> StockValidator {
        StockValidator::new(Arc::new(StubComponents { records }))
    }

    #[tokio::test]
    async fn passes_when_stock_covers_request() {
        let gpu = component("GPU", 3, true);
        let result = validator(vec![gpu.clone()])
            .validate(&[BuildLine::new(gpu.id, 3)])
            .await
            .expect("valid");
        assert_eq!(result.get(&gpu.id), Some(&gpu));
    }

    #[tokio::test]
    async fn reports_available_and_requested_quantities() {
        let gpu = component("GPU", 3, true);
        let err = validator(vec![gpu.clone()])
            .validate(&[BuildLine::new(gpu.id, 5)])
            .await
            .expect_err("insufficient stock");

        let ServiceError::Validation { messages } = err else {
            panic!("expected validation error");
        };
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("GPU"));
        assert!(messages[0].contains("available: 3"));
        assert!(messages[0].contains("requested: 5"));
    }

    #[tokio::test]
    async fn reports_every_missing_and_inactive_component() {
        let missing = Uuid::new_v4();
        let inactive = component("Old CPU", 10, false);
        let valid = component("PSU", 10, true);

        let err = validator(vec![inactive.clone(), valid.clone()])
            .validate(&[
                BuildLine::new(missing, 1),
                BuildLine::new(inactive.id, 1),
                BuildLine::new(valid.id, 1),
            ])
            .await
            .expect_err("invalid lines");

        let messages = err.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages.iter().any(|m| m.contains(&missing.to_string())));
        assert!(messages.iter().any(|m| m.contains(&inactive.id.to_string())));
    }
}
