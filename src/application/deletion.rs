//! Guarded removal of components.
//!
//! A component still used by a build, or by a receipt line whose receipt has not
//! reached a terminal status, cannot be removed. Otherwise it is soft-deleted:
//! flagged inactive, row kept, so historical receipts keep resolving.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::error::ServiceError;
use crate::application::repos::{ComponentsRepo, ComponentsWriteRepo, ReceiptsRepo};
use crate::cache::{CacheAside, CacheNamespace, Invalidation};
use crate::domain::entities::ComponentRecord;

#[derive(Clone)]
pub struct DeletionGuard {
    components: Arc<dyn ComponentsRepo>,
    writer: Arc<dyn ComponentsWriteRepo>,
    receipts: Arc<dyn ReceiptsRepo>,
    cache: CacheAside,
}

impl DeletionGuard {
    pub fn new(
        components: Arc<dyn ComponentsRepo>,
        writer: Arc<dyn ComponentsWriteRepo>,
        receipts: Arc<dyn ReceiptsRepo>,
        cache: CacheAside,
    ) -> Self {
        Self {
            components,
            writer,
            receipts,
            cache,
        }
    }

    pub async fn soft_delete(&self, id: Uuid) -> Result<ComponentRecord, ServiceError> {
        let component = self
            .components
            .find_component(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("component", id))?;

        let build_refs = self.components.count_build_references(id).await?;
        let open_lines = self.receipts.count_open_lines_for_component(id).await?;

        if build_refs > 0 || open_lines > 0 {
            return Err(ServiceError::conflict(format!(
                "component '{}' ({id}) cannot be deleted: referenced by {build_refs} build(s) \
                 and {open_lines} open receipt line(s)",
                component.name
            )));
        }

        let updated = self.writer.deactivate_component(id).await?;
        info!(
            target = "pcshop::components",
            component_id = %id,
            "component soft-deleted"
        );

        self.cache
            .invalidate_all(&component_write_invalidations(id))
            .await;

        Ok(updated)
    }
}

/// Everything a component's name, price, stock or activity can appear in.
pub(crate) fn component_write_invalidations(id: Uuid) -> [Invalidation; 4] {
    [
        Invalidation::detail(CacheNamespace::Components, id),
        Invalidation::lists(CacheNamespace::Components),
        Invalidation::namespace(CacheNamespace::Builds),
        Invalidation::lists(CacheNamespace::Cart),
    ]
}
