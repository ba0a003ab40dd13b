//! Receipt lookup and status transitions.
//!
//! Receipts are created at order time elsewhere. Here they are read and listed
//! by their owner, listed across owners by an administrator, and moved through
//! statuses by an administrator. The status decides whether a receipt still
//! pins the components on its lines.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::application::components::require_admin;
use crate::application::dto::{ReceiptDto, ReceiptSummaryDto};
use crate::application::error::ServiceError;
use crate::application::identity::Actor;
use crate::application::pagination::{PageRequest, Paged};
use crate::application::repos::{ReceiptQueryFilter, ReceiptsRepo, ReceiptsWriteRepo};
use crate::cache::{CacheAside, CacheKey, CacheNamespace, Invalidation};
use crate::domain::types::ReceiptStatus;

#[derive(Clone)]
pub struct ReceiptService {
    reader: Arc<dyn ReceiptsRepo>,
    writer: Arc<dyn ReceiptsWriteRepo>,
    cache: CacheAside,
}

impl ReceiptService {
    pub fn new(
        reader: Arc<dyn ReceiptsRepo>,
        writer: Arc<dyn ReceiptsWriteRepo>,
        cache: CacheAside,
    ) -> Self {
        Self {
            reader,
            writer,
            cache,
        }
    }

    /// Customers always get their own receipts, whatever `filter.owner_id` says.
    /// Administrators get every owner's receipts unless they name one.
    pub async fn list(
        &self,
        actor: &Actor,
        filter: &ReceiptQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ReceiptSummaryDto>, ServiceError> {
        let filter = scoped_filter(actor, filter);
        let key = CacheKey::list(
            CacheNamespace::Receipts,
            &format!("{};{}", filter.canonical(), page.canonical()),
        );

        self.cache
            .get_or_load(&key, || async {
                let receipts = self.reader.list_receipts(&filter, page).await?;
                Ok::<_, ServiceError>(receipts.map(ReceiptSummaryDto::from))
            })
            .await
    }

    pub async fn get(&self, actor: &Actor, id: Uuid) -> Result<ReceiptDto, ServiceError> {
        let key = CacheKey::detail(CacheNamespace::Receipts, id);

        let receipt: ReceiptDto = self
            .cache
            .get_or_load(&key, || async {
                let found = self
                    .reader
                    .find_receipt(id)
                    .await?
                    .ok_or_else(|| ServiceError::not_found("receipt", id))?;
                ReceiptDto::from_parts(found.receipt, found.lines).map_err(ServiceError::from)
            })
            .await?;

        if !actor.may_manage(receipt.owner_id) {
            return Err(ServiceError::forbidden(format!(
                "actor {} may not view receipt {id}",
                actor.id
            )));
        }
        Ok(receipt)
    }

    /// Terminal receipts keep their status; asking for the current status is a no-op.
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: Uuid,
        status: ReceiptStatus,
    ) -> Result<ReceiptDto, ServiceError> {
        require_admin(actor, "change receipt status")?;

        let current = self
            .reader
            .find_receipt(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("receipt", id))?;

        let from = current.receipt.status;
        if from == status {
            return Ok(ReceiptDto::from_parts(current.receipt, current.lines)?);
        }
        if from.is_terminal() {
            return Err(ServiceError::conflict(format!(
                "receipt {id} is already {from} and cannot move to {status}"
            )));
        }

        let updated = self.writer.update_receipt_status(id, status).await?;
        info!(
            target = "pcshop::receipts",
            receipt_id = %id,
            actor_id = %actor.id,
            from = from.as_str(),
            to = status.as_str(),
            "receipt status changed"
        );

        self.cache
            .invalidate_all(&[
                Invalidation::detail(CacheNamespace::Receipts, id),
                Invalidation::lists(CacheNamespace::Receipts),
            ])
            .await;

        Ok(ReceiptDto::from_parts(updated, current.lines)?)
    }
}

fn scoped_filter(actor: &Actor, filter: &ReceiptQueryFilter) -> ReceiptQueryFilter {
    ReceiptQueryFilter {
        owner_id: if actor.is_admin() {
            filter.owner_id
        } else {
            Some(actor.id)
        },
        status: filter.status,
    }
}
