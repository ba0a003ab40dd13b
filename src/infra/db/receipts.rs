use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paged},
    application::repos::{
        ReceiptQueryFilter, ReceiptWithLines, ReceiptsRepo, ReceiptsWriteRepo, RepoError,
    },
    domain::entities::{ReceiptLineRecord, ReceiptRecord},
    domain::types::ReceiptStatus,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct ReceiptRow {
    id: Uuid,
    owner_id: Uuid,
    total_amount: Decimal,
    status: ReceiptStatus,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ReceiptRow> for ReceiptRecord {
    fn from(row: ReceiptRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            total_amount: row.total_amount,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ReceiptLineRow {
    id: Uuid,
    receipt_id: Uuid,
    component_id: Option<Uuid>,
    build_id: Option<Uuid>,
    item_name: String,
    quantity: i32,
    unit_price: Decimal,
}

impl From<ReceiptLineRow> for ReceiptLineRecord {
    fn from(row: ReceiptLineRow) -> Self {
        Self {
            id: row.id,
            receipt_id: row.receipt_id,
            component_id: row.component_id,
            build_id: row.build_id,
            item_name: row.item_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
        }
    }
}

fn apply_receipt_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &ReceiptQueryFilter) {
    qb.push(" WHERE TRUE");
    if let Some(owner_id) = filter.owner_id {
        qb.push(" AND owner_id = ");
        qb.push_bind(owner_id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ");
        qb.push_bind(status);
    }
}

#[async_trait]
impl ReceiptsRepo for PostgresRepositories {
    async fn find_receipt(&self, id: Uuid) -> Result<Option<ReceiptWithLines>, RepoError> {
        let Some(receipt) = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT id, owner_id, total_amount, status, created_at, updated_at
            FROM receipts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        else {
            return Ok(None);
        };

        let lines = sqlx::query_as::<_, ReceiptLineRow>(
            r#"
            SELECT id, receipt_id, component_id, build_id, item_name, quantity, unit_price
            FROM receipt_lines
            WHERE receipt_id = $1
            ORDER BY item_name, id
            "#,
        )
        .bind(id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Some(ReceiptWithLines {
            receipt: ReceiptRecord::from(receipt),
            lines: lines.into_iter().map(ReceiptLineRecord::from).collect(),
        }))
    }

    async fn list_receipts(
        &self,
        filter: &ReceiptQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ReceiptRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM receipts");
        apply_receipt_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(
            "SELECT id, owner_id, total_amount, status, created_at, updated_at FROM receipts",
        );
        apply_receipt_filter(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows: Vec<ReceiptRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Paged::new(
            rows.into_iter().map(ReceiptRecord::from).collect(),
            Self::convert_count(total)?,
            page,
        ))
    }

    async fn count_open_lines_for_component(&self, component_id: Uuid) -> Result<u64, RepoError> {
        let terminal: Vec<&str> = ReceiptStatus::TERMINAL
            .iter()
            .map(|status| status.as_str())
            .collect();
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM receipt_lines rl
            INNER JOIN receipts r ON r.id = rl.receipt_id
            WHERE rl.component_id = $1
              AND r.status::text <> ALL($2)
            "#,
        )
        .bind(component_id)
        .bind(terminal)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}

#[async_trait]
impl ReceiptsWriteRepo for PostgresRepositories {
    async fn update_receipt_status(
        &self,
        id: Uuid,
        status: ReceiptStatus,
    ) -> Result<ReceiptRecord, RepoError> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            UPDATE receipts
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, owner_id, total_amount, status, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ReceiptRecord::from).ok_or(RepoError::NotFound)
    }
}
