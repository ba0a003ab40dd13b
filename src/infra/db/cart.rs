use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paged},
    application::repos::{AddCartItemParams, CartRepo, CartWriteRepo, RepoError},
    domain::entities::CartItemRecord,
};

use super::{PostgresRepositories, map_sqlx_error};

const CART_COLUMNS: &str = "id, owner_id, component_id, quantity, added_at, updated_at";

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    owner_id: Uuid,
    component_id: Uuid,
    quantity: i32,
    added_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<CartItemRow> for CartItemRecord {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            owner_id: row.owner_id,
            component_id: row.component_id,
            quantity: row.quantity,
            added_at: row.added_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CartRepo for PostgresRepositories {
    async fn list_cart_items(
        &self,
        owner_id: Uuid,
        page: PageRequest,
    ) -> Result<Paged<CartItemRecord>, RepoError> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE owner_id = $1")
            .bind(owner_id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, CartItemRow>(&format!(
            r#"
            SELECT {CART_COLUMNS}
            FROM cart_items
            WHERE owner_id = $1
            ORDER BY added_at, id
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(owner_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(Paged::new(
            rows.into_iter().map(CartItemRecord::from).collect(),
            Self::convert_count(total)?,
            page,
        ))
    }

    async fn find_cart_item(&self, id: Uuid) -> Result<Option<CartItemRecord>, RepoError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CartItemRecord::from))
    }

    async fn find_cart_item_for(
        &self,
        owner_id: Uuid,
        component_id: Uuid,
    ) -> Result<Option<CartItemRecord>, RepoError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE owner_id = $1 AND component_id = $2"
        ))
        .bind(owner_id)
        .bind(component_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CartItemRecord::from))
    }
}

#[async_trait]
impl CartWriteRepo for PostgresRepositories {
    async fn add_cart_item(&self, params: AddCartItemParams) -> Result<CartItemRecord, RepoError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            r#"
            INSERT INTO cart_items (id, owner_id, component_id, quantity)
            VALUES ($1, $2, $3, $4)
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(params.owner_id)
        .bind(params.component_id)
        .bind(params.quantity)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CartItemRecord::from(row))
    }

    async fn set_cart_item_quantity(
        &self,
        id: Uuid,
        quantity: i32,
    ) -> Result<CartItemRecord, RepoError> {
        let row = sqlx::query_as::<_, CartItemRow>(&format!(
            r#"
            UPDATE cart_items
            SET quantity = $2, updated_at = now()
            WHERE id = $1
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(quantity)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(CartItemRecord::from).ok_or(RepoError::NotFound)
    }

    async fn remove_cart_item(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, owner_id: Uuid) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE owner_id = $1")
            .bind(owner_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}
