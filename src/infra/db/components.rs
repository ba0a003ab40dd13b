use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paged},
    application::repos::{
        ComponentQueryFilter, ComponentSort, ComponentsRepo, ComponentsWriteRepo,
        CreateComponentParams, CreateSpecParams, RepoError, SpecQueryFilter,
        UpdateComponentParams, UpdateSpecParams,
    },
    domain::entities::{ComponentRecord, ComponentSpecRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

const COMPONENT_COLUMNS: &str = "c.id, c.name, c.category_id, c.brand, c.price, c.stock_quantity, \
     c.description, c.image_url, c.is_active, c.version, c.created_at, c.updated_at";

const RETURNING_COMPONENT: &str = "RETURNING id, name, category_id, brand, price, stock_quantity, \
     description, image_url, is_active, version, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ComponentRow {
    id: Uuid,
    name: String,
    category_id: Option<Uuid>,
    brand: Option<String>,
    price: Decimal,
    stock_quantity: i32,
    description: Option<String>,
    image_url: Option<String>,
    is_active: bool,
    version: i32,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<ComponentRow> for ComponentRecord {
    fn from(row: ComponentRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            category_id: row.category_id,
            brand: row.brand,
            price: row.price,
            stock_quantity: row.stock_quantity,
            description: row.description,
            image_url: row.image_url,
            is_active: row.is_active,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SpecRow {
    id: Uuid,
    component_id: Uuid,
    spec_key: String,
    spec_value: String,
    display_order: Option<i32>,
}

impl From<SpecRow> for ComponentSpecRecord {
    fn from(row: SpecRow) -> Self {
        Self {
            id: row.id,
            component_id: row.component_id,
            spec_key: row.spec_key,
            spec_value: row.spec_value,
            display_order: row.display_order,
        }
    }
}

impl PostgresRepositories {
    fn apply_component_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &ComponentQueryFilter) {
        qb.push(" WHERE TRUE");

        if !filter.include_inactive {
            qb.push(" AND c.is_active");
        }
        if let Some(category_id) = filter.category_id {
            qb.push(" AND c.category_id = ");
            qb.push_bind(category_id);
        }
        if let Some(brand) = filter
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
        {
            qb.push(" AND LOWER(c.brand) = ");
            qb.push_bind(brand.to_lowercase());
        }
        if let Some(min) = filter.min_price {
            qb.push(" AND c.price >= ");
            qb.push_bind(min);
        }
        if let Some(max) = filter.max_price {
            qb.push(" AND c.price <= ");
            qb.push_bind(max);
        }

        Self::push_search(qb, &["c.name", "c.brand", "c.description"], &filter.search);
    }

    fn apply_spec_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &SpecQueryFilter) {
        qb.push(" WHERE TRUE");
        if let Some(component_id) = filter.component_id {
            qb.push(" AND s.component_id = ");
            qb.push_bind(component_id);
        }
        Self::push_search(qb, &["s.spec_key", "s.spec_value"], &filter.search);
    }

    fn component_order(sort: ComponentSort) -> &'static str {
        match sort {
            ComponentSort::NameAsc => " ORDER BY LOWER(c.name) ASC, c.id ASC",
            ComponentSort::NameDesc => " ORDER BY LOWER(c.name) DESC, c.id DESC",
            ComponentSort::PriceAsc => " ORDER BY c.price ASC, c.id ASC",
            ComponentSort::PriceDesc => " ORDER BY c.price DESC, c.id DESC",
            ComponentSort::Newest => " ORDER BY c.created_at DESC, c.id DESC",
        }
    }
}

#[async_trait]
impl ComponentsRepo for PostgresRepositories {
    async fn list_components(
        &self,
        filter: &ComponentQueryFilter,
        sort: ComponentSort,
        page: PageRequest,
    ) -> Result<Paged<ComponentRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM components c");
        Self::apply_component_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(COMPONENT_COLUMNS);
        qb.push(" FROM components c");
        Self::apply_component_filter(&mut qb, filter);
        qb.push(Self::component_order(sort));
        qb.push(" LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows: Vec<ComponentRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Paged::new(
            rows.into_iter().map(ComponentRecord::from).collect(),
            Self::convert_count(total)?,
            page,
        ))
    }

    async fn find_component(&self, id: Uuid) -> Result<Option<ComponentRecord>, RepoError> {
        let row = sqlx::query_as::<_, ComponentRow>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ComponentRecord::from))
    }

    async fn find_components(&self, ids: &[Uuid]) -> Result<Vec<ComponentRecord>, RepoError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ComponentRow>(&format!(
            "SELECT {COMPONENT_COLUMNS} FROM components c WHERE c.id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ComponentRecord::from).collect())
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
        if component_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, SpecRow>(
            r#"
            SELECT id, component_id, spec_key, spec_value, display_order
            FROM component_specs
            WHERE component_id = ANY($1)
            ORDER BY component_id, display_order NULLS LAST, spec_key
            "#,
        )
        .bind(component_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(ComponentSpecRecord::from).collect())
    }

    async fn find_spec(&self, id: Uuid) -> Result<Option<ComponentSpecRecord>, RepoError> {
        let row = sqlx::query_as::<_, SpecRow>(
            r#"
            SELECT id, component_id, spec_key, spec_value, display_order
            FROM component_specs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(ComponentSpecRecord::from))
    }

    async fn search_specs(
        &self,
        filter: &SpecQueryFilter,
        page: PageRequest,
    ) -> Result<Paged<ComponentSpecRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM component_specs s");
        Self::apply_spec_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(
            "SELECT s.id, s.component_id, s.spec_key, s.spec_value, s.display_order \
             FROM component_specs s",
        );
        Self::apply_spec_filter(&mut qb, filter);
        qb.push(" ORDER BY s.component_id, s.display_order NULLS LAST, s.spec_key LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows: Vec<SpecRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Paged::new(
            rows.into_iter().map(ComponentSpecRecord::from).collect(),
            Self::convert_count(total)?,
            page,
        ))
    }

    async fn count_build_references(&self, component_id: Uuid) -> Result<u64, RepoError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM build_components WHERE component_id = $1")
                .bind(component_id)
                .fetch_one(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }
}

#[async_trait]
impl ComponentsWriteRepo for PostgresRepositories {
    async fn create_component(
        &self,
        params: CreateComponentParams,
    ) -> Result<ComponentRecord, RepoError> {
        let row = sqlx::query_as::<_, ComponentRow>(&format!(
            r#"
            INSERT INTO components (
                id, name, category_id, brand, price, stock_quantity,
                description, image_url, is_active, version
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0)
            {RETURNING_COMPONENT}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&params.name)
        .bind(params.category_id)
        .bind(params.brand.as_deref())
        .bind(params.price)
        .bind(params.stock_quantity)
        .bind(params.description.as_deref())
        .bind(params.image_url.as_deref())
        .bind(params.is_active)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ComponentRecord::from(row))
    }

    async fn update_component(
        &self,
        params: UpdateComponentParams,
    ) -> Result<ComponentRecord, RepoError> {
        let row = sqlx::query_as::<_, ComponentRow>(&format!(
            r#"
            UPDATE components
            SET name = $3,
                category_id = $4,
                brand = $5,
                price = $6,
                stock_quantity = $7,
                description = $8,
                image_url = $9,
                is_active = $10,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND version = $2
            {RETURNING_COMPONENT}
            "#
        ))
        .bind(params.id)
        .bind(params.expected_version)
        .bind(&params.name)
        .bind(params.category_id)
        .bind(params.brand.as_deref())
        .bind(params.price)
        .bind(params.stock_quantity)
        .bind(params.description.as_deref())
        .bind(params.image_url.as_deref())
        .bind(params.is_active)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(ComponentRecord::from(row)),
            None => {
                let exists: bool =
                    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM components WHERE id = $1)")
                        .bind(params.id)
                        .fetch_one(self.pool())
                        .await
                        .map_err(map_sqlx_error)?;
                if exists {
                    Err(RepoError::VersionConflict {
                        expected: params.expected_version,
                    })
                } else {
                    Err(RepoError::NotFound)
                }
            }
        }
    }

    async fn deactivate_component(&self, id: Uuid) -> Result<ComponentRecord, RepoError> {
        let row = sqlx::query_as::<_, ComponentRow>(&format!(
            r#"
            UPDATE components
            SET is_active = FALSE,
                version = version + 1,
                updated_at = now()
            WHERE id = $1
            {RETURNING_COMPONENT}
            "#
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ComponentRecord::from).ok_or(RepoError::NotFound)
    }

    async fn create_spec(
        &self,
        params: CreateSpecParams,
    ) -> Result<ComponentSpecRecord, RepoError> {
        let row = sqlx::query_as::<_, SpecRow>(
            r#"
            INSERT INTO component_specs (id, component_id, spec_key, spec_value, display_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, component_id, spec_key, spec_value, display_order
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(params.component_id)
        .bind(&params.spec_key)
        .bind(&params.spec_value)
        .bind(params.display_order)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(ComponentSpecRecord::from(row))
    }

    async fn update_spec(
        &self,
        params: UpdateSpecParams,
    ) -> Result<ComponentSpecRecord, RepoError> {
        let row = sqlx::query_as::<_, SpecRow>(
            r#"
            UPDATE component_specs
            SET spec_key = $2, spec_value = $3, display_order = $4
            WHERE id = $1
            RETURNING id, component_id, spec_key, spec_value, display_order
            "#,
        )
        .bind(params.id)
        .bind(&params.spec_key)
        .bind(&params.spec_value)
        .bind(params.display_order)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ComponentSpecRecord::from).ok_or(RepoError::NotFound)
    }

    async fn delete_spec(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM component_specs WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
