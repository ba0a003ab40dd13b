use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    application::pagination::{PageRequest, Paged},
    application::repos::{
        BuildQueryFilter, BuildSort, BuildWithLines, BuildsRepo, BuildsWriteRepo,
        CreateBuildParams, RepoError, UpdateBuildHeaderParams,
    },
    domain::builds::{BuildDiff, BuildLine},
    domain::entities::{BuildComponentRecord, BuildRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct BuildRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_public: bool,
    created_by: Uuid,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<BuildRow> for BuildRecord {
    fn from(row: BuildRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            is_public: row.is_public,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BuildLineRow {
    build_id: Uuid,
    component_id: Uuid,
    quantity: i32,
}

impl From<BuildLineRow> for BuildComponentRecord {
    fn from(row: BuildLineRow) -> Self {
        Self {
            build_id: row.build_id,
            component_id: row.component_id,
            quantity: row.quantity,
        }
    }
}

fn split_lines(lines: &[BuildLine]) -> (Vec<Uuid>, Vec<i32>) {
    lines
        .iter()
        .map(|line| (line.component_id, line.quantity))
        .unzip()
}

impl PostgresRepositories {
    fn apply_build_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &BuildQueryFilter) {
        qb.push(" WHERE TRUE");
        if let Some(owner) = filter.created_by {
            qb.push(" AND b.created_by = ");
            qb.push_bind(owner);
        }
        if filter.public_only {
            qb.push(" AND b.is_public");
        }
        Self::push_search(qb, &["b.name", "b.description"], &filter.search);
    }

    fn build_order(sort: BuildSort) -> &'static str {
        match sort {
            BuildSort::Newest => " ORDER BY b.created_at DESC, b.id DESC",
            BuildSort::Oldest => " ORDER BY b.created_at ASC, b.id ASC",
            BuildSort::NameAsc => " ORDER BY LOWER(b.name) ASC, b.id ASC",
        }
    }

    async fn insert_lines(
        tx: &mut Transaction<'_, Postgres>,
        build_id: Uuid,
        lines: &[BuildLine],
    ) -> Result<(), RepoError> {
        if lines.is_empty() {
            return Ok(());
        }
        let (component_ids, quantities) = split_lines(lines);
        sqlx::query(
            r#"
            INSERT INTO build_components (build_id, component_id, quantity)
            SELECT $1, v.component_id, v.quantity
            FROM UNNEST($2::uuid[], $3::int4[]) AS v(component_id, quantity)
            "#,
        )
        .bind(build_id)
        .bind(component_ids)
        .bind(quantities)
        .execute(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn fetch_lines(
        tx: &mut Transaction<'_, Postgres>,
        build_id: Uuid,
    ) -> Result<Vec<BuildComponentRecord>, RepoError> {
        let rows = sqlx::query_as::<_, BuildLineRow>(
            r#"
            SELECT build_id, component_id, quantity
            FROM build_components
            WHERE build_id = $1
            ORDER BY component_id
            "#,
        )
        .bind(build_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BuildComponentRecord::from).collect())
    }

    async fn apply_diff(
        tx: &mut Transaction<'_, Postgres>,
        build_id: Uuid,
        diff: &BuildDiff,
    ) -> Result<(), RepoError> {
        if !diff.remove.is_empty() {
            sqlx::query(
                "DELETE FROM build_components WHERE build_id = $1 AND component_id = ANY($2)",
            )
            .bind(build_id)
            .bind(&diff.remove)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        if !diff.update.is_empty() {
            let (component_ids, quantities) = split_lines(&diff.update);
            sqlx::query(
                r#"
                UPDATE build_components bc
                SET quantity = v.quantity
                FROM UNNEST($2::uuid[], $3::int4[]) AS v(component_id, quantity)
                WHERE bc.build_id = $1 AND bc.component_id = v.component_id
                "#,
            )
            .bind(build_id)
            .bind(component_ids)
            .bind(quantities)
            .execute(&mut **tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        Self::insert_lines(tx, build_id, &diff.insert).await
    }
}

#[async_trait]
impl BuildsRepo for PostgresRepositories {
    async fn list_builds(
        &self,
        filter: &BuildQueryFilter,
        sort: BuildSort,
        page: PageRequest,
    ) -> Result<Paged<BuildRecord>, RepoError> {
        let mut count_qb = QueryBuilder::new("SELECT COUNT(*) FROM builds b");
        Self::apply_build_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let mut qb = QueryBuilder::new(
            "SELECT b.id, b.name, b.description, b.is_public, b.created_by, b.created_at, \
             b.updated_at FROM builds b",
        );
        Self::apply_build_filter(&mut qb, filter);
        qb.push(Self::build_order(sort));
        qb.push(" LIMIT ");
        qb.push_bind(page.limit());
        qb.push(" OFFSET ");
        qb.push_bind(page.offset());

        let rows: Vec<BuildRow> = qb
            .build_query_as()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(Paged::new(
            rows.into_iter().map(BuildRecord::from).collect(),
            Self::convert_count(total)?,
            page,
        ))
    }

    async fn find_build(&self, id: Uuid) -> Result<Option<BuildRecord>, RepoError> {
        let row = sqlx::query_as::<_, BuildRow>(
            r#"
            SELECT id, name, description, is_public, created_by, created_at, updated_at
            FROM builds
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(BuildRecord::from))
    }

    async fn list_build_lines(
        &self,
        build_id: Uuid,
    ) -> Result<Vec<BuildComponentRecord>, RepoError> {
        self.list_lines_for_builds(&[build_id]).await
    }

    async fn list_lines_for_builds(
        &self,
        build_ids: &[Uuid],
    ) -> Result<Vec<BuildComponentRecord>, RepoError> {
        if build_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, BuildLineRow>(
            r#"
            SELECT build_id, component_id, quantity
            FROM build_components
            WHERE build_id = ANY($1)
            ORDER BY build_id, component_id
            "#,
        )
        .bind(build_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(BuildComponentRecord::from).collect())
    }
}

#[async_trait]
impl BuildsWriteRepo for PostgresRepositories {
    async fn create_build(&self, params: CreateBuildParams) -> Result<BuildWithLines, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, BuildRow>(
            r#"
            INSERT INTO builds (id, name, description, is_public, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, description, is_public, created_by, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&params.name)
        .bind(params.description.as_deref())
        .bind(params.is_public)
        .bind(params.created_by)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        // A failed line insert drops `tx` uncommitted, taking the header with it.
        Self::insert_lines(&mut tx, row.id, &params.lines).await?;
        let lines = Self::fetch_lines(&mut tx, row.id).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(BuildWithLines {
            build: BuildRecord::from(row),
            lines,
        })
    }

    async fn apply_build_update(
        &self,
        header: UpdateBuildHeaderParams,
        diff: Option<BuildDiff>,
    ) -> Result<BuildWithLines, RepoError> {
        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, BuildRow>(
            r#"
            UPDATE builds
            SET name = $2, description = $3, is_public = $4, updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, is_public, created_by, created_at, updated_at
            "#,
        )
        .bind(header.id)
        .bind(&header.name)
        .bind(header.description.as_deref())
        .bind(header.is_public)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        if let Some(diff) = diff.as_ref() {
            Self::apply_diff(&mut tx, header.id, diff).await?;
        }
        let lines = Self::fetch_lines(&mut tx, header.id).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(BuildWithLines {
            build: BuildRecord::from(row),
            lines,
        })
    }

    async fn delete_build(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM builds WHERE id = $1")
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
