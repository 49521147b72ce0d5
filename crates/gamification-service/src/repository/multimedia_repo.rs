//! 多媒体文件仓储

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::traits::MultimediaRepositoryTrait;
use crate::error::Result;
use crate::models::MultimediaFile;

pub struct MultimediaRepository {
    pool: PgPool,
}

impl MultimediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MultimediaRepositoryTrait for MultimediaRepository {
    async fn create(&self, file: &MultimediaFile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO multimedia_files (id, owner_id, original_name, stored_name, content_type,
                                          media_type, size_bytes, title, description, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(file.id)
        .bind(file.owner_id)
        .bind(&file.original_name)
        .bind(&file.stored_name)
        .bind(&file.content_type)
        .bind(file.media_type)
        .bind(file.size_bytes)
        .bind(&file.title)
        .bind(&file.description)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<MultimediaFile>> {
        let file = sqlx::query_as::<_, MultimediaFile>(
            r#"
            SELECT id, owner_id, original_name, stored_name, content_type, media_type,
                   size_bytes, title, description, created_at
            FROM multimedia_files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(file)
    }

    async fn list(
        &self,
        owner_id: Option<Uuid>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MultimediaFile>> {
        let files = sqlx::query_as::<_, MultimediaFile>(
            r#"
            SELECT id, owner_id, original_name, stored_name, content_type, media_type,
                   size_bytes, title, description, created_at
            FROM multimedia_files
            WHERE ($1::uuid IS NULL OR owner_id = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(owner_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(files)
    }

    async fn count(&self, owner_id: Option<Uuid>) -> Result<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM multimedia_files WHERE ($1::uuid IS NULL OR owner_id = $1)",
        )
        .bind(owner_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(total)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM multimedia_files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }
}
