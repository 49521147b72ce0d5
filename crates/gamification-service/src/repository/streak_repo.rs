//! 连续打卡仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::traits::StreakRepositoryTrait;
use crate::error::Result;
use crate::models::Streak;

pub struct StreakRepository {
    pool: PgPool,
}

impl StreakRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StreakRepositoryTrait for StreakRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Streak>> {
        let streak = sqlx::query_as::<_, Streak>(
            r#"
            SELECT id, user_id, current_streak, longest_streak, last_activity_date,
                   current_multiplier, grace_period_used, history, created_at, updated_at
            FROM streaks
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(streak)
    }

    async fn save(
        &self,
        streak: &Streak,
        expected_updated_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let Some(expected) = expected_updated_at else {
            let inserted = sqlx::query(
                r#"
                INSERT INTO streaks (id, user_id, current_streak, longest_streak, last_activity_date,
                                     current_multiplier, grace_period_used, history,
                                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (user_id) DO NOTHING
                "#,
            )
            .bind(streak.id)
            .bind(streak.user_id)
            .bind(streak.current_streak)
            .bind(streak.longest_streak)
            .bind(streak.last_activity_date)
            .bind(streak.current_multiplier)
            .bind(streak.grace_period_used)
            .bind(&streak.history)
            .bind(streak.created_at)
            .bind(streak.updated_at)
            .execute(&self.pool)
            .await?;

            return Ok(inserted.rows_affected() == 1);
        };

        let updated = sqlx::query(
            r#"
            UPDATE streaks SET
                current_streak = $2,
                longest_streak = $3,
                last_activity_date = $4,
                current_multiplier = $5,
                grace_period_used = $6,
                history = $7,
                updated_at = $8
            WHERE user_id = $1 AND updated_at = $9
            "#,
        )
        .bind(streak.user_id)
        .bind(streak.current_streak)
        .bind(streak.longest_streak)
        .bind(streak.last_activity_date)
        .bind(streak.current_multiplier)
        .bind(streak.grace_period_used)
        .bind(&streak.history)
        .bind(streak.updated_at)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }
}
