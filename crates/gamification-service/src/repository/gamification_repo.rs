//! 积分档案仓储

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::traits::GamificationRepositoryTrait;
use crate::error::{GamificationError, Result, is_foreign_key_violation};
use crate::models::{GamificationProfile, LeaderboardRow};

const PROFILE_COLUMNS: &str = r#"
    id, user_id, points, level, experience, achievements_count,
    missions_completed, rewards_count, history, stats, version,
    created_at, updated_at
"#;

pub struct GamificationRepository {
    pool: PgPool,
}

impl GamificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// 按版本号更新档案
///
/// 供其它仓储在自己的事务中复用，版本不匹配时返回 false
pub(crate) async fn update_profile<'e, E>(executor: E, profile: &GamificationProfile) -> Result<bool>
where
    E: PgExecutor<'e>,
{
    let result = sqlx::query(
        r#"
        UPDATE gamification_profiles
        SET points = $3,
            level = $4,
            experience = $5,
            achievements_count = $6,
            missions_completed = $7,
            rewards_count = $8,
            history = $9,
            stats = $10,
            version = version + 1,
            updated_at = NOW()
        WHERE user_id = $1 AND version = $2
        "#,
    )
    .bind(profile.user_id)
    .bind(profile.version)
    .bind(profile.points)
    .bind(profile.level)
    .bind(profile.experience)
    .bind(profile.achievements_count)
    .bind(profile.missions_completed)
    .bind(profile.rewards_count)
    .bind(&profile.history)
    .bind(&profile.stats)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[async_trait]
impl GamificationRepositoryTrait for GamificationRepository {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<GamificationProfile>> {
        let sql = format!(
            "SELECT {} FROM gamification_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        );
        let profile = sqlx::query_as::<_, GamificationProfile>(&sql)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(profile)
    }

    async fn insert_if_absent(&self, profile: &GamificationProfile) -> Result<GamificationProfile> {
        sqlx::query(
            r#"
            INSERT INTO gamification_profiles
                (id, user_id, points, level, experience, achievements_count,
                 missions_completed, rewards_count, history, stats, version,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(profile.id)
        .bind(profile.user_id)
        .bind(profile.points)
        .bind(profile.level)
        .bind(profile.experience)
        .bind(profile.achievements_count)
        .bind(profile.missions_completed)
        .bind(profile.rewards_count)
        .bind(&profile.history)
        .bind(&profile.stats)
        .bind(profile.version)
        .bind(profile.created_at)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                GamificationError::not_found("用户", profile.user_id)
            } else {
                e.into()
            }
        })?;

        // 并发创建时以先写入的为准
        let sql = format!(
            "SELECT {} FROM gamification_profiles WHERE user_id = $1",
            PROFILE_COLUMNS
        );
        let stored = sqlx::query_as::<_, GamificationProfile>(&sql)
            .bind(profile.user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(stored)
    }

    async fn update(&self, profile: &GamificationProfile) -> Result<bool> {
        update_profile(&self.pool, profile).await
    }

    async fn list_leaderboard_rows(&self) -> Result<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT g.user_id, u.username, u.display_name, g.points, g.level,
                   g.experience, g.achievements_count, g.missions_completed,
                   g.rewards_count, g.created_at
            FROM gamification_profiles g
            JOIN users u ON u.id = g.user_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}
