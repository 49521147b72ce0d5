//! 成就仓储

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::WriteOutcome;
use super::gamification_repo::update_profile;
use super::traits::AchievementRepositoryTrait;
use crate::error::Result;
use crate::models::{Achievement, GamificationProfile, UserAchievement, UserAchievementView};

pub struct AchievementRepository {
    pool: PgPool,
}

impl AchievementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AchievementRepositoryTrait for AchievementRepository {
    async fn create(&self, achievement: &Achievement) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO achievements (id, name, description, category, requirements,
                                      points_reward, icon_url, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(achievement.id)
        .bind(&achievement.name)
        .bind(&achievement.description)
        .bind(&achievement.category)
        .bind(&achievement.requirements)
        .bind(achievement.points_reward)
        .bind(&achievement.icon_url)
        .bind(achievement.is_active)
        .bind(achievement.created_at)
        .bind(achievement.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, achievement: &Achievement) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE achievements
            SET name = $2, description = $3, category = $4, requirements = $5,
                points_reward = $6, icon_url = $7, is_active = $8, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(achievement.id)
        .bind(&achievement.name)
        .bind(&achievement.description)
        .bind(&achievement.category)
        .bind(&achievement.requirements)
        .bind(achievement.points_reward)
        .bind(&achievement.icon_url)
        .bind(achievement.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Achievement>> {
        let achievement = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, name, description, category, requirements, points_reward,
                   icon_url, is_active, created_at, updated_at
            FROM achievements
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(achievement)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Achievement>> {
        let achievement = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, name, description, category, requirements, points_reward,
                   icon_url, is_active, created_at, updated_at
            FROM achievements
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(achievement)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Achievement>> {
        let achievements = sqlx::query_as::<_, Achievement>(
            r#"
            SELECT id, name, description, category, requirements, points_reward,
                   icon_url, is_active, created_at, updated_at
            FROM achievements
            WHERE is_active OR $1
            ORDER BY category ASC, points_reward ASC, name ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(achievements)
    }

    async fn list_progress(&self, user_id: Uuid) -> Result<Vec<UserAchievement>> {
        let progress = sqlx::query_as::<_, UserAchievement>(
            r#"
            SELECT id, user_id, achievement_id, progress, completed, completed_at,
                   created_at, updated_at
            FROM user_achievements
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(progress)
    }

    async fn save_progress(&self, progress: &UserAchievement) -> Result<()> {
        // 已完成的记录不再回写进度
        sqlx::query(
            r#"
            INSERT INTO user_achievements (id, user_id, achievement_id, progress, completed,
                                           completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, NULL, $5, $6)
            ON CONFLICT (user_id, achievement_id) DO UPDATE SET
                progress = EXCLUDED.progress,
                updated_at = EXCLUDED.updated_at
            WHERE user_achievements.completed = FALSE
            "#,
        )
        .bind(progress.id)
        .bind(progress.user_id)
        .bind(progress.achievement_id)
        .bind(progress.progress)
        .bind(progress.created_at)
        .bind(progress.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unlock(
        &self,
        progress: &UserAchievement,
        profile: &GamificationProfile,
    ) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let unlocked = sqlx::query(
            r#"
            INSERT INTO user_achievements (id, user_id, achievement_id, progress, completed,
                                           completed_at, created_at, updated_at)
            VALUES ($1, $2, $3, 100, TRUE, $4, $5, $6)
            ON CONFLICT (user_id, achievement_id) DO UPDATE SET
                progress = 100,
                completed = TRUE,
                completed_at = EXCLUDED.completed_at,
                updated_at = EXCLUDED.updated_at
            WHERE user_achievements.completed = FALSE
            "#,
        )
        .bind(progress.id)
        .bind(progress.user_id)
        .bind(progress.achievement_id)
        .bind(progress.completed_at)
        .bind(progress.created_at)
        .bind(progress.updated_at)
        .execute(&mut *tx)
        .await?;

        if unlocked.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(
                user_id = %progress.user_id,
                achievement_id = %progress.achievement_id,
                "成就已解锁，跳过"
            );
            return Ok(WriteOutcome::Duplicate);
        }

        if !update_profile(&mut *tx, profile).await? {
            tx.rollback().await?;
            return Ok(WriteOutcome::Stale);
        }

        tx.commit().await?;
        Ok(WriteOutcome::Applied)
    }

    async fn list_user_achievements(&self, user_id: Uuid) -> Result<Vec<UserAchievementView>> {
        let achievements = sqlx::query_as::<_, UserAchievementView>(
            r#"
            SELECT a.id AS achievement_id, a.name, a.description, a.category, a.icon_url,
                   a.points_reward, ua.progress, ua.completed, ua.completed_at
            FROM user_achievements ua
            JOIN achievements a ON a.id = ua.achievement_id
            WHERE ua.user_id = $1
            ORDER BY ua.completed DESC, ua.completed_at DESC NULLS LAST, a.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(achievements)
    }
}
