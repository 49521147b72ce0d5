//! 徽章仓储

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::WriteOutcome;
use super::gamification_repo::update_profile;
use super::traits::BadgeRepositoryTrait;
use crate::error::Result;
use crate::models::{Badge, GamificationProfile, UserBadge, UserBadgeView};

pub struct BadgeRepository {
    pool: PgPool,
}

impl BadgeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BadgeRepositoryTrait for BadgeRepository {
    async fn create(&self, badge: &Badge) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO badges (id, name, description, icon_url, category, tier, requirements,
                                points_reward, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(badge.id)
        .bind(&badge.name)
        .bind(&badge.description)
        .bind(&badge.icon_url)
        .bind(&badge.category)
        .bind(badge.tier)
        .bind(&badge.requirements)
        .bind(badge.points_reward)
        .bind(badge.is_active)
        .bind(badge.created_at)
        .bind(badge.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, badge: &Badge) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE badges
            SET name = $2, description = $3, icon_url = $4, category = $5, tier = $6,
                requirements = $7, points_reward = $8, is_active = $9, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(badge.id)
        .bind(&badge.name)
        .bind(&badge.description)
        .bind(&badge.icon_url)
        .bind(&badge.category)
        .bind(badge.tier)
        .bind(&badge.requirements)
        .bind(badge.points_reward)
        .bind(badge.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Badge>> {
        let badge = sqlx::query_as::<_, Badge>(
            r#"
            SELECT id, name, description, icon_url, category, tier, requirements,
                   points_reward, is_active, created_at, updated_at
            FROM badges
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(badge)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Badge>> {
        let badge = sqlx::query_as::<_, Badge>(
            r#"
            SELECT id, name, description, icon_url, category, tier, requirements,
                   points_reward, is_active, created_at, updated_at
            FROM badges
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(badge)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Badge>> {
        let badges = sqlx::query_as::<_, Badge>(
            r#"
            SELECT id, name, description, icon_url, category, tier, requirements,
                   points_reward, is_active, created_at, updated_at
            FROM badges
            WHERE is_active OR $1
            ORDER BY category ASC, points_reward ASC, name ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(badges)
    }

    async fn owned_badge_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> =
            sqlx::query_scalar("SELECT badge_id FROM user_badges WHERE user_id = $1")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ids)
    }

    async fn award(
        &self,
        user_badge: &UserBadge,
        profile: &GamificationProfile,
    ) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_badges (id, user_id, badge_id, awarded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, badge_id) DO NOTHING
            "#,
        )
        .bind(user_badge.id)
        .bind(user_badge.user_id)
        .bind(user_badge.badge_id)
        .bind(user_badge.awarded_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(WriteOutcome::Duplicate);
        }

        if !update_profile(&mut *tx, profile).await? {
            tx.rollback().await?;
            return Ok(WriteOutcome::Stale);
        }

        tx.commit().await?;
        Ok(WriteOutcome::Applied)
    }

    async fn list_user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadgeView>> {
        let badges = sqlx::query_as::<_, UserBadgeView>(
            r#"
            SELECT b.id AS badge_id, b.name, b.description, b.icon_url, b.category, b.tier,
                   b.points_reward, ub.awarded_at
            FROM user_badges ub
            JOIN badges b ON b.id = ub.badge_id
            WHERE ub.user_id = $1
            ORDER BY ub.awarded_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(badges)
    }
}
