//! 协作奖励仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::WriteOutcome;
use super::gamification_repo::update_profile;
use super::traits::CollaborationRepositoryTrait;
use crate::error::Result;
use crate::models::{CollaborationReward, GamificationProfile, UserReward, UserRewardView};

pub struct CollaborationRepository {
    pool: PgPool,
}

impl CollaborationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CollaborationRepositoryTrait for CollaborationRepository {
    async fn create(&self, reward: &CollaborationReward) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collaboration_rewards (id, title, description, collaboration_type,
                                               base_points, quality_multipliers,
                                               max_claims_per_day, is_active,
                                               created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(reward.id)
        .bind(&reward.title)
        .bind(&reward.description)
        .bind(reward.collaboration_type)
        .bind(reward.base_points)
        .bind(&reward.quality_multipliers)
        .bind(reward.max_claims_per_day)
        .bind(reward.is_active)
        .bind(reward.created_at)
        .bind(reward.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, reward: &CollaborationReward) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE collaboration_rewards
            SET title = $2, description = $3, collaboration_type = $4, base_points = $5,
                quality_multipliers = $6, max_claims_per_day = $7, is_active = $8,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(reward.id)
        .bind(&reward.title)
        .bind(&reward.description)
        .bind(reward.collaboration_type)
        .bind(reward.base_points)
        .bind(&reward.quality_multipliers)
        .bind(reward.max_claims_per_day)
        .bind(reward.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<CollaborationReward>> {
        let reward = sqlx::query_as::<_, CollaborationReward>(
            r#"
            SELECT id, title, description, collaboration_type, base_points,
                   quality_multipliers, max_claims_per_day, is_active, created_at, updated_at
            FROM collaboration_rewards
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(reward)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<CollaborationReward>> {
        let rewards = sqlx::query_as::<_, CollaborationReward>(
            r#"
            SELECT id, title, description, collaboration_type, base_points,
                   quality_multipliers, max_claims_per_day, is_active, created_at, updated_at
            FROM collaboration_rewards
            WHERE is_active OR $1
            ORDER BY collaboration_type ASC, title ASC
            "#,
        )
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(rewards)
    }

    async fn count_claims_since(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM user_rewards
            WHERE user_id = $1 AND reward_id = $2 AND created_at >= $3
            "#,
        )
        .bind(user_id)
        .bind(reward_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn record_claim(
        &self,
        claim: &UserReward,
        profile: &GamificationProfile,
        max_claims_per_day: i32,
        since: DateTime<Utc>,
    ) -> Result<WriteOutcome> {
        let mut tx = self.pool.begin().await?;

        // 档案版本号串行化同一用户的并发领取，这里的计数在提交前不会被其它领取改变
        let claimed: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM user_rewards
            WHERE user_id = $1 AND reward_id = $2 AND created_at >= $3
            "#,
        )
        .bind(claim.user_id)
        .bind(claim.reward_id)
        .bind(since)
        .fetch_one(&mut *tx)
        .await?;

        if claimed >= i64::from(max_claims_per_day) {
            tx.rollback().await?;
            return Ok(WriteOutcome::LimitReached);
        }

        sqlx::query(
            r#"
            INSERT INTO user_rewards (id, user_id, reward_id, quality, streak_bonus,
                                      points_awarded, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(claim.id)
        .bind(claim.user_id)
        .bind(claim.reward_id)
        .bind(&claim.quality)
        .bind(claim.streak_bonus)
        .bind(claim.points_awarded)
        .bind(&claim.metadata)
        .bind(claim.created_at)
        .execute(&mut *tx)
        .await?;

        if !update_profile(&mut *tx, profile).await? {
            tx.rollback().await?;
            return Ok(WriteOutcome::Stale);
        }

        tx.commit().await?;
        Ok(WriteOutcome::Applied)
    }

    async fn list_user_rewards(&self, user_id: Uuid) -> Result<Vec<UserRewardView>> {
        let rewards = sqlx::query_as::<_, UserRewardView>(
            r#"
            SELECT ur.id, ur.reward_id, r.title, r.collaboration_type, ur.quality,
                   ur.streak_bonus, ur.points_awarded, ur.metadata, ur.created_at
            FROM user_rewards ur
            JOIN collaboration_rewards r ON r.id = ur.reward_id
            WHERE ur.user_id = $1
            ORDER BY ur.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rewards)
    }
}
