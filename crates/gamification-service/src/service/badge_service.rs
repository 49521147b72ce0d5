//! 徽章服务
//!
//! 徽章可由管理员手动授予，也会在用户进度满足条件时自动授予。
//! 授予时在同一事务中写入用户徽章、发放奖励积分、累加奖励数。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use kamentsa_shared::observability::metrics;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{MAX_RETRIES, PointsLedger};
use crate::dto::{CreateBadgeRequest, UpdateBadgeRequest};
use crate::error::{GamificationError, Result};
use crate::models::{Badge, PointsEvent, PointsSource, UserBadge, UserBadgeView};
use crate::repository::{BadgeRepositoryTrait, StreakRepositoryTrait, WriteOutcome};

pub struct BadgeService {
    badges: Arc<dyn BadgeRepositoryTrait>,
    streaks: Arc<dyn StreakRepositoryTrait>,
    ledger: Arc<PointsLedger>,
}

impl BadgeService {
    pub fn new(
        badges: Arc<dyn BadgeRepositoryTrait>,
        streaks: Arc<dyn StreakRepositoryTrait>,
        ledger: Arc<PointsLedger>,
    ) -> Self {
        Self {
            badges,
            streaks,
            ledger,
        }
    }

    // ==================== 徽章定义 ====================

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create(&self, req: CreateBadgeRequest) -> Result<Badge> {
        if self.badges.find_by_name(&req.name).await?.is_some() {
            return Err(GamificationError::AlreadyExists(format!(
                "徽章名称已存在: {}",
                req.name
            )));
        }

        let now = Utc::now();
        let badge = Badge {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            icon_url: req.icon_url,
            category: req.category,
            tier: req.tier,
            requirements: serde_json::to_value(req.requirements)?,
            points_reward: req.points_reward,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.badges.create(&badge).await?;

        info!(badge_id = %badge.id, tier = badge.tier.as_str(), "徽章已创建");
        Ok(badge)
    }

    #[instrument(skip(self, req))]
    pub async fn update(&self, id: Uuid, req: UpdateBadgeRequest) -> Result<Badge> {
        let mut badge = self.get(id).await?;

        if let Some(name) = req.name {
            if name != badge.name && self.badges.find_by_name(&name).await?.is_some() {
                return Err(GamificationError::AlreadyExists(format!(
                    "徽章名称已存在: {}",
                    name
                )));
            }
            badge.name = name;
        }
        if let Some(description) = req.description {
            badge.description = Some(description);
        }
        if let Some(icon_url) = req.icon_url {
            badge.icon_url = Some(icon_url);
        }
        if let Some(category) = req.category {
            badge.category = category;
        }
        if let Some(tier) = req.tier {
            badge.tier = tier;
        }
        if let Some(requirements) = req.requirements {
            badge.requirements = serde_json::to_value(requirements)?;
        }
        if let Some(points_reward) = req.points_reward {
            badge.points_reward = points_reward;
        }
        if let Some(is_active) = req.is_active {
            badge.is_active = is_active;
        }
        badge.updated_at = Utc::now();

        self.badges.update(&badge).await?;
        Ok(badge)
    }

    pub async fn get(&self, id: Uuid) -> Result<Badge> {
        self.badges
            .find_by_id(id)
            .await?
            .ok_or_else(|| GamificationError::not_found("徽章", id))
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Badge>> {
        self.badges.list(include_inactive).await
    }

    /// 停用徽章（已授予记录保留）
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        let mut badge = self.get(id).await?;
        badge.is_active = false;
        badge.updated_at = Utc::now();
        self.badges.update(&badge).await?;

        info!(badge_id = %id, "徽章已停用");
        Ok(())
    }

    // ==================== 用户徽章 ====================

    pub async fn list_user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadgeView>> {
        self.badges.list_user_badges(user_id).await
    }

    /// 手动授予徽章
    #[instrument(skip(self))]
    pub async fn award_badge(&self, user_id: Uuid, badge_id: Uuid) -> Result<Badge> {
        let badge = self
            .badges
            .find_by_id(badge_id)
            .await?
            .filter(|b| b.is_active)
            .ok_or_else(|| GamificationError::not_found("徽章", badge_id))?;

        if self.badges.owned_badge_ids(user_id).await?.contains(&badge_id) {
            return Err(GamificationError::AlreadyExists(format!(
                "用户已拥有徽章: {}",
                badge.name
            )));
        }

        if !self.grant(user_id, &badge).await? {
            return Err(GamificationError::AlreadyExists(format!(
                "用户已拥有徽章: {}",
                badge.name
            )));
        }

        Ok(badge)
    }

    /// 自动授予满足条件的徽章，返回本次新授予的徽章
    #[instrument(skip(self))]
    pub async fn evaluate_for_user(&self, user_id: Uuid) -> Result<Vec<Badge>> {
        let owned: HashSet<Uuid> = self
            .badges
            .owned_badge_ids(user_id)
            .await?
            .into_iter()
            .collect();
        let current_streak = self
            .streaks
            .find_by_user(user_id)
            .await?
            .map(|s| s.current_streak)
            .unwrap_or(0);

        let mut awarded = Vec::new();
        for badge in self.badges.list(false).await? {
            if owned.contains(&badge.id) {
                continue;
            }

            let requirement = match badge.parse_requirement() {
                Ok(r) => r,
                Err(e) => {
                    warn!(badge_id = %badge.id, error = %e, "徽章条件格式无效，跳过");
                    continue;
                }
            };

            // 每次判断都用最新档案，前一个徽章的奖励可能让后面的条件达成
            let profile = self.ledger.load_or_create(user_id).await?;
            if !requirement.is_met(&profile.snapshot(current_streak)) {
                continue;
            }

            if self.grant(user_id, &badge).await? {
                awarded.push(badge);
            }
        }

        Ok(awarded)
    }

    /// 授予徽章并记入奖励，已拥有时返回 false
    async fn grant(&self, user_id: Uuid, badge: &Badge) -> Result<bool> {
        for attempt in 1..=MAX_RETRIES {
            let mut profile = self.ledger.load_or_create(user_id).await?;
            profile.rewards_count += 1;
            profile.apply_points(
                PointsEvent::new(PointsSource::Badge, badge.points_reward)
                    .with_reason(badge.name.clone())
                    .with_reference(badge.id),
            )?;

            match self
                .badges
                .award(&UserBadge::new(user_id, badge.id), &profile)
                .await?
            {
                WriteOutcome::Applied => {
                    metrics::record_badge_awarded(badge.tier.as_str());
                    metrics::record_points_granted(
                        PointsSource::Badge.as_str(),
                        badge.points_reward,
                    );
                    info!(
                        %user_id,
                        badge_id = %badge.id,
                        tier = badge.tier.as_str(),
                        points = badge.points_reward,
                        "徽章已授予"
                    );
                    return Ok(true);
                }
                WriteOutcome::Duplicate | WriteOutcome::LimitReached => return Ok(false),
                WriteOutcome::Stale => {
                    warn!(%user_id, badge_id = %badge.id, attempt, "授予徽章时档案版本冲突，重试");
                }
            }
        }

        Err(GamificationError::ConcurrencyConflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BadgeTier, GamificationProfile, Requirement, RequirementType, Streak};
    use crate::repository::{
        MockBadgeRepositoryTrait, MockGamificationRepositoryTrait, MockStreakRepositoryTrait,
    };

    fn badge(name: &str, requirement: Requirement, reward: i64) -> Badge {
        Badge {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            icon_url: None,
            category: "consistency".to_string(),
            tier: BadgeTier::Silver,
            requirements: serde_json::to_value(requirement).unwrap(),
            points_reward: reward,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ledger_returning(profile: GamificationProfile) -> Arc<PointsLedger> {
        let mut repo = MockGamificationRepositoryTrait::new();
        repo.expect_find_by_user()
            .returning(move |_| Ok(Some(profile.clone())));
        Arc::new(PointsLedger::new(Arc::new(repo)))
    }

    fn streaks_with(current: i32) -> Arc<MockStreakRepositoryTrait> {
        let mut repo = MockStreakRepositoryTrait::new();
        repo.expect_find_by_user().returning(move |user_id| {
            let mut streak = Streak::empty(user_id);
            streak.current_streak = current;
            Ok(Some(streak))
        });
        Arc::new(repo)
    }

    #[tokio::test]
    async fn test_award_badge_updates_profile() {
        let user_id = Uuid::new_v4();
        let target = badge("Helper", Requirement::new(RequirementType::Rewards, 100), 40);
        let target_id = target.id;

        let mut repo = MockBadgeRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_owned_badge_ids().returning(|_| Ok(vec![]));
        repo.expect_award()
            .withf(move |ub, profile| {
                ub.badge_id == target_id && profile.rewards_count == 1 && profile.points == 40
            })
            .times(1)
            .returning(|_, _| Ok(WriteOutcome::Applied));

        let svc = BadgeService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(GamificationProfile::new(user_id)),
        );

        let awarded = svc.award_badge(user_id, target_id).await.unwrap();
        assert_eq!(awarded.id, target_id);
    }

    #[tokio::test]
    async fn test_award_badge_already_owned() {
        let target = badge("Owned", Requirement::new(RequirementType::Points, 1), 0);
        let target_id = target.id;

        let mut repo = MockBadgeRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_owned_badge_ids()
            .returning(move |_| Ok(vec![target_id]));
        repo.expect_award().never();

        let svc = BadgeService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(GamificationProfile::new(Uuid::new_v4())),
        );

        let err = svc.award_badge(Uuid::new_v4(), target_id).await.unwrap_err();
        assert!(matches!(err, GamificationError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_award_inactive_badge_is_not_found() {
        let mut inactive = badge("Retired", Requirement::new(RequirementType::Points, 1), 0);
        inactive.is_active = false;

        let mut repo = MockBadgeRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(inactive.clone())));

        let svc = BadgeService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(GamificationProfile::new(Uuid::new_v4())),
        );

        let err = svc
            .award_badge(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_evaluate_awards_streak_badge() {
        let user_id = Uuid::new_v4();
        let week = badge("Week streak", Requirement::new(RequirementType::Streak, 7), 15);
        let month = badge("Month streak", Requirement::new(RequirementType::Streak, 30), 50);
        let owned = badge("Old", Requirement::new(RequirementType::Points, 0), 0);
        let owned_id = owned.id;
        let week_id = week.id;
        let definitions = vec![week, month, owned];

        let mut repo = MockBadgeRepositoryTrait::new();
        repo.expect_owned_badge_ids()
            .returning(move |_| Ok(vec![owned_id]));
        repo.expect_list().returning(move |_| Ok(definitions.clone()));
        repo.expect_award()
            .withf(move |ub, _| ub.badge_id == week_id)
            .times(1)
            .returning(|_, _| Ok(WriteOutcome::Applied));

        let svc = BadgeService::new(
            Arc::new(repo),
            streaks_with(9),
            ledger_returning(GamificationProfile::new(user_id)),
        );

        let awarded = svc.evaluate_for_user(user_id).await.unwrap();
        assert_eq!(awarded.len(), 1);
        assert_eq!(awarded[0].id, week_id);
    }

    #[tokio::test]
    async fn test_grant_retries_on_stale_profile() {
        let user_id = Uuid::new_v4();
        let target = badge("Retry", Requirement::new(RequirementType::Points, 1), 5);
        let target_id = target.id;

        let mut repo = MockBadgeRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(target.clone())));
        repo.expect_owned_badge_ids().returning(|_| Ok(vec![]));
        let mut seq = mockall::Sequence::new();
        repo.expect_award()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(WriteOutcome::Stale));
        repo.expect_award()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(WriteOutcome::Applied));

        let svc = BadgeService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(GamificationProfile::new(user_id)),
        );

        assert!(svc.award_badge(user_id, target_id).await.is_ok());
    }
}
