//! 成就服务
//!
//! 维护成就定义，并根据用户进度快照自动解锁成就。
//! 解锁时在同一事务中写入完成记录、发放奖励积分、累加成就数。

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use kamentsa_shared::observability::metrics;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{MAX_RETRIES, PointsLedger};
use crate::dto::{CreateAchievementRequest, UpdateAchievementRequest};
use crate::error::{GamificationError, Result};
use crate::models::{
    Achievement, GamificationProfile, PointsEvent, PointsSource, UserAchievement,
    UserAchievementView,
};
use crate::repository::{AchievementRepositoryTrait, StreakRepositoryTrait, WriteOutcome};

pub struct AchievementService {
    achievements: Arc<dyn AchievementRepositoryTrait>,
    streaks: Arc<dyn StreakRepositoryTrait>,
    ledger: Arc<PointsLedger>,
}

impl AchievementService {
    pub fn new(
        achievements: Arc<dyn AchievementRepositoryTrait>,
        streaks: Arc<dyn StreakRepositoryTrait>,
        ledger: Arc<PointsLedger>,
    ) -> Self {
        Self {
            achievements,
            streaks,
            ledger,
        }
    }

    // ==================== 成就定义 ====================

    #[instrument(skip(self, req), fields(name = %req.name))]
    pub async fn create(&self, req: CreateAchievementRequest) -> Result<Achievement> {
        if self.achievements.find_by_name(&req.name).await?.is_some() {
            return Err(GamificationError::AlreadyExists(format!(
                "成就名称已存在: {}",
                req.name
            )));
        }

        let now = Utc::now();
        let achievement = Achievement {
            id: Uuid::new_v4(),
            name: req.name,
            description: req.description,
            category: req.category,
            requirements: serde_json::to_value(req.requirements)?,
            points_reward: req.points_reward,
            icon_url: req.icon_url,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.achievements.create(&achievement).await?;

        info!(achievement_id = %achievement.id, "成就已创建");
        Ok(achievement)
    }

    #[instrument(skip(self, req))]
    pub async fn update(&self, id: Uuid, req: UpdateAchievementRequest) -> Result<Achievement> {
        let mut achievement = self.get(id).await?;

        if let Some(name) = req.name {
            if name != achievement.name && self.achievements.find_by_name(&name).await?.is_some() {
                return Err(GamificationError::AlreadyExists(format!(
                    "成就名称已存在: {}",
                    name
                )));
            }
            achievement.name = name;
        }
        if let Some(description) = req.description {
            achievement.description = Some(description);
        }
        if let Some(category) = req.category {
            achievement.category = category;
        }
        if let Some(requirements) = req.requirements {
            achievement.requirements = serde_json::to_value(requirements)?;
        }
        if let Some(points_reward) = req.points_reward {
            achievement.points_reward = points_reward;
        }
        if let Some(icon_url) = req.icon_url {
            achievement.icon_url = Some(icon_url);
        }
        if let Some(is_active) = req.is_active {
            achievement.is_active = is_active;
        }
        achievement.updated_at = Utc::now();

        self.achievements.update(&achievement).await?;
        Ok(achievement)
    }

    pub async fn get(&self, id: Uuid) -> Result<Achievement> {
        self.achievements
            .find_by_id(id)
            .await?
            .ok_or_else(|| GamificationError::not_found("成就", id))
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<Achievement>> {
        self.achievements.list(include_inactive).await
    }

    /// 停用成就（已解锁记录保留）
    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        let mut achievement = self.get(id).await?;
        achievement.is_active = false;
        achievement.updated_at = Utc::now();
        self.achievements.update(&achievement).await?;

        info!(achievement_id = %id, "成就已停用");
        Ok(())
    }

    // ==================== 用户成就 ====================

    pub async fn list_user_achievements(&self, user_id: Uuid) -> Result<Vec<UserAchievementView>> {
        self.achievements.list_user_achievements(user_id).await
    }

    /// 评估并解锁满足条件的成就，返回本次新解锁的成就
    #[instrument(skip(self))]
    pub async fn evaluate_for_user(&self, user_id: Uuid) -> Result<Vec<Achievement>> {
        let mut unlocked = Vec::new();

        for attempt in 1..=MAX_RETRIES {
            if self.evaluate_pass(user_id, &mut unlocked).await? {
                return Ok(unlocked);
            }
            warn!(%user_id, attempt, "成就解锁时档案版本冲突，重新评估");
        }

        Err(GamificationError::ConcurrencyConflict)
    }

    /// 单轮评估，档案版本冲突时返回 false
    async fn evaluate_pass(&self, user_id: Uuid, unlocked: &mut Vec<Achievement>) -> Result<bool> {
        let mut profile = self.ledger.load_or_create(user_id).await?;
        let current_streak = self
            .streaks
            .find_by_user(user_id)
            .await?
            .map(|s| s.current_streak)
            .unwrap_or(0);
        let progress: HashMap<Uuid, UserAchievement> = self
            .achievements
            .list_progress(user_id)
            .await?
            .into_iter()
            .map(|p| (p.achievement_id, p))
            .collect();

        for achievement in self.achievements.list(false).await? {
            let stored = progress.get(&achievement.id);
            if stored.is_some_and(|p| p.completed) {
                continue;
            }

            let requirement = match achievement.parse_requirement() {
                Ok(r) => r,
                Err(e) => {
                    warn!(achievement_id = %achievement.id, error = %e, "成就条件格式无效，跳过");
                    continue;
                }
            };

            let percent = requirement.progress(&profile.snapshot(current_streak));
            if percent < 100 {
                if stored.map(|p| p.progress) != Some(percent) {
                    let mut record = UserAchievement::new(user_id, achievement.id, percent);
                    if let Some(existing) = stored {
                        record.id = existing.id;
                        record.created_at = existing.created_at;
                    }
                    self.achievements.save_progress(&record).await?;
                }
                continue;
            }

            let next = unlocked_profile(&profile, &achievement)?;
            let record = UserAchievement::new(user_id, achievement.id, 100);

            match self.achievements.unlock(&record, &next).await? {
                WriteOutcome::Applied => {
                    profile = next;
                    profile.version += 1;
                    metrics::record_achievement_unlocked(&achievement.category);
                    info!(
                        %user_id,
                        achievement_id = %achievement.id,
                        points = achievement.points_reward,
                        "成就已解锁"
                    );
                    unlocked.push(achievement);
                }
                WriteOutcome::Duplicate | WriteOutcome::LimitReached => {}
                WriteOutcome::Stale => return Ok(false),
            }
        }

        Ok(true)
    }
}

/// 解锁后的档案：成就数 +1，记入奖励积分
fn unlocked_profile(
    profile: &GamificationProfile,
    achievement: &Achievement,
) -> Result<GamificationProfile> {
    let mut next = profile.clone();
    next.achievements_count += 1;
    next.apply_points(
        PointsEvent::new(PointsSource::Achievement, achievement.points_reward)
            .with_reason(achievement.name.clone())
            .with_reference(achievement.id),
    )?;
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Requirement, RequirementType, Streak};
    use crate::repository::{
        MockAchievementRepositoryTrait, MockGamificationRepositoryTrait,
        MockStreakRepositoryTrait,
    };

    fn achievement(name: &str, requirement: Requirement, reward: i64) -> Achievement {
        Achievement {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
            category: "progress".to_string(),
            requirements: serde_json::to_value(requirement).unwrap(),
            points_reward: reward,
            icon_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn profile_with_points(user_id: Uuid, points: i64) -> GamificationProfile {
        let mut p = GamificationProfile::new(user_id);
        p.points = points;
        p
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
    async fn test_evaluate_unlocks_met_achievements() {
        let user_id = Uuid::new_v4();
        let reached = achievement("First 100", Requirement::new(RequirementType::Points, 100), 20);
        let far = achievement("First 1000", Requirement::new(RequirementType::Points, 1000), 50);
        let reached_id = reached.id;
        let definitions = vec![reached.clone(), far.clone()];

        let mut repo = MockAchievementRepositoryTrait::new();
        repo.expect_list_progress().returning(|_| Ok(vec![]));
        repo.expect_list()
            .with(mockall::predicate::eq(false))
            .returning(move |_| Ok(definitions.clone()));
        repo.expect_unlock()
            .withf(move |record, profile| {
                record.achievement_id == reached_id
                    && record.completed
                    && profile.achievements_count == 1
                    && profile.points == 170
            })
            .times(1)
            .returning(|_, _| Ok(WriteOutcome::Applied));
        repo.expect_save_progress()
            .withf(|record| record.progress == 17 && !record.completed)
            .times(1)
            .returning(|_| Ok(()));

        let svc = AchievementService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(profile_with_points(user_id, 150)),
        );

        let unlocked = svc.evaluate_for_user(user_id).await.unwrap();
        assert_eq!(unlocked.len(), 1);
        assert_eq!(unlocked[0].id, reached_id);
    }

    #[tokio::test]
    async fn test_evaluate_skips_completed() {
        let user_id = Uuid::new_v4();
        let done = achievement("Streak 3", Requirement::new(RequirementType::Streak, 3), 10);
        let done_id = done.id;
        let definitions = vec![done];

        let mut repo = MockAchievementRepositoryTrait::new();
        repo.expect_list_progress()
            .returning(move |uid| Ok(vec![UserAchievement::new(uid, done_id, 100)]));
        repo.expect_list().returning(move |_| Ok(definitions.clone()));
        repo.expect_unlock().never();
        repo.expect_save_progress().never();

        let svc = AchievementService::new(
            Arc::new(repo),
            streaks_with(5),
            ledger_returning(GamificationProfile::new(user_id)),
        );

        assert!(svc.evaluate_for_user(user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_evaluate_uses_streak_snapshot() {
        let user_id = Uuid::new_v4();
        let week = achievement("Week", Requirement::new(RequirementType::Streak, 7), 0);
        let definitions = vec![week];

        let mut repo = MockAchievementRepositoryTrait::new();
        repo.expect_list_progress().returning(|_| Ok(vec![]));
        repo.expect_list().returning(move |_| Ok(definitions.clone()));
        repo.expect_unlock()
            .times(1)
            .returning(|_, _| Ok(WriteOutcome::Applied));

        let svc = AchievementService::new(
            Arc::new(repo),
            streaks_with(7),
            ledger_returning(GamificationProfile::new(user_id)),
        );

        assert_eq!(svc.evaluate_for_user(user_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_evaluate_gives_up_on_persistent_conflict() {
        let user_id = Uuid::new_v4();
        let easy = achievement("Level 1", Requirement::new(RequirementType::Level, 1), 5);
        let definitions = vec![easy];

        let mut repo = MockAchievementRepositoryTrait::new();
        repo.expect_list_progress().returning(|_| Ok(vec![]));
        repo.expect_list().returning(move |_| Ok(definitions.clone()));
        repo.expect_unlock()
            .times(MAX_RETRIES as usize)
            .returning(|_, _| Ok(WriteOutcome::Stale));

        let svc = AchievementService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(GamificationProfile::new(user_id)),
        );

        let err = svc.evaluate_for_user(user_id).await.unwrap_err();
        assert!(matches!(err, GamificationError::ConcurrencyConflict));
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_name() {
        let existing = achievement("Dup", Requirement::new(RequirementType::Points, 10), 0);
        let mut repo = MockAchievementRepositoryTrait::new();
        repo.expect_find_by_name()
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_create().never();

        let svc = AchievementService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(GamificationProfile::new(Uuid::new_v4())),
        );

        let req = CreateAchievementRequest {
            name: "Dup".into(),
            description: None,
            category: "progress".into(),
            requirements: Requirement::new(RequirementType::Points, 10),
            points_reward: 0,
            icon_url: None,
        };
        let err = svc.create(req).await.unwrap_err();
        assert!(matches!(err, GamificationError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_deactivate_missing_is_not_found() {
        let mut repo = MockAchievementRepositoryTrait::new();
        repo.expect_find_by_id().returning(|_| Ok(None));

        let svc = AchievementService::new(
            Arc::new(repo),
            streaks_with(0),
            ledger_returning(GamificationProfile::new(Uuid::new_v4())),
        );

        let err = svc.deactivate(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GamificationError::NotFound { .. }));
    }
}
