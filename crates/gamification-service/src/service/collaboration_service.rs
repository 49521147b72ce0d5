//! 协作奖励服务
//!
//! 用户提交协作成果（翻译、发音录音、文化故事等）领取奖励。
//! 积分 = 基础积分 × 质量倍率 × (1 + 连续加成)，每个奖励每个 UTC 日有领取上限。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kamentsa_shared::observability::metrics;
use serde::Serialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{MAX_RETRIES, PointsLedger, ProgressObserver, ProgressUpdate};
use crate::dto::{ClaimRewardRequest, CreateRewardRequest, UpdateRewardRequest};
use crate::error::{GamificationError, Result};
use crate::models::{
    CollaborationReward, GamificationProfile, PointsEvent, PointsSource, UserReward,
    UserRewardView,
};
use crate::repository::{CollaborationRepositoryTrait, StreakRepositoryTrait, WriteOutcome};
use crate::scoring;

/// 一次领取的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimOutcome {
    pub claim: UserReward,
    pub profile: GamificationProfile,
    pub progress: ProgressUpdate,
}

pub struct CollaborationService {
    repo: Arc<dyn CollaborationRepositoryTrait>,
    streaks: Arc<dyn StreakRepositoryTrait>,
    ledger: Arc<PointsLedger>,
    progress: Arc<dyn ProgressObserver>,
}

impl CollaborationService {
    pub fn new(
        repo: Arc<dyn CollaborationRepositoryTrait>,
        streaks: Arc<dyn StreakRepositoryTrait>,
        ledger: Arc<PointsLedger>,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            repo,
            streaks,
            ledger,
            progress,
        }
    }

    // ==================== 奖励定义 ====================

    #[instrument(skip(self, req), fields(title = %req.title))]
    pub async fn create(&self, req: CreateRewardRequest) -> Result<CollaborationReward> {
        let multipliers = req
            .quality_multipliers
            .unwrap_or_else(scoring::default_quality_multipliers);

        let now = Utc::now();
        let reward = CollaborationReward {
            id: Uuid::new_v4(),
            title: req.title,
            description: req.description,
            collaboration_type: req.collaboration_type,
            base_points: req.base_points,
            quality_multipliers: json!(multipliers),
            max_claims_per_day: req.max_claims_per_day,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.repo.create(&reward).await?;

        info!(reward_id = %reward.id, "协作奖励已创建");
        Ok(reward)
    }

    #[instrument(skip(self, req))]
    pub async fn update(&self, id: Uuid, req: UpdateRewardRequest) -> Result<CollaborationReward> {
        let mut reward = self.get(id).await?;

        if let Some(title) = req.title {
            reward.title = title;
        }
        if let Some(description) = req.description {
            reward.description = Some(description);
        }
        if let Some(collaboration_type) = req.collaboration_type {
            reward.collaboration_type = collaboration_type;
        }
        if let Some(base_points) = req.base_points {
            reward.base_points = base_points;
        }
        if let Some(multipliers) = req.quality_multipliers {
            reward.quality_multipliers = json!(multipliers);
        }
        if let Some(max_claims_per_day) = req.max_claims_per_day {
            reward.max_claims_per_day = max_claims_per_day;
        }
        if let Some(is_active) = req.is_active {
            reward.is_active = is_active;
        }
        reward.updated_at = Utc::now();

        self.repo.update(&reward).await?;
        Ok(reward)
    }

    pub async fn get(&self, id: Uuid) -> Result<CollaborationReward> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| GamificationError::not_found("协作奖励", id))
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<CollaborationReward>> {
        self.repo.list(include_inactive).await
    }

    #[instrument(skip(self))]
    pub async fn deactivate(&self, id: Uuid) -> Result<()> {
        let mut reward = self.get(id).await?;
        reward.is_active = false;
        reward.updated_at = Utc::now();
        self.repo.update(&reward).await?;

        info!(reward_id = %id, "协作奖励已停用");
        Ok(())
    }

    // ==================== 领取 ====================

    pub async fn list_user_rewards(&self, user_id: Uuid) -> Result<Vec<UserRewardView>> {
        self.repo.list_user_rewards(user_id).await
    }

    #[instrument(skip(self, req), fields(quality = %req.quality))]
    pub async fn claim(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        req: ClaimRewardRequest,
    ) -> Result<ClaimOutcome> {
        self.claim_at(user_id, reward_id, req, Utc::now()).await
    }

    async fn claim_at(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        req: ClaimRewardRequest,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome> {
        let reward = self
            .repo
            .find_by_id(reward_id)
            .await?
            .filter(|r| r.is_active)
            .ok_or_else(|| GamificationError::not_found("协作奖励", reward_id))?;

        let quality = req.quality.trim().to_ascii_lowercase();
        let multiplier = reward
            .multiplier_for(&quality)
            .ok_or_else(|| GamificationError::InvalidQuality(req.quality.clone()))?;

        let since = start_of_day(now);
        let claimed = self.repo.count_claims_since(user_id, reward_id, since).await?;
        if claimed >= i64::from(reward.max_claims_per_day) {
            return Err(limit_reached(&reward));
        }

        let streak_bonus = scoring::streak_bonus(
            self.streaks
                .find_by_user(user_id)
                .await?
                .map(|s| s.current_multiplier),
        );
        let points = scoring::collaboration_points(reward.base_points, multiplier, streak_bonus);

        let claim = UserReward {
            id: Uuid::new_v4(),
            user_id,
            reward_id,
            quality: quality.clone(),
            streak_bonus,
            points_awarded: points,
            metadata: req.metadata.unwrap_or_else(|| json!({})),
            created_at: now,
        };

        let mut attempt = 0;
        let profile = loop {
            attempt += 1;
            let mut profile = self.ledger.load_or_create(user_id).await?;
            profile.rewards_count += 1;
            profile.apply_points(
                PointsEvent::new(PointsSource::Collaboration, points)
                    .with_reason(reward.title.clone())
                    .with_reference(reward.id),
            )?;

            match self
                .repo
                .record_claim(&claim, &profile, reward.max_claims_per_day, since)
                .await?
            {
                WriteOutcome::Applied => {
                    profile.version += 1;
                    break profile;
                }
                WriteOutcome::LimitReached => return Err(limit_reached(&reward)),
                WriteOutcome::Stale | WriteOutcome::Duplicate if attempt < MAX_RETRIES => {
                    warn!(%user_id, %reward_id, attempt, "领取奖励时档案版本冲突，重试");
                }
                WriteOutcome::Stale | WriteOutcome::Duplicate => {
                    return Err(GamificationError::ConcurrencyConflict);
                }
            }
        };

        metrics::record_reward_claimed(reward.collaboration_type.as_str(), &quality);
        metrics::record_points_granted(PointsSource::Collaboration.as_str(), points);
        info!(
            %user_id,
            %reward_id,
            quality = %quality,
            streak_bonus,
            points,
            "协作奖励已领取"
        );

        let progress = self.progress.on_progress(user_id).await;
        Ok(ClaimOutcome {
            claim,
            profile,
            progress,
        })
    }
}

/// 当天 UTC 零点
fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc()
}

fn limit_reached(reward: &CollaborationReward) -> GamificationError {
    GamificationError::LimitReached(format!(
        "{}（每日最多 {} 次）",
        reward.title, reward.max_claims_per_day
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CollaborationType, Streak};
    use crate::repository::{
        MockCollaborationRepositoryTrait, MockGamificationRepositoryTrait,
        MockStreakRepositoryTrait,
    };
    use crate::service::MockProgressObserver;
    use chrono::TimeZone;

    fn reward(base_points: i64, max_per_day: i32) -> CollaborationReward {
        CollaborationReward {
            id: Uuid::new_v4(),
            title: "Record a greeting".into(),
            description: None,
            collaboration_type: CollaborationType::Pronunciation,
            base_points,
            quality_multipliers: json!(scoring::default_quality_multipliers()),
            max_claims_per_day: max_per_day,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn streaks(multiplier: Option<f64>) -> Arc<MockStreakRepositoryTrait> {
        let mut repo = MockStreakRepositoryTrait::new();
        repo.expect_find_by_user().returning(move |user_id| {
            Ok(multiplier.map(|m| {
                let mut streak = Streak::empty(user_id);
                streak.current_multiplier = m;
                streak
            }))
        });
        Arc::new(repo)
    }

    fn ledger() -> Arc<PointsLedger> {
        let mut profiles = MockGamificationRepositoryTrait::new();
        profiles
            .expect_find_by_user()
            .returning(|user_id| Ok(Some(GamificationProfile::new(user_id))));
        Arc::new(PointsLedger::new(Arc::new(profiles)))
    }

    fn observer(times: usize) -> Arc<MockProgressObserver> {
        let mut observer = MockProgressObserver::new();
        observer
            .expect_on_progress()
            .times(times)
            .returning(|_| ProgressUpdate::default());
        Arc::new(observer)
    }

    fn claim_request(quality: &str) -> ClaimRewardRequest {
        ClaimRewardRequest {
            quality: quality.to_string(),
            metadata: Some(json!({ "word": "bëngbe" })),
        }
    }

    #[test]
    fn test_start_of_day() {
        let now = Utc.with_ymd_and_hms(2024, 6, 3, 17, 45, 12).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_claim_applies_quality_and_streak_bonus() {
        let user_id = Uuid::new_v4();
        let definition = reward(10, 5);
        let reward_id = definition.id;

        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(definition.clone())));
        repo.expect_count_claims_since().returning(|_, _, _| Ok(2));
        repo.expect_record_claim()
            .withf(|claim, profile, max, _| {
                // 10 × 1.5 × (1 + 0.4) = 21
                claim.points_awarded == 21
                    && claim.quality == "good"
                    && (claim.streak_bonus - 0.4).abs() < 1e-9
                    && profile.points == 21
                    && profile.rewards_count == 1
                    && *max == 5
            })
            .times(1)
            .returning(|_, _, _, _| Ok(WriteOutcome::Applied));

        let svc = CollaborationService::new(Arc::new(repo), streaks(Some(1.4)), ledger(), observer(1));
        let outcome = svc
            .claim(user_id, reward_id, claim_request(" Good "))
            .await
            .unwrap();

        assert_eq!(outcome.claim.points_awarded, 21);
        assert_eq!(outcome.profile.rewards_count, 1);
        assert_eq!(outcome.profile.version, 1);
    }

    #[tokio::test]
    async fn test_claim_without_streak_has_no_bonus() {
        let definition = reward(10, 5);
        let reward_id = definition.id;

        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(definition.clone())));
        repo.expect_count_claims_since().returning(|_, _, _| Ok(0));
        repo.expect_record_claim()
            .withf(|claim, _, _, _| claim.points_awarded == 20 && claim.streak_bonus == 0.0)
            .returning(|_, _, _, _| Ok(WriteOutcome::Applied));

        let svc = CollaborationService::new(Arc::new(repo), streaks(None), ledger(), observer(1));
        let outcome = svc
            .claim(Uuid::new_v4(), reward_id, claim_request("excellent"))
            .await
            .unwrap();
        assert_eq!(outcome.claim.points_awarded, 20);
    }

    #[tokio::test]
    async fn test_unknown_quality_rejected() {
        let definition = reward(10, 5);
        let reward_id = definition.id;

        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(definition.clone())));
        repo.expect_record_claim().never();

        let svc = CollaborationService::new(Arc::new(repo), streaks(None), ledger(), observer(0));
        let err = svc
            .claim(Uuid::new_v4(), reward_id, claim_request("legendary"))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::InvalidQuality(_)));
    }

    #[tokio::test]
    async fn test_daily_limit_reached() {
        let definition = reward(10, 3);
        let reward_id = definition.id;

        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(definition.clone())));
        repo.expect_count_claims_since().returning(|_, _, _| Ok(3));
        repo.expect_record_claim().never();

        let svc = CollaborationService::new(Arc::new(repo), streaks(None), ledger(), observer(0));
        let err = svc
            .claim(Uuid::new_v4(), reward_id, claim_request("good"))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::LimitReached(_)));
    }

    #[tokio::test]
    async fn test_limit_reached_inside_transaction() {
        let definition = reward(10, 3);
        let reward_id = definition.id;

        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(definition.clone())));
        repo.expect_count_claims_since().returning(|_, _, _| Ok(2));
        repo.expect_record_claim()
            .times(1)
            .returning(|_, _, _, _| Ok(WriteOutcome::LimitReached));

        let svc = CollaborationService::new(Arc::new(repo), streaks(None), ledger(), observer(0));
        let err = svc
            .claim(Uuid::new_v4(), reward_id, claim_request("good"))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::LimitReached(_)));
    }

    #[tokio::test]
    async fn test_inactive_reward_not_found() {
        let mut definition = reward(10, 3);
        definition.is_active = false;
        let reward_id = definition.id;

        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(definition.clone())));

        let svc = CollaborationService::new(Arc::new(repo), streaks(None), ledger(), observer(0));
        let err = svc
            .claim(Uuid::new_v4(), reward_id, claim_request("good"))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_persistent_conflict_surfaces() {
        let definition = reward(10, 3);
        let reward_id = definition.id;

        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(definition.clone())));
        repo.expect_count_claims_since().returning(|_, _, _| Ok(0));
        repo.expect_record_claim()
            .times(MAX_RETRIES as usize)
            .returning(|_, _, _, _| Ok(WriteOutcome::Stale));

        let svc = CollaborationService::new(Arc::new(repo), streaks(None), ledger(), observer(0));
        let err = svc
            .claim(Uuid::new_v4(), reward_id, claim_request("good"))
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::ConcurrencyConflict));
    }

    #[tokio::test]
    async fn test_create_uses_default_multipliers() {
        let mut repo = MockCollaborationRepositoryTrait::new();
        repo.expect_create().times(1).returning(|_| Ok(()));

        let svc = CollaborationService::new(Arc::new(repo), streaks(None), ledger(), observer(0));
        let created = svc
            .create(CreateRewardRequest {
                title: "Share a story".into(),
                description: None,
                collaboration_type: CollaborationType::CulturalContribution,
                base_points: 30,
                quality_multipliers: None,
                max_claims_per_day: 2,
            })
            .await
            .unwrap();

        assert_eq!(created.multiplier_for("poor"), Some(0.5));
        assert_eq!(created.multiplier_for("EXCELLENT"), Some(2.0));
    }
}
