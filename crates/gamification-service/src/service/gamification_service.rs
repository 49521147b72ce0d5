//! 积分档案服务

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{PointsLedger, ProgressObserver, ProgressUpdate};
use crate::error::{GamificationError, Result};
use crate::models::{GamificationProfile, PointsEvent, PointsSource};

/// 历史查询默认条数
const DEFAULT_HISTORY_LIMIT: usize = 20;

/// 积分变动后的档案和联动结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsOutcome {
    pub profile: GamificationProfile,
    pub progress: ProgressUpdate,
}

pub struct GamificationService {
    ledger: Arc<PointsLedger>,
    progress: Arc<dyn ProgressObserver>,
}

impl GamificationService {
    pub fn new(ledger: Arc<PointsLedger>, progress: Arc<dyn ProgressObserver>) -> Self {
        Self { ledger, progress }
    }

    pub async fn get_profile(&self, user_id: Uuid) -> Result<GamificationProfile> {
        self.ledger.load_or_create(user_id).await
    }

    /// 管理员发放积分
    #[instrument(skip(self, reason))]
    pub async fn grant_points(
        &self,
        user_id: Uuid,
        points: i64,
        reason: Option<String>,
    ) -> Result<PointsOutcome> {
        if points <= 0 {
            return Err(GamificationError::Validation("积分必须大于 0".to_string()));
        }

        let mut event = PointsEvent::new(PointsSource::Grant, points);
        if let Some(reason) = reason {
            event = event.with_reason(reason);
        }

        let profile = self.ledger.award(user_id, event).await?;
        info!(%user_id, points, level = profile.level, "积分已发放");

        let progress = self.progress.on_progress(user_id).await;
        Ok(PointsOutcome { profile, progress })
    }

    /// 完成任务：任务数 +1 并记入任务积分
    #[instrument(skip(self, mission_id))]
    pub async fn complete_mission(
        &self,
        user_id: Uuid,
        mission_id: String,
        points: i64,
    ) -> Result<PointsOutcome> {
        if points < 0 {
            return Err(GamificationError::Validation("任务积分不能为负数".to_string()));
        }

        let event = PointsEvent::new(PointsSource::Mission, points).with_reason(mission_id);
        let profile = self
            .ledger
            .apply(user_id, |profile| {
                profile.missions_completed += 1;
                profile.apply_points(event.clone())?;
                Ok(())
            })
            .await?;
        kamentsa_shared::observability::metrics::record_points_granted(
            PointsSource::Mission.as_str(),
            points,
        );

        info!(
            %user_id,
            points,
            missions = profile.missions_completed,
            "任务已完成"
        );

        let progress = self.progress.on_progress(user_id).await;
        Ok(PointsOutcome { profile, progress })
    }

    /// 最近的积分历史，新的在前
    pub async fn history(&self, user_id: Uuid, limit: Option<usize>) -> Result<Vec<PointsEvent>> {
        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, crate::models::HISTORY_LIMIT);
        let profile = self.ledger.load_or_create(user_id).await?;
        Ok(profile.recent_history(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockGamificationRepositoryTrait;
    use crate::service::MockProgressObserver;

    fn service(repo: MockGamificationRepositoryTrait, progress_calls: usize) -> GamificationService {
        let mut observer = MockProgressObserver::new();
        observer
            .expect_on_progress()
            .times(progress_calls)
            .returning(|_| ProgressUpdate::default());
        GamificationService::new(
            Arc::new(PointsLedger::new(Arc::new(repo))),
            Arc::new(observer),
        )
    }

    #[tokio::test]
    async fn test_grant_points_levels_up() {
        let user_id = Uuid::new_v4();
        let mut repo = MockGamificationRepositoryTrait::new();
        repo.expect_find_by_user()
            .returning(move |_| Ok(Some(GamificationProfile::new(user_id))));
        repo.expect_update()
            .withf(|p| p.points == 250 && p.level == 2 && p.experience == 150)
            .times(1)
            .returning(|_| Ok(true));

        let svc = service(repo, 1);
        let outcome = svc
            .grant_points(user_id, 250, Some("festival".into()))
            .await
            .unwrap();

        assert_eq!(outcome.profile.level, 2);
        let history = outcome.profile.parse_history().unwrap();
        assert_eq!(history[0].kind, PointsSource::Grant);
        assert_eq!(history[0].reason.as_deref(), Some("festival"));
    }

    #[tokio::test]
    async fn test_grant_to_unknown_user_is_not_found() {
        let mut repo = MockGamificationRepositoryTrait::new();
        repo.expect_find_by_user().returning(|_| Ok(None));
        repo.expect_insert_if_absent()
            .returning(|p| Err(GamificationError::not_found("用户", p.user_id)));
        repo.expect_update().never();

        let svc = service(repo, 0);
        let err = svc
            .grant_points(Uuid::new_v4(), 10, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GamificationError::NotFound { .. }));
        assert_eq!(err.status_code(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_grant_rejects_non_positive_points() {
        let repo = MockGamificationRepositoryTrait::new();
        let svc = service(repo, 0);

        let err = svc.grant_points(Uuid::new_v4(), 0, None).await.unwrap_err();
        assert!(matches!(err, GamificationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_complete_mission_increments_counter() {
        let user_id = Uuid::new_v4();
        let mut repo = MockGamificationRepositoryTrait::new();
        repo.expect_find_by_user()
            .returning(move |_| Ok(Some(GamificationProfile::new(user_id))));
        repo.expect_update()
            .withf(|p| p.missions_completed == 1 && p.points == 40)
            .times(1)
            .returning(|_| Ok(true));

        let svc = service(repo, 1);
        let outcome = svc
            .complete_mission(user_id, "greet-elders".into(), 40)
            .await
            .unwrap();

        assert_eq!(outcome.profile.missions_completed, 1);
        assert_eq!(outcome.profile.stats["mission"], 40);
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let user_id = Uuid::new_v4();
        let mut profile = GamificationProfile::new(user_id);
        for points in [5, 10, 15] {
            profile
                .apply_points(PointsEvent::new(PointsSource::Grant, points))
                .unwrap();
        }

        let mut repo = MockGamificationRepositoryTrait::new();
        repo.expect_find_by_user()
            .returning(move |_| Ok(Some(profile.clone())));

        let svc = service(repo, 0);
        let history = svc.history(user_id, Some(2)).await.unwrap();

        assert_eq!(history.len(), 2);
        assert_eq!(history[0].points, 15);
        assert_eq!(history[1].points, 10);
    }
}
