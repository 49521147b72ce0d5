//! 连续打卡服务

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use kamentsa_shared::observability::metrics;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{MAX_RETRIES, ProgressObserver, ProgressUpdate};
use crate::error::{GamificationError, Result};
use crate::models::{Streak, StreakOutcome};
use crate::repository::StreakRepositoryTrait;
use crate::scoring;

/// 一次打卡的结果
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakActivity {
    pub streak: Streak,
    pub outcome: StreakOutcome,
    pub progress: ProgressUpdate,
}

pub struct StreakService {
    streaks: Arc<dyn StreakRepositoryTrait>,
    progress: Arc<dyn ProgressObserver>,
}

impl StreakService {
    pub fn new(streaks: Arc<dyn StreakRepositoryTrait>, progress: Arc<dyn ProgressObserver>) -> Self {
        Self { streaks, progress }
    }

    /// 查询打卡记录，没有记录时返回零值
    pub async fn get_streak(&self, user_id: Uuid) -> Result<Streak> {
        Ok(self
            .streaks
            .find_by_user(user_id)
            .await?
            .unwrap_or_else(|| Streak::empty(user_id)))
    }

    /// 记录今天（UTC）的活动
    pub async fn record_activity(&self, user_id: Uuid) -> Result<StreakActivity> {
        self.record_activity_on(user_id, Utc::now().date_naive()).await
    }

    /// 打卡记录以 updated_at 做乐观锁，并发打卡只有一次生效
    #[instrument(skip(self))]
    pub async fn record_activity_on(
        &self,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<StreakActivity> {
        for attempt in 1..=MAX_RETRIES {
            let stored = self.streaks.find_by_user(user_id).await?;
            let expected = stored.as_ref().map(|s| s.updated_at);
            let mut streak = stored.unwrap_or_else(|| Streak::empty(user_id));

            let (state, outcome) = scoring::advance_streak(streak.state(), today);
            if outcome == StreakOutcome::AlreadyRecorded {
                metrics::record_streak_activity(outcome.as_str());
                debug!(%user_id, %today, "今日已打卡");
                return Ok(StreakActivity {
                    streak,
                    outcome,
                    progress: ProgressUpdate::default(),
                });
            }

            streak.apply(state, today, outcome)?;
            if !self.streaks.save(&streak, expected).await? {
                warn!(%user_id, attempt, "打卡记录版本冲突，重试");
                continue;
            }
            metrics::record_streak_activity(outcome.as_str());

            info!(
                %user_id,
                outcome = outcome.as_str(),
                current = streak.current_streak,
                multiplier = streak.current_multiplier,
                "打卡已记录"
            );

            let progress = self.progress.on_progress(user_id).await;
            return Ok(StreakActivity {
                streak,
                outcome,
                progress,
            });
        }

        Err(GamificationError::ConcurrencyConflict)
    }
}
