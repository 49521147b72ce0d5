//! 进度联动
//!
//! 积分、连续打卡、协作奖励等变动之后，重新评估成就和徽章，
//! 并让排行榜缓存失效。评估失败只记录日志，不影响已经提交的主流程。

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AchievementService, BadgeService, LeaderboardService};
use crate::models::{Achievement, Badge};

/// 一次评估新解锁的成就和徽章
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub unlocked_achievements: Vec<Achievement>,
    pub awarded_badges: Vec<Badge>,
}

impl ProgressUpdate {
    pub fn is_empty(&self) -> bool {
        self.unlocked_achievements.is_empty() && self.awarded_badges.is_empty()
    }
}

/// 用户进度变化的观察者
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProgressObserver: Send + Sync {
    async fn on_progress(&self, user_id: Uuid) -> ProgressUpdate;
}

pub struct ProgressionService {
    achievements: Arc<AchievementService>,
    badges: Arc<BadgeService>,
    leaderboard: Arc<LeaderboardService>,
}

impl ProgressionService {
    pub fn new(
        achievements: Arc<AchievementService>,
        badges: Arc<BadgeService>,
        leaderboard: Arc<LeaderboardService>,
    ) -> Self {
        Self {
            achievements,
            badges,
            leaderboard,
        }
    }
}

/// 联动评估的最大轮数
const MAX_CASCADE_ROUNDS: usize = 5;

#[async_trait]
impl ProgressObserver for ProgressionService {
    async fn on_progress(&self, user_id: Uuid) -> ProgressUpdate {
        let mut update = ProgressUpdate::default();

        // 徽章奖励会改变积分和奖励数，可能让本轮跳过的成就达成，循环到不再有新解锁
        for round in 1..=MAX_CASCADE_ROUNDS {
            let mut changed = false;

            match self.achievements.evaluate_for_user(user_id).await {
                Ok(unlocked) => {
                    changed |= !unlocked.is_empty();
                    update.unlocked_achievements.extend(unlocked);
                }
                Err(e) => warn!(%user_id, round, error = %e, "成就评估失败"),
            }

            match self.badges.evaluate_for_user(user_id).await {
                Ok(awarded) => {
                    changed |= !awarded.is_empty();
                    update.awarded_badges.extend(awarded);
                }
                Err(e) => warn!(%user_id, round, error = %e, "徽章评估失败"),
            }

            if !changed {
                break;
            }
            if round == MAX_CASCADE_ROUNDS {
                warn!(%user_id, round, "联动评估达到最大轮数");
            }
        }

        self.leaderboard.invalidate().await;

        if !update.is_empty() {
            info!(
                %user_id,
                achievements = update.unlocked_achievements.len(),
                badges = update.awarded_badges.len(),
                "用户进度更新"
            );
        }

        update
    }
}
