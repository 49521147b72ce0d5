//! 业务服务层
//!
//! 服务只依赖仓储 Trait（`Arc<dyn ...>`），测试时注入 mockall 生成的 Mock。
//! 积分变动统一经过 [`PointsLedger`]，之后通过 [`ProgressObserver`]
//! 触发成就/徽章评估并刷新排行榜缓存。

mod achievement_service;
mod auth_service;
mod badge_service;
mod collaboration_service;
mod gamification_service;
mod leaderboard_service;
mod mentorship_service;
mod multimedia_service;
mod points;
mod progression;
mod streak_service;

pub use achievement_service::AchievementService;
pub use auth_service::AuthService;
pub use badge_service::BadgeService;
pub use collaboration_service::{ClaimOutcome, CollaborationService};
pub use gamification_service::{GamificationService, PointsOutcome};
pub use leaderboard_service::{DEFAULT_LEADERBOARD_LIMIT, LeaderboardService};
pub use mentorship_service::MentorshipService;
pub use multimedia_service::{MultimediaService, UploadedFile};
pub use points::PointsLedger;
pub use progression::{ProgressObserver, ProgressUpdate, ProgressionService};
#[cfg(test)]
pub use progression::MockProgressObserver;
pub use streak_service::{StreakActivity, StreakService};

use uuid::Uuid;

use crate::auth::Claims;
use crate::error::{GamificationError, Result};

/// 乐观锁冲突的最大尝试次数
pub const MAX_RETRIES: u32 = 3;

/// 当前操作者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub is_admin: bool,
}

impl Actor {
    pub fn new(user_id: Uuid, is_admin: bool) -> Self {
        Self { user_id, is_admin }
    }

    pub fn from_claims(claims: &Claims) -> Result<Self> {
        Ok(Self {
            user_id: claims.user_id()?,
            is_admin: claims.is_admin(),
        })
    }

    /// 本人或管理员
    pub fn require_self_or_admin(&self, owner_id: Uuid) -> Result<()> {
        if self.is_admin || self.user_id == owner_id {
            Ok(())
        } else {
            Err(GamificationError::Forbidden("无权操作他人的资源".to_string()))
        }
    }
}
