//! 仓储层
//!
//! 所有 SQL 都集中在这里。多表写入在单个事务内完成，
//! 积分档案的更新通过 `version` 乐观锁保护。

mod achievement_repo;
mod badge_repo;
mod collaboration_repo;
mod gamification_repo;
mod mentorship_repo;
mod multimedia_repo;
mod streak_repo;
pub mod traits;
mod user_repo;

pub use achievement_repo::AchievementRepository;
pub use badge_repo::BadgeRepository;
pub use collaboration_repo::CollaborationRepository;
pub use gamification_repo::GamificationRepository;
pub use mentorship_repo::MentorshipRepository;
pub use multimedia_repo::MultimediaRepository;
pub use streak_repo::StreakRepository;
pub use traits::*;
pub use user_repo::UserRepository;

/// 条件写入的结果
///
/// 事务内的写入可能因为唯一约束、版本号或数量限制而未生效，
/// 由服务层决定是重试、忽略还是返回业务错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// 已写入
    Applied,
    /// 记录已存在（重复解锁、重复授予、重复申请）
    Duplicate,
    /// 版本号或状态已变化，需要重新读取后重试
    Stale,
    /// 超出数量限制（每日领取次数、导师学员上限）
    LimitReached,
}
