//! 仓储 Trait 定义
//!
//! 服务层依赖这些接口而不是具体实现，测试时由 mockall 生成 Mock

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::WriteOutcome;
use crate::error::Result;
use crate::models::{
    Achievement, Badge, CollaborationReward, GamificationProfile, LeaderboardRow, Mentor,
    MentorshipRelation, MentorshipStatus, MentorshipView, MultimediaFile, Streak, User,
    UserAchievement, UserAchievementView, UserBadge, UserBadgeView, UserReward, UserRewardView,
};

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    /// 按用户名或邮箱查找
    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;
    async fn exists(&self, username: &str, email: &str) -> Result<bool>;
    async fn create(&self, user: &User) -> Result<()>;
}

/// 积分档案仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GamificationRepositoryTrait: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<GamificationProfile>>;
    /// 不存在时插入，返回数据库中的档案
    async fn insert_if_absent(&self, profile: &GamificationProfile) -> Result<GamificationProfile>;
    /// 按版本号更新，版本不匹配返回 false
    async fn update(&self, profile: &GamificationProfile) -> Result<bool>;
    async fn list_leaderboard_rows(&self) -> Result<Vec<LeaderboardRow>>;
}

/// 连续打卡仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreakRepositoryTrait: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Streak>>;
    /// 保存打卡记录
    ///
    /// `expected_updated_at` 为 None 时只插入新记录；否则仅在 updated_at 未变时更新。
    /// 记录已被并发修改时返回 false
    async fn save(&self, streak: &Streak, expected_updated_at: Option<DateTime<Utc>>)
    -> Result<bool>;
}

/// 成就仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AchievementRepositoryTrait: Send + Sync {
    async fn create(&self, achievement: &Achievement) -> Result<()>;
    async fn update(&self, achievement: &Achievement) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Achievement>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Achievement>>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Achievement>>;

    // 用户进度
    async fn list_progress(&self, user_id: Uuid) -> Result<Vec<UserAchievement>>;
    async fn save_progress(&self, progress: &UserAchievement) -> Result<()>;
    /// 标记完成并在同一事务中更新积分档案
    async fn unlock(
        &self,
        progress: &UserAchievement,
        profile: &GamificationProfile,
    ) -> Result<WriteOutcome>;
    async fn list_user_achievements(&self, user_id: Uuid) -> Result<Vec<UserAchievementView>>;
}

/// 徽章仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeRepositoryTrait: Send + Sync {
    async fn create(&self, badge: &Badge) -> Result<()>;
    async fn update(&self, badge: &Badge) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Badge>>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Badge>>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<Badge>>;

    // 用户徽章
    async fn owned_badge_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>>;
    /// 授予徽章并在同一事务中更新积分档案
    async fn award(&self, user_badge: &UserBadge, profile: &GamificationProfile)
    -> Result<WriteOutcome>;
    async fn list_user_badges(&self, user_id: Uuid) -> Result<Vec<UserBadgeView>>;
}

/// 师徒仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MentorshipRepositoryTrait: Send + Sync {
    // 导师
    async fn create_mentor(&self, mentor: &Mentor) -> Result<WriteOutcome>;
    async fn update_mentor(&self, mentor: &Mentor) -> Result<()>;
    async fn find_mentor(&self, id: Uuid) -> Result<Option<Mentor>>;
    async fn find_mentor_by_user(&self, user_id: Uuid) -> Result<Option<Mentor>>;
    async fn list_mentors(&self, active_only: bool) -> Result<Vec<Mentor>>;

    // 师徒关系
    async fn create_relation(&self, relation: &MentorshipRelation) -> Result<WriteOutcome>;
    async fn find_relation(&self, id: Uuid) -> Result<Option<MentorshipRelation>>;
    async fn find_open_relation(
        &self,
        mentor_id: Uuid,
        student_id: Uuid,
    ) -> Result<Option<MentorshipRelation>>;
    async fn list_relations_for_user(&self, user_id: Uuid) -> Result<Vec<MentorshipView>>;
    /// pending -> active，事务内锁定导师并检查学员上限
    async fn activate_relation(
        &self,
        relation_id: Uuid,
        mentor_id: Uuid,
        max_mentees: i32,
    ) -> Result<WriteOutcome>;
    /// 写入辅导进度（仅 active 状态，且 updated_at 仍为读取时的值）
    async fn record_session(
        &self,
        relation: &MentorshipRelation,
        expected_updated_at: DateTime<Utc>,
    ) -> Result<bool>;
    /// active -> completed，同时累加导师统计
    async fn complete_relation(&self, relation: &MentorshipRelation) -> Result<bool>;
    /// 按期望的当前状态取消
    async fn cancel_relation(
        &self,
        relation_id: Uuid,
        expected: MentorshipStatus,
    ) -> Result<bool>;
}

/// 协作奖励仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollaborationRepositoryTrait: Send + Sync {
    async fn create(&self, reward: &CollaborationReward) -> Result<()>;
    async fn update(&self, reward: &CollaborationReward) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<CollaborationReward>>;
    async fn list(&self, include_inactive: bool) -> Result<Vec<CollaborationReward>>;

    async fn count_claims_since(
        &self,
        user_id: Uuid,
        reward_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<i64>;
    /// 事务内复查每日次数、写入领取记录并更新积分档案
    async fn record_claim(
        &self,
        claim: &UserReward,
        profile: &GamificationProfile,
        max_claims_per_day: i32,
        since: DateTime<Utc>,
    ) -> Result<WriteOutcome>;
    async fn list_user_rewards(&self, user_id: Uuid) -> Result<Vec<UserRewardView>>;
}

/// 多媒体仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MultimediaRepositoryTrait: Send + Sync {
    async fn create(&self, file: &MultimediaFile) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<MultimediaFile>>;
    async fn list(&self, owner_id: Option<Uuid>, limit: i64, offset: i64)
    -> Result<Vec<MultimediaFile>>;
    async fn count(&self, owner_id: Option<Uuid>) -> Result<i64>;
    async fn delete(&self, id: Uuid) -> Result<bool>;
}
