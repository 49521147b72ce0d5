//! 成就实体
//!
//! 成就按条件自动评估，进度达到 100 时解锁并发放奖励积分

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::requirement::Requirement;

/// 成就定义
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: Uuid,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    /// 分类，如 vocabulary、pronunciation、culture
    pub category: String,
    /// 达成条件（JSON，存储 Requirement 结构）
    pub requirements: Value,
    /// 解锁时发放的积分
    pub points_reward: i64,
    #[sqlx(default)]
    pub icon_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Achievement {
    /// 解析达成条件
    pub fn parse_requirement(&self) -> Result<Requirement, serde_json::Error> {
        serde_json::from_value(self.requirements.clone())
    }
}

/// 用户成就进度
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievement {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: Uuid,
    /// 进度百分比 0..=100
    pub progress: i32,
    pub completed: bool,
    #[sqlx(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserAchievement {
    pub fn new(user_id: Uuid, achievement_id: Uuid, progress: i32) -> Self {
        let now = Utc::now();
        let completed = progress >= 100;
        Self {
            id: Uuid::new_v4(),
            user_id,
            achievement_id,
            progress: progress.clamp(0, 100),
            completed,
            completed_at: completed.then_some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 用户成就列表项（进度 JOIN 成就定义）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserAchievementView {
    pub achievement_id: Uuid,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub category: String,
    #[sqlx(default)]
    pub icon_url: Option<String>,
    pub points_reward: i64,
    pub progress: i32,
    pub completed: bool,
    #[sqlx(default)]
    pub completed_at: Option<DateTime<Utc>>,
}
