//! 徽章实体

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::BadgeTier;
use super::requirement::Requirement;

/// 徽章定义
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Badge {
    pub id: Uuid,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    #[sqlx(default)]
    pub icon_url: Option<String>,
    pub category: String,
    pub tier: BadgeTier,
    /// 自动授予条件（JSON，存储 Requirement 结构）
    pub requirements: Value,
    /// 授予时发放的积分
    pub points_reward: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Badge {
    /// 解析授予条件
    pub fn parse_requirement(&self) -> Result<Requirement, serde_json::Error> {
        serde_json::from_value(self.requirements.clone())
    }
}

/// 用户已获得的徽章
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBadge {
    pub id: Uuid,
    pub user_id: Uuid,
    pub badge_id: Uuid,
    pub awarded_at: DateTime<Utc>,
}

impl UserBadge {
    pub fn new(user_id: Uuid, badge_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            badge_id,
            awarded_at: Utc::now(),
        }
    }
}

/// 用户徽章列表项（获得记录 JOIN 徽章定义）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBadgeView {
    pub badge_id: Uuid,
    pub name: String,
    #[sqlx(default)]
    pub description: Option<String>,
    #[sqlx(default)]
    pub icon_url: Option<String>,
    pub category: String,
    pub tier: BadgeTier,
    pub points_reward: i64,
    pub awarded_at: DateTime<Utc>,
}
