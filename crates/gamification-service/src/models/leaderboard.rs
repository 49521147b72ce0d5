//! 排行榜数据

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 排名计算所需的档案行（积分档案 JOIN 用户）
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LeaderboardRow {
    pub user_id: Uuid,
    pub username: String,
    #[sqlx(default)]
    pub display_name: Option<String>,
    pub points: i64,
    pub level: i32,
    pub experience: i64,
    pub achievements_count: i32,
    pub missions_completed: i32,
    pub rewards_count: i32,
    /// 档案创建时间，同分时用于排序
    pub created_at: DateTime<Utc>,
}

/// 排行榜条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    /// 名次，从 1 开始
    pub rank: i64,
    pub score: i64,
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub points: i64,
    pub level: i32,
    pub experience: i64,
    pub achievements_count: i32,
    pub missions_completed: i32,
    pub rewards_count: i32,
    pub joined_at: DateTime<Utc>,
}

impl LeaderboardEntry {
    pub fn from_row(rank: i64, score: i64, row: LeaderboardRow) -> Self {
        Self {
            rank,
            score,
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
            points: row.points,
            level: row.level,
            experience: row.experience,
            achievements_count: row.achievements_count,
            missions_completed: row.missions_completed,
            rewards_count: row.rewards_count,
            joined_at: row.created_at,
        }
    }
}
