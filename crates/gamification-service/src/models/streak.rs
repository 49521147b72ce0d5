//! 连续打卡记录

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::enums::StreakOutcome;
use crate::scoring::{BASE_MULTIPLIER, StreakState};

/// 连续打卡历史保留条数
pub const STREAK_HISTORY_LIMIT: usize = 90;

/// 用户连续打卡记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Streak {
    pub id: Uuid,
    pub user_id: Uuid,
    pub current_streak: i32,
    pub longest_streak: i32,
    #[sqlx(default)]
    pub last_activity_date: Option<NaiveDate>,
    pub current_multiplier: f64,
    pub grace_period_used: bool,
    /// 打卡历史（JSON 数组，存储 StreakEvent）
    pub history: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 打卡事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakEvent {
    pub date: NaiveDate,
    pub outcome: StreakOutcome,
    pub streak: i32,
    pub multiplier: f64,
}

impl Streak {
    /// 尚未打卡用户的零记录
    pub fn empty(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            current_multiplier: BASE_MULTIPLIER,
            grace_period_used: false,
            history: json!([]),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> StreakState {
        StreakState {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_activity_date: self.last_activity_date,
            current_multiplier: self.current_multiplier,
            grace_period_used: self.grace_period_used,
        }
    }

    pub fn parse_history(&self) -> Result<Vec<StreakEvent>, serde_json::Error> {
        if self.history.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.history.clone())
    }

    /// 写入新状态并追加历史
    pub fn apply(
        &mut self,
        state: StreakState,
        date: NaiveDate,
        outcome: StreakOutcome,
    ) -> Result<(), serde_json::Error> {
        self.current_streak = state.current_streak;
        self.longest_streak = state.longest_streak;
        self.last_activity_date = state.last_activity_date;
        self.current_multiplier = state.current_multiplier;
        self.grace_period_used = state.grace_period_used;

        let mut history = self.parse_history()?;
        history.push(StreakEvent {
            date,
            outcome,
            streak: state.current_streak,
            multiplier: state.current_multiplier,
        });
        if history.len() > STREAK_HISTORY_LIMIT {
            let overflow = history.len() - STREAK_HISTORY_LIMIT;
            history.drain(..overflow);
        }
        self.history = serde_json::to_value(history)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}
