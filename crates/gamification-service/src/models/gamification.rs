//! 积分档案
//!
//! 每个用户一份档案，首次访问时惰性创建。档案更新使用 `version`
//! 字段做乐观锁，写入时 `WHERE version = $old` 不匹配即视为并发冲突。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::enums::PointsSource;
use super::requirement::ProgressSnapshot;
use crate::scoring::{self, LevelProgress};

/// 档案中保留的积分历史条数上限
pub const HISTORY_LIMIT: usize = 200;

/// 积分档案
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct GamificationProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    /// 累计积分
    pub points: i64,
    pub level: i32,
    /// 当前等级内的经验
    pub experience: i64,
    pub achievements_count: i32,
    pub missions_completed: i32,
    pub rewards_count: i32,
    /// 积分历史（JSON 数组，存储 PointsEvent，旧的在前）
    pub history: Value,
    /// 统计信息（JSON 对象，按来源累计积分）
    pub stats: Value,
    /// 乐观锁版本号
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 积分变动事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsEvent {
    pub kind: PointsSource,
    pub points: i64,
    #[serde(default)]
    pub reason: Option<String>,
    /// 关联对象（成就、徽章、奖励、师徒关系等）
    #[serde(default)]
    pub reference_id: Option<Uuid>,
    pub occurred_at: DateTime<Utc>,
}

impl PointsEvent {
    pub fn new(kind: PointsSource, points: i64) -> Self {
        Self {
            kind,
            points,
            reason: None,
            reference_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_reference(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }
}

impl GamificationProfile {
    /// 新用户的初始档案（1 级，0 积分）
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            points: 0,
            level: 1,
            experience: 0,
            achievements_count: 0,
            missions_completed: 0,
            rewards_count: 0,
            history: json!([]),
            stats: json!({}),
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 解析积分历史
    pub fn parse_history(&self) -> Result<Vec<PointsEvent>, serde_json::Error> {
        if self.history.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(self.history.clone())
    }

    /// 最近的积分事件，新的在前
    pub fn recent_history(&self, limit: usize) -> Result<Vec<PointsEvent>, serde_json::Error> {
        let mut events = self.parse_history()?;
        events.reverse();
        events.truncate(limit);
        Ok(events)
    }

    /// 记入积分：累加积分和经验、处理升级、追加历史、更新统计
    pub fn apply_points(&mut self, event: PointsEvent) -> Result<LevelProgress, serde_json::Error> {
        let progress = scoring::apply_experience(self.level, self.experience, event.points);
        self.points += event.points.max(0);
        self.level = progress.level;
        self.experience = progress.experience;

        let source = event.kind.as_str();
        let mut stats = match self.stats.take() {
            Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        let total = stats.get(source).and_then(Value::as_i64).unwrap_or(0) + event.points;
        stats.insert(source.to_string(), json!(total));
        stats.insert("lastPointsAt".to_string(), json!(event.occurred_at));
        self.stats = Value::Object(stats);

        let mut history = self.parse_history()?;
        history.push(event);
        if history.len() > HISTORY_LIMIT {
            let overflow = history.len() - HISTORY_LIMIT;
            history.drain(..overflow);
        }
        self.history = serde_json::to_value(history)?;
        self.updated_at = Utc::now();

        Ok(progress)
    }

    /// 结合连续打卡天数生成条件判断快照
    pub fn snapshot(&self, current_streak: i32) -> ProgressSnapshot {
        ProgressSnapshot {
            points: self.points,
            level: i64::from(self.level),
            streak: i64::from(current_streak),
            achievements: i64::from(self.achievements_count),
            missions: i64::from(self.missions_completed),
            rewards: i64::from(self.rewards_count),
        }
    }

    pub fn score(&self) -> i64 {
        scoring::leaderboard_score(
            self.level,
            self.experience,
            self.achievements_count,
            self.missions_completed,
            self.rewards_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_defaults() {
        let profile = GamificationProfile::new(Uuid::new_v4());
        assert_eq!(profile.level, 1);
        assert_eq!(profile.points, 0);
        assert_eq!(profile.version, 0);
        assert!(profile.parse_history().unwrap().is_empty());
        assert_eq!(profile.score(), 100);
    }

    #[test]
    fn test_apply_points_levels_up_and_records_history() {
        let mut profile = GamificationProfile::new(Uuid::new_v4());
        let progress = profile
            .apply_points(PointsEvent::new(PointsSource::Grant, 150).with_reason("welcome"))
            .unwrap();

        assert_eq!(progress.levels_gained, 1);
        assert_eq!(profile.points, 150);
        assert_eq!(profile.level, 2);
        assert_eq!(profile.experience, 50);

        let history = profile.parse_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason.as_deref(), Some("welcome"));
        assert_eq!(profile.stats["grant"], 150);
    }

    #[test]
    fn test_stats_accumulate_per_source() {
        let mut profile = GamificationProfile::new(Uuid::new_v4());
        profile
            .apply_points(PointsEvent::new(PointsSource::Mission, 10))
            .unwrap();
        profile
            .apply_points(PointsEvent::new(PointsSource::Mission, 15))
            .unwrap();
        profile
            .apply_points(PointsEvent::new(PointsSource::Badge, 5))
            .unwrap();

        assert_eq!(profile.stats["mission"], 25);
        assert_eq!(profile.stats["badge"], 5);
        assert!(profile.stats.get("lastPointsAt").is_some());
    }

    #[test]
    fn test_history_is_capped() {
        let mut profile = GamificationProfile::new(Uuid::new_v4());
        for i in 0..(HISTORY_LIMIT + 5) {
            profile
                .apply_points(PointsEvent::new(PointsSource::Grant, 1).with_reason(i.to_string()))
                .unwrap();
        }

        let history = profile.parse_history().unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].reason.as_deref(), Some("5"));

        let recent = profile.recent_history(3).unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].reason.as_deref(), Some((HISTORY_LIMIT + 4).to_string().as_str()));
    }

    #[test]
    fn test_snapshot() {
        let mut profile = GamificationProfile::new(Uuid::new_v4());
        profile.missions_completed = 4;
        profile.rewards_count = 2;
        let snapshot = profile.snapshot(6);
        assert_eq!(snapshot.level, 1);
        assert_eq!(snapshot.streak, 6);
        assert_eq!(snapshot.missions, 4);
        assert_eq!(snapshot.rewards, 2);
    }
}
