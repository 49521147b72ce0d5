//! 协作奖励

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::CollaborationType;

/// 协作奖励定义
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CollaborationReward {
    pub id: Uuid,
    pub title: String,
    #[sqlx(default)]
    pub description: Option<String>,
    pub collaboration_type: CollaborationType,
    pub base_points: i64,
    /// 质量等级 -> 倍率（JSON 对象）
    pub quality_multipliers: Value,
    /// 每个用户每个 UTC 日最多领取次数
    pub max_claims_per_day: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CollaborationReward {
    pub fn parse_quality_multipliers(&self) -> Result<HashMap<String, f64>, serde_json::Error> {
        serde_json::from_value(self.quality_multipliers.clone())
    }

    /// 查找质量倍率（忽略大小写），未知等级返回 None
    pub fn multiplier_for(&self, quality: &str) -> Option<f64> {
        let quality = quality.trim().to_ascii_lowercase();
        self.parse_quality_multipliers()
            .ok()?
            .into_iter()
            .find(|(k, _)| k.to_ascii_lowercase() == quality)
            .map(|(_, v)| v)
    }
}

/// 用户领取记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserReward {
    pub id: Uuid,
    pub user_id: Uuid,
    pub reward_id: Uuid,
    pub quality: String,
    /// 领取时的连续加成
    pub streak_bonus: f64,
    pub points_awarded: i64,
    /// 提交内容的附加信息（JSON 对象）
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// 用户领取列表项（领取记录 JOIN 奖励定义）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRewardView {
    pub id: Uuid,
    pub reward_id: Uuid,
    pub title: String,
    pub collaboration_type: CollaborationType,
    pub quality: String,
    pub streak_bonus: f64,
    pub points_awarded: i64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reward(multipliers: Value) -> CollaborationReward {
        CollaborationReward {
            id: Uuid::new_v4(),
            title: "Translate a proverb".into(),
            description: None,
            collaboration_type: CollaborationType::Translation,
            base_points: 10,
            quality_multipliers: multipliers,
            max_claims_per_day: 3,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_multiplier_lookup() {
        let r = reward(json!({ "excellent": 2.0, "good": 1.5 }));
        assert_eq!(r.multiplier_for("Excellent"), Some(2.0));
        assert_eq!(r.multiplier_for(" good "), Some(1.5));
        assert_eq!(r.multiplier_for("legendary"), None);
    }

    #[test]
    fn test_malformed_multipliers() {
        let r = reward(json!(["excellent"]));
        assert!(r.parse_quality_multipliers().is_err());
        assert_eq!(r.multiplier_for("excellent"), None);
    }
}
