//! 达成条件
//!
//! 成就和徽章共用同一种条件结构，存储在 `requirements` JSONB 字段中：
//! `{ "type": "points", "value": 500 }`

use serde::{Deserialize, Serialize};

use super::enums::RequirementType;

/// 达成条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub requirement_type: RequirementType,
    /// 目标值
    pub value: i64,
}

impl Requirement {
    pub fn new(requirement_type: RequirementType, value: i64) -> Self {
        Self {
            requirement_type,
            value,
        }
    }

    /// 当前进度百分比（0..=100）
    pub fn progress(&self, snapshot: &ProgressSnapshot) -> i32 {
        crate::scoring::requirement_progress(snapshot.value_of(self.requirement_type), self.value)
    }

    pub fn is_met(&self, snapshot: &ProgressSnapshot) -> bool {
        self.progress(snapshot) >= 100
    }
}

/// 用户进度快照
///
/// 由积分档案和连续打卡记录组合而成，用于条件判断
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    pub points: i64,
    pub level: i64,
    pub streak: i64,
    pub achievements: i64,
    pub missions: i64,
    pub rewards: i64,
}

impl ProgressSnapshot {
    pub fn value_of(&self, requirement_type: RequirementType) -> i64 {
        match requirement_type {
            RequirementType::Points => self.points,
            RequirementType::Level => self.level,
            RequirementType::Streak => self.streak,
            RequirementType::Achievements => self.achievements,
            RequirementType::Missions => self.missions,
            RequirementType::Rewards => self.rewards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requirement_json_shape() {
        let req: Requirement =
            serde_json::from_value(json!({ "type": "missions", "value": 5 })).unwrap();
        assert_eq!(req, Requirement::new(RequirementType::Missions, 5));

        let value = serde_json::to_value(Requirement::new(RequirementType::Level, 3)).unwrap();
        assert_eq!(value, json!({ "type": "level", "value": 3 }));
    }

    #[test]
    fn test_requirement_progress() {
        let snapshot = ProgressSnapshot {
            points: 250,
            streak: 7,
            ..Default::default()
        };

        let half = Requirement::new(RequirementType::Points, 500);
        assert_eq!(half.progress(&snapshot), 50);
        assert!(!half.is_met(&snapshot));

        let week = Requirement::new(RequirementType::Streak, 7);
        assert!(week.is_met(&snapshot));

        let none = Requirement::new(RequirementType::Rewards, 3);
        assert_eq!(none.progress(&snapshot), 0);
    }
}
