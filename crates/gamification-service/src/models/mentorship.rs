//! 导师与师徒关系

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use uuid::Uuid;

use super::enums::MentorshipStatus;

/// 导师档案
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Mentor {
    pub id: Uuid,
    /// 对应的用户 ID（每个用户最多一个导师档案）
    pub user_id: Uuid,
    /// 擅长领域（JSON 字符串数组）
    pub specialties: Value,
    /// 可预约时间（JSON 对象，格式由客户端约定）
    pub availability: Value,
    /// 同时指导的学员上限
    pub max_mentees: i32,
    pub is_active: bool,
    /// 指导统计（JSON，存储 MentorStats）
    pub stats: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 导师统计
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentorStats {
    pub total_mentees: i64,
    pub completed_mentorships: i64,
    pub sessions_completed: i64,
}

impl Mentor {
    pub fn new(user_id: Uuid, specialties: Vec<String>, availability: Value, max_mentees: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            specialties: json!(specialties),
            availability,
            max_mentees,
            is_active: true,
            stats: json!(MentorStats::default()),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn parse_specialties(&self) -> Result<Vec<String>, serde_json::Error> {
        serde_json::from_value(self.specialties.clone())
    }

    pub fn parse_stats(&self) -> Result<MentorStats, serde_json::Error> {
        if self.stats.is_null() {
            return Ok(MentorStats::default());
        }
        serde_json::from_value(self.stats.clone())
    }

    /// 擅长领域匹配（忽略大小写）
    pub fn has_specialty(&self, specialty: &str) -> bool {
        self.parse_specialties()
            .map(|list| list.iter().any(|s| s.eq_ignore_ascii_case(specialty)))
            .unwrap_or(false)
    }
}

/// 师徒关系
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipRelation {
    pub id: Uuid,
    pub mentor_id: Uuid,
    /// 学员的用户 ID
    pub student_id: Uuid,
    pub status: MentorshipStatus,
    /// 学习目标（JSON 字符串数组）
    pub goals: Value,
    /// 进度（JSON，存储 MentorshipProgress）
    pub progress: Value,
    #[sqlx(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[sqlx(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 师徒关系进度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MentorshipProgress {
    pub sessions_completed: i32,
    pub last_session_at: Option<DateTime<Utc>>,
    pub notes: Vec<SessionNote>,
}

/// 单次辅导记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNote {
    pub recorded_at: DateTime<Utc>,
    pub recorded_by: Uuid,
    pub note: String,
}

impl MentorshipRelation {
    pub fn new(mentor_id: Uuid, student_id: Uuid, goals: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            mentor_id,
            student_id,
            status: MentorshipStatus::Pending,
            goals: json!(goals),
            progress: json!(MentorshipProgress::default()),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn parse_progress(&self) -> Result<MentorshipProgress, serde_json::Error> {
        if self.progress.is_null() {
            return Ok(MentorshipProgress::default());
        }
        serde_json::from_value(self.progress.clone())
    }

    /// 记录一次辅导
    pub fn record_session(
        &mut self,
        recorded_by: Uuid,
        note: Option<String>,
    ) -> Result<MentorshipProgress, serde_json::Error> {
        let now = Utc::now();
        let mut progress = self.parse_progress()?;
        progress.sessions_completed += 1;
        progress.last_session_at = Some(now);
        if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
            progress.notes.push(SessionNote {
                recorded_at: now,
                recorded_by,
                note,
            });
        }
        self.progress = serde_json::to_value(&progress)?;
        self.updated_at = now;
        Ok(progress)
    }
}

/// 师徒关系列表项（附带导师用户 ID，便于客户端区分身份）
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MentorshipView {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub relation: MentorshipRelation,
    pub mentor_user_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mentor_specialties() {
        let mentor = Mentor::new(
            Uuid::new_v4(),
            vec!["Pronunciation".into(), "grammar".into()],
            json!({ "monday": ["18:00-19:00"] }),
            3,
        );
        assert!(mentor.has_specialty("pronunciation"));
        assert!(!mentor.has_specialty("culture"));
        assert_eq!(mentor.parse_stats().unwrap(), MentorStats::default());
    }

    #[test]
    fn test_record_session() {
        let student = Uuid::new_v4();
        let mut relation = MentorshipRelation::new(Uuid::new_v4(), student, vec![]);

        relation.record_session(student, Some("greetings".into())).unwrap();
        let progress = relation.record_session(student, Some("  ".into())).unwrap();

        assert_eq!(progress.sessions_completed, 2);
        assert_eq!(progress.notes.len(), 1);
        assert!(progress.last_session_at.is_some());
        assert_eq!(relation.parse_progress().unwrap(), progress);
    }
}
