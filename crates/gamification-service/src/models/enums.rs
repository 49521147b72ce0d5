//! 枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 用户角色
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum UserRole {
    /// 学习者
    #[default]
    User,
    /// 管理员 - 可维护成就、徽章、奖励并手动发放积分
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

/// 徽章等级
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum BadgeTier {
    #[default]
    Bronze,
    Silver,
    Gold,
    Platinum,
}

impl BadgeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bronze => "bronze",
            Self::Silver => "silver",
            Self::Gold => "gold",
            Self::Platinum => "platinum",
        }
    }
}

/// 师徒关系状态
///
/// 状态流转：pending -> active -> completed，pending/active 可取消
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum MentorshipStatus {
    /// 学员已申请，等待导师确认
    #[default]
    Pending,
    /// 进行中
    Active,
    /// 已结业
    Completed,
    /// 已取消
    Cancelled,
}

impl MentorshipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// 是否为未结束状态（同一对导师/学员只允许存在一条）
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Active)
    }

    /// 检查状态流转是否合法
    pub fn can_transition_to(&self, next: MentorshipStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Active)
                | (Self::Pending, Self::Cancelled)
                | (Self::Active, Self::Completed)
                | (Self::Active, Self::Cancelled)
        )
    }
}

/// 协作类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum CollaborationType {
    /// 翻译
    #[default]
    Translation,
    /// 审校他人内容
    Review,
    /// 学习内容创作
    ContentCreation,
    /// 发音录音
    Pronunciation,
    /// 文化知识贡献
    CulturalContribution,
}

impl CollaborationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Translation => "translation",
            Self::Review => "review",
            Self::ContentCreation => "content_creation",
            Self::Pronunciation => "pronunciation",
            Self::CulturalContribution => "cultural_contribution",
        }
    }
}

/// 多媒体类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Audio,
    Video,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
        }
    }

    /// 根据 Content-Type 判断媒体类型，不支持的类型返回 None
    ///
    /// SVG 可以内嵌脚本，不允许上传
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_essence(content_type);
        match essence.split_once('/') {
            Some(("image", "svg+xml")) => None,
            Some(("image", sub)) if !sub.is_empty() => Some(Self::Image),
            Some(("audio", sub)) if !sub.is_empty() => Some(Self::Audio),
            Some(("video", sub)) if !sub.is_empty() => Some(Self::Video),
            Some(("application", "pdf")) => Some(Self::Document),
            _ => None,
        }
    }

    /// 存储文件使用的扩展名，只由 Content-Type 决定
    ///
    /// 不在列表中的子类型不带扩展名，静态文件服务按 octet-stream 返回
    pub fn extension_for(content_type: &str) -> Option<&'static str> {
        let ext = match content_essence(content_type).as_str() {
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "audio/mpeg" => "mp3",
            "audio/ogg" => "ogg",
            "audio/wav" | "audio/x-wav" => "wav",
            "audio/mp4" => "m4a",
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "video/ogg" => "ogv",
            "video/quicktime" => "mov",
            "application/pdf" => "pdf",
            _ => return None,
        };
        Some(ext)
    }
}

fn content_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// 达成条件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequirementType {
    /// 累计积分
    Points,
    /// 等级
    Level,
    /// 当前连续天数
    Streak,
    /// 已解锁成就数
    Achievements,
    /// 已完成任务数
    Missions,
    /// 已获得奖励数
    Rewards,
}

/// 积分变动来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsSource {
    /// 管理员手动发放
    Grant,
    /// 完成任务
    Mission,
    /// 解锁成就
    Achievement,
    /// 获得徽章
    Badge,
    /// 协作奖励
    Collaboration,
    /// 师徒活动
    Mentorship,
}

impl PointsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Mission => "mission",
            Self::Achievement => "achievement",
            Self::Badge => "badge",
            Self::Collaboration => "collaboration",
            Self::Mentorship => "mentorship",
        }
    }
}

/// 连续打卡结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakOutcome {
    /// 首次打卡或重置后重新开始
    Started,
    /// 连续的第二天及以后
    Continued,
    /// 中断一天，使用宽限期延续
    GraceUsed,
    /// 中断过久，连续天数重置
    Reset,
    /// 当天已打卡
    AlreadyRecorded,
}

impl StreakOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Continued => "continued",
            Self::GraceUsed => "grace_used",
            Self::Reset => "reset",
            Self::AlreadyRecorded => "already_recorded",
        }
    }
}
