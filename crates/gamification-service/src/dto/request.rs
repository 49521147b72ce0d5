//! 请求 DTO 定义
//!
//! 所有 REST API 的请求参数和请求体结构，字段统一使用 camelCase

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{BadgeTier, CollaborationType, Requirement};

// ==================== 认证 ====================

/// 注册请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 32, message = "用户名长度必须在3-32个字符之间"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "邮箱格式不正确"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "密码长度必须在8-128个字符之间"))]
    pub password: String,
    #[validate(length(max = 64, message = "显示名称不能超过64个字符"))]
    pub display_name: Option<String>,
}

/// 登录请求，`login` 可以是用户名或邮箱
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(alias = "username", alias = "email")]
    #[validate(length(min = 1, message = "用户名或邮箱不能为空"))]
    pub login: String,
    #[validate(length(min = 1, message = "密码不能为空"))]
    pub password: String,
}

// ==================== 积分 ====================

/// 手动发放积分
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantPointsRequest {
    #[validate(range(min = 1, max = 100000, message = "积分必须在1-100000之间"))]
    pub points: i64,
    #[validate(length(max = 255, message = "原因不能超过255个字符"))]
    pub reason: Option<String>,
}

/// 完成任务
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteMissionRequest {
    #[validate(length(min = 1, max = 64, message = "任务ID长度必须在1-64个字符之间"))]
    pub mission_id: String,
    #[validate(range(min = 0, max = 100000, message = "积分必须在0-100000之间"))]
    pub points: i64,
}

/// 积分历史查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// 排行榜查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardQuery {
    pub limit: Option<i64>,
}

// ==================== 成就 & 徽章 ====================

/// 列表查询（仅管理员可查看停用项）
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default)]
    pub include_inactive: bool,
}

/// 创建成就
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAchievementRequest {
    #[validate(length(min = 1, max = 100, message = "成就名称长度必须在1-100个字符之间"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "分类长度必须在1-50个字符之间"))]
    pub category: String,
    #[validate(custom(function = "validate_requirement"))]
    pub requirements: Requirement,
    #[validate(range(min = 0, max = 100000, message = "奖励积分必须在0-100000之间"))]
    #[serde(default)]
    pub points_reward: i64,
    pub icon_url: Option<String>,
}

/// 更新成就
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAchievementRequest {
    #[validate(length(min = 1, max = 100, message = "成就名称长度必须在1-100个字符之间"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(length(min = 1, max = 50, message = "分类长度必须在1-50个字符之间"))]
    pub category: Option<String>,
    #[validate(custom(function = "validate_requirement"))]
    pub requirements: Option<Requirement>,
    #[validate(range(min = 0, max = 100000, message = "奖励积分必须在0-100000之间"))]
    pub points_reward: Option<i64>,
    pub icon_url: Option<String>,
    pub is_active: Option<bool>,
}

/// 创建徽章
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBadgeRequest {
    #[validate(length(min = 1, max = 100, message = "徽章名称长度必须在1-100个字符之间"))]
    pub name: String,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    #[validate(length(min = 1, max = 50, message = "分类长度必须在1-50个字符之间"))]
    pub category: String,
    #[serde(default)]
    pub tier: BadgeTier,
    #[validate(custom(function = "validate_requirement"))]
    pub requirements: Requirement,
    #[validate(range(min = 0, max = 100000, message = "奖励积分必须在0-100000之间"))]
    #[serde(default)]
    pub points_reward: i64,
}

/// 更新徽章
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBadgeRequest {
    #[validate(length(min = 1, max = 100, message = "徽章名称长度必须在1-100个字符之间"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon_url: Option<String>,
    #[validate(length(min = 1, max = 50, message = "分类长度必须在1-50个字符之间"))]
    pub category: Option<String>,
    pub tier: Option<BadgeTier>,
    #[validate(custom(function = "validate_requirement"))]
    pub requirements: Option<Requirement>,
    #[validate(range(min = 0, max = 100000, message = "奖励积分必须在0-100000之间"))]
    pub points_reward: Option<i64>,
    pub is_active: Option<bool>,
}

// ==================== 师徒 ====================

/// 注册为导师
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterMentorRequest {
    #[validate(length(min = 1, max = 10, message = "擅长领域数量必须在1-10之间"))]
    pub specialties: Vec<String>,
    pub availability: Option<Value>,
    #[validate(range(min = 1, max = 20, message = "学员上限必须在1-20之间"))]
    #[serde(default = "default_max_mentees")]
    pub max_mentees: i32,
}

fn default_max_mentees() -> i32 {
    3
}

/// 更新导师档案
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMentorRequest {
    #[validate(length(min = 1, max = 10, message = "擅长领域数量必须在1-10之间"))]
    pub specialties: Option<Vec<String>>,
    pub availability: Option<Value>,
    #[validate(range(min = 1, max = 20, message = "学员上限必须在1-20之间"))]
    pub max_mentees: Option<i32>,
    pub is_active: Option<bool>,
}

/// 导师列表查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorQuery {
    pub specialty: Option<String>,
}

/// 申请师徒关系
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RequestMentorshipRequest {
    pub mentor_id: Uuid,
    #[validate(length(max = 10, message = "学习目标不能超过10条"))]
    #[serde(default)]
    pub goals: Vec<String>,
}

/// 记录辅导
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordSessionRequest {
    #[validate(length(max = 2000, message = "备注不能超过2000个字符"))]
    pub notes: Option<String>,
}

// ==================== 协作奖励 ====================

/// 创建协作奖励
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateRewardRequest {
    #[validate(length(min = 1, max = 100, message = "标题长度必须在1-100个字符之间"))]
    pub title: String,
    pub description: Option<String>,
    pub collaboration_type: CollaborationType,
    #[validate(range(min = 1, max = 10000, message = "基础积分必须在1-10000之间"))]
    pub base_points: i64,
    #[validate(custom(function = "validate_quality_multipliers"))]
    pub quality_multipliers: Option<HashMap<String, f64>>,
    #[validate(range(min = 1, max = 100, message = "每日领取上限必须在1-100之间"))]
    #[serde(default = "default_max_claims_per_day")]
    pub max_claims_per_day: i32,
}

fn default_max_claims_per_day() -> i32 {
    5
}

/// 更新协作奖励
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRewardRequest {
    #[validate(length(min = 1, max = 100, message = "标题长度必须在1-100个字符之间"))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub collaboration_type: Option<CollaborationType>,
    #[validate(range(min = 1, max = 10000, message = "基础积分必须在1-10000之间"))]
    pub base_points: Option<i64>,
    #[validate(custom(function = "validate_quality_multipliers"))]
    pub quality_multipliers: Option<HashMap<String, f64>>,
    #[validate(range(min = 1, max = 100, message = "每日领取上限必须在1-100之间"))]
    pub max_claims_per_day: Option<i32>,
    pub is_active: Option<bool>,
}

/// 领取协作奖励
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRewardRequest {
    #[validate(length(min = 1, max = 32, message = "质量等级不能为空"))]
    pub quality: String,
    pub metadata: Option<Value>,
}

// ==================== 分页 ====================

/// 分页参数
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    20
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

impl PaginationParams {
    /// 数据库查询的 offset
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.limit()
    }

    /// 每页条数（1-100）
    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, 100)
    }
}

/// 多媒体列表查询
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultimediaQuery {
    pub owner_id: Option<Uuid>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl MultimediaQuery {
    pub fn pagination(&self) -> PaginationParams {
        let defaults = PaginationParams::default();
        PaginationParams {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
        }
    }
}

// ==================== 自定义校验 ====================

fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("username")
            .with_message("用户名只能包含字母、数字、下划线、点和连字符".into()))
    }
}

fn validate_requirement(requirement: &Requirement) -> Result<(), ValidationError> {
    if requirement.value < 1 {
        return Err(ValidationError::new("requirement").with_message("条件目标值必须大于0".into()));
    }
    Ok(())
}

fn validate_quality_multipliers(multipliers: &HashMap<String, f64>) -> Result<(), ValidationError> {
    if multipliers.is_empty() {
        return Err(ValidationError::new("quality_multipliers")
            .with_message("质量倍率不能为空".into()));
    }
    if multipliers
        .iter()
        .any(|(k, v)| k.trim().is_empty() || !v.is_finite() || *v <= 0.0 || *v > 10.0)
    {
        return Err(ValidationError::new("quality_multipliers")
            .with_message("质量倍率必须在0-10之间".into()));
    }
    Ok(())
}
