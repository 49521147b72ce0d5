//! 错误类型定义
//!
//! 服务层、仓储层和 HTTP 层共用一个错误枚举，
//! 通过 `status_code` / `error_code` 映射为统一的 JSON 响应

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// 游戏化服务错误
#[derive(Debug, thiserror::Error)]
pub enum GamificationError {
    // 认证与权限
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("禁止访问: {0}")]
    Forbidden(String),
    #[error("用户名或密码错误")]
    InvalidCredentials,

    // 参数校验
    #[error("参数验证失败: {0}")]
    Validation(String),
    #[error("无效的质量等级: {0}")]
    InvalidQuality(String),
    #[error("状态不允许该操作: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // 资源
    #[error("{resource}不存在: {id}")]
    NotFound { resource: &'static str, id: String },
    #[error("{0}")]
    AlreadyExists(String),

    // 业务限制
    #[error("并发更新冲突，请重试")]
    ConcurrencyConflict,
    #[error("今日领取次数已达上限: {0}")]
    LimitReached(String),
    #[error("导师学员已满: {0}")]
    MentorAtCapacity(String),

    // 上传
    #[error("文件过大，最大 {max_bytes} 字节")]
    PayloadTooLarge { max_bytes: u64 },
    #[error("不支持的文件类型: {0}")]
    UnsupportedMediaType(String),

    // 系统错误
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl GamificationError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            Self::Validation(_) | Self::InvalidQuality(_) | Self::InvalidTransition { .. } => {
                StatusCode::BAD_REQUEST
            }

            Self::NotFound { .. } => StatusCode::NOT_FOUND,

            Self::AlreadyExists(_)
            | Self::ConcurrencyConflict
            | Self::LimitReached(_)
            | Self::MentorAtCapacity(_) => StatusCode::CONFLICT,

            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,

            Self::Database(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidQuality(_) => "INVALID_QUALITY",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::ConcurrencyConflict => "CONCURRENCY_CONFLICT",
            Self::LimitReached(_) => "LIMIT_REACHED",
            Self::MentorAtCapacity(_) => "MENTOR_AT_CAPACITY",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for GamificationError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Io(e) => {
                tracing::error!(error = %e, "文件读写失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<validator::ValidationErrors> for GamificationError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

impl From<serde_json::Error> for GamificationError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON 处理错误: {}", err))
    }
}

impl From<kamentsa_shared::error::InfraError> for GamificationError {
    fn from(err: kamentsa_shared::error::InfraError) -> Self {
        match err {
            kamentsa_shared::error::InfraError::Database(e) => Self::Database(e),
            other => Self::Internal(format!("[{}] {}", other.code(), other)),
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, GamificationError>;

/// 唯一约束冲突（PostgreSQL 23505）
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505")
    )
}

/// 外键约束冲突（引用的行不存在）
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(GamificationError, StatusCode, &'static str)> {
        vec![
            (GamificationError::Unauthorized("token expired".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (GamificationError::Forbidden("admin only".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (GamificationError::InvalidCredentials, StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS"),
            (GamificationError::Validation("points must be positive".into()), StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            (GamificationError::InvalidQuality("legendary".into()), StatusCode::BAD_REQUEST, "INVALID_QUALITY"),
            (
                GamificationError::InvalidTransition { from: "completed".into(), to: "active".into() },
                StatusCode::BAD_REQUEST,
                "INVALID_TRANSITION",
            ),
            (GamificationError::not_found("徽章", 42), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (GamificationError::AlreadyExists("徽章已获得".into()), StatusCode::CONFLICT, "ALREADY_EXISTS"),
            (GamificationError::ConcurrencyConflict, StatusCode::CONFLICT, "CONCURRENCY_CONFLICT"),
            (GamificationError::LimitReached("translate".into()), StatusCode::CONFLICT, "LIMIT_REACHED"),
            (GamificationError::MentorAtCapacity("mentor".into()), StatusCode::CONFLICT, "MENTOR_AT_CAPACITY"),
            (GamificationError::PayloadTooLarge { max_bytes: 10 }, StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE"),
            (GamificationError::UnsupportedMediaType("text/html".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_MEDIA_TYPE"),
            (GamificationError::Database(sqlx::Error::RowNotFound), StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            (
                GamificationError::Io(std::io::Error::other("disk full")),
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
            ),
            (GamificationError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ]
    }

    #[test]
    fn test_status_and_error_codes() {
        for (err, status, code) in all_error_variants() {
            assert_eq!(err.status_code(), status, "status mismatch for {:?}", err);
            assert_eq!(err.error_code(), code, "code mismatch for {:?}", err);
        }
    }

    #[test]
    fn test_not_found_message() {
        let err = GamificationError::not_found("成就", "abc");
        assert_eq!(err.to_string(), "成就不存在: abc");
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = GamificationError::Internal("secret connection string".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "INTERNAL_ERROR");
        assert!(!json["message"].as_str().unwrap().contains("secret"));
    }

    #[tokio::test]
    async fn test_business_error_keeps_message() {
        let response = GamificationError::LimitReached("Translate a proverb".into()).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["message"].as_str().unwrap().contains("Translate a proverb"));
        assert!(json["data"].is_null());
    }

    #[test]
    fn test_from_validation_errors() {
        let errors = validator::ValidationErrors::new();
        let err: GamificationError = errors.into();
        assert!(matches!(err, GamificationError::Validation(_)));
    }
}
