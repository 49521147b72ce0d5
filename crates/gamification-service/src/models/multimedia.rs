//! 多媒体文件元数据

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MediaType;

/// 已上传的文件
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MultimediaFile {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// 客户端提交的文件名
    pub original_name: String,
    /// 落盘文件名（UUID + 扩展名）
    pub stored_name: String,
    pub content_type: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    #[sqlx(default)]
    pub title: Option<String>,
    #[sqlx(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl MultimediaFile {
    /// 访问路径
    pub fn url(&self) -> String {
        format!("/uploads/{}", self.stored_name)
    }
}
