//! 多媒体服务
//!
//! 文件保存在本地上传目录，文件名使用 UUID，元数据写入数据库。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use kamentsa_shared::observability::metrics;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::Actor;
use crate::dto::PaginationParams;
use crate::error::{GamificationError, Result};
use crate::models::{MediaType, MultimediaFile};
use crate::repository::MultimediaRepositoryTrait;

/// 与 multimedia_files 列宽一致
const MAX_FILE_NAME_CHARS: usize = 255;
const MAX_CONTENT_TYPE_CHARS: usize = 100;
const MAX_TITLE_CHARS: usize = 200;

/// 解析后的上传内容
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub title: Option<String>,
    pub description: Option<String>,
}

pub struct MultimediaService {
    repo: Arc<dyn MultimediaRepositoryTrait>,
    upload_dir: PathBuf,
    max_bytes: u64,
}

impl MultimediaService {
    pub fn new(repo: Arc<dyn MultimediaRepositoryTrait>, upload_dir: PathBuf, max_bytes: u64) -> Self {
        Self {
            repo,
            upload_dir,
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    #[instrument(skip(self, upload), fields(file_name = %upload.file_name, size = upload.data.len()))]
    pub async fn upload(&self, owner_id: Uuid, upload: UploadedFile) -> Result<MultimediaFile> {
        if upload.data.is_empty() {
            return Err(GamificationError::Validation("上传文件为空".to_string()));
        }
        let size = upload.data.len() as u64;
        if size > self.max_bytes {
            return Err(GamificationError::PayloadTooLarge {
                max_bytes: self.max_bytes,
            });
        }
        check_length("文件名", &upload.file_name, MAX_FILE_NAME_CHARS)?;
        check_length("Content-Type", &upload.content_type, MAX_CONTENT_TYPE_CHARS)?;
        if let Some(title) = &upload.title {
            check_length("标题", title, MAX_TITLE_CHARS)?;
        }
        let media_type = MediaType::from_content_type(&upload.content_type)
            .ok_or_else(|| GamificationError::UnsupportedMediaType(upload.content_type.clone()))?;

        let id = Uuid::new_v4();
        // 扩展名只取自已校验的 Content-Type，客户端文件名不影响存储路径
        let stored_name = match MediaType::extension_for(&upload.content_type) {
            Some(ext) => format!("{}.{}", id, ext),
            None => id.to_string(),
        };

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(&stored_name);
        tokio::fs::write(&path, &upload.data).await?;

        let file = MultimediaFile {
            id,
            owner_id,
            original_name: upload.file_name,
            stored_name,
            content_type: upload.content_type,
            media_type,
            size_bytes: size as i64,
            title: upload.title,
            description: upload.description,
            created_at: Utc::now(),
        };

        if let Err(e) = self.repo.create(&file).await {
            // 元数据写入失败时不保留孤儿文件
            remove_file(&path).await;
            return Err(e);
        }

        metrics::record_upload(media_type.as_str(), size);
        info!(file_id = %file.id, %owner_id, media_type = media_type.as_str(), size, "文件已上传");
        Ok(file)
    }

    pub async fn get(&self, id: Uuid) -> Result<MultimediaFile> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| GamificationError::not_found("文件", id))
    }

    /// 分页列表，返回 (当前页, 总数)
    pub async fn list(
        &self,
        owner_id: Option<Uuid>,
        pagination: PaginationParams,
    ) -> Result<(Vec<MultimediaFile>, i64)> {
        let files = self
            .repo
            .list(owner_id, pagination.limit(), pagination.offset())
            .await?;
        let total = self.repo.count(owner_id).await?;
        Ok((files, total))
    }

    /// 删除文件（上传者或管理员），先删磁盘文件再删记录
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid, actor: Actor) -> Result<()> {
        let file = self.get(id).await?;
        actor.require_self_or_admin(file.owner_id)?;

        let path = self.upload_dir.join(&file.stored_name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(file_id = %id, path = %path.display(), "磁盘文件已不存在");
            }
            Err(e) => return Err(e.into()),
        }

        if !self.repo.delete(id).await? {
            return Err(GamificationError::not_found("文件", id));
        }

        info!(file_id = %id, deleted_by = %actor.user_id, "文件已删除");
        Ok(())
    }
}

fn check_length(field: &str, value: &str, max_chars: usize) -> Result<()> {
    if value.chars().count() > max_chars {
        return Err(GamificationError::Validation(format!(
            "{}过长，最多 {} 个字符",
            field, max_chars
        )));
    }
    Ok(())
}

async fn remove_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "清理上传文件失败");
    }
}
