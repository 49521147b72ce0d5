//! 多媒体 API 处理器
//!
//! 上传使用 multipart/form-data，字段：`file`（必填）、`title`、`description`

use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
};
use uuid::Uuid;

use crate::dto::{ApiResponse, MultimediaFileResponse, MultimediaQuery, PageResponse};
use crate::error::{GamificationError, Result};
use crate::middleware::CurrentUser;
use crate::service::UploadedFile;
use crate::state::AppState;

/// 上传文件
///
/// POST /api/multimedia/upload
pub async fn upload(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<MultimediaFileResponse>>> {
    let max_bytes = state.multimedia.max_bytes();
    let map_err = |e: MultipartError| multipart_error(e, max_bytes);

    let mut file: Option<(String, String, Vec<u8>)> = None;
    let mut title = None;
    let mut description = None;

    while let Some(field) = multipart.next_field().await.map_err(map_err)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(map_err)?;
                file = Some((file_name, content_type, data.to_vec()));
            }
            "title" => title = non_empty(field.text().await.map_err(map_err)?),
            "description" => description = non_empty(field.text().await.map_err(map_err)?),
            _ => {}
        }
    }

    let (file_name, content_type, data) =
        file.ok_or_else(|| GamificationError::Validation("缺少 file 字段".to_string()))?;

    let saved = state
        .multimedia
        .upload(
            user.user_id(),
            UploadedFile {
                file_name,
                content_type,
                data,
                title,
                description,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        saved.into(),
        "文件已上传",
    )))
}

/// GET /api/multimedia?ownerId=&page=&pageSize=
pub async fn list_files(
    State(state): State<AppState>,
    Query(query): Query<MultimediaQuery>,
) -> Result<Json<ApiResponse<PageResponse<MultimediaFileResponse>>>> {
    let pagination = query.pagination();
    let (files, total) = state.multimedia.list(query.owner_id, pagination).await?;

    let items = files.into_iter().map(MultimediaFileResponse::from).collect();
    Ok(Json(ApiResponse::success(PageResponse::new(
        items,
        total,
        pagination.page,
        pagination.limit(),
    ))))
}

/// GET /api/multimedia/{id}
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MultimediaFileResponse>>> {
    let file = state.multimedia.get(id).await?;
    Ok(Json(ApiResponse::success(file.into())))
}

/// DELETE /api/multimedia/{id}
pub async fn delete_file(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.multimedia.delete(id, user.actor).await?;
    Ok(Json(ApiResponse::success_empty()))
}

fn multipart_error(e: MultipartError, max_bytes: u64) -> GamificationError {
    if e.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        GamificationError::PayloadTooLarge { max_bytes }
    } else {
        GamificationError::Validation(e.body_text())
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
