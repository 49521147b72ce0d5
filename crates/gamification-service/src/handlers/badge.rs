//! 徽章 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

use crate::dto::{ApiResponse, CreateBadgeRequest, ListQuery, UpdateBadgeRequest};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{Badge, UserBadgeView};
use crate::service::{ProgressObserver, ProgressUpdate};
use crate::state::AppState;

/// 手动授予结果
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardResponse {
    pub badge: Badge,
    pub progress: ProgressUpdate,
}

/// GET /api/badges
pub async fn list_badges(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Badge>>>> {
    let include_inactive = query.include_inactive && user.actor.is_admin;
    let badges = state.badges.list(include_inactive).await?;
    Ok(Json(ApiResponse::success(badges)))
}

/// GET /api/badges/{id}
pub async fn get_badge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Badge>>> {
    let badge = state.badges.get(id).await?;
    Ok(Json(ApiResponse::success(badge)))
}

/// POST /api/badges
pub async fn create_badge(
    State(state): State<AppState>,
    Json(req): Json<CreateBadgeRequest>,
) -> Result<Json<ApiResponse<Badge>>> {
    req.validate()?;
    let badge = state.badges.create(req).await?;
    Ok(Json(ApiResponse::success_with_message(badge, "徽章已创建")))
}

/// PUT /api/badges/{id}
pub async fn update_badge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBadgeRequest>,
) -> Result<Json<ApiResponse<Badge>>> {
    req.validate()?;
    let badge = state.badges.update(id, req).await?;
    Ok(Json(ApiResponse::success(badge)))
}

/// DELETE /api/badges/{id}
pub async fn delete_badge(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.badges.deactivate(id).await?;
    Ok(Json(ApiResponse::success_empty()))
}

/// 手动授予徽章（管理员）
///
/// POST /api/badges/{id}/award/{user_id}
pub async fn award_badge(
    State(state): State<AppState>,
    Path((badge_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<AwardResponse>>> {
    let badge = state.badges.award_badge(user_id, badge_id).await?;
    // 奖励积分和奖励数可能触发新的成就
    let progress = state.progression.on_progress(user_id).await;
    Ok(Json(ApiResponse::success_with_message(
        AwardResponse { badge, progress },
        "徽章已授予",
    )))
}

/// GET /api/badges/users/{user_id}
pub async fn list_user_badges(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<UserBadgeView>>>> {
    let badges = state.badges.list_user_badges(user_id).await?;
    Ok(Json(ApiResponse::success(badges)))
}
