//! 成就 API 处理器
//!
//! 读接口对所有登录用户开放，写接口由路由层限制为管理员

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{ApiResponse, CreateAchievementRequest, ListQuery, UpdateAchievementRequest};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{Achievement, UserAchievementView};
use crate::service::{ProgressObserver, ProgressUpdate};
use crate::state::AppState;

/// GET /api/achievements?includeInactive=true
pub async fn list_achievements(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Achievement>>>> {
    // 只有管理员能看到停用的成就
    let include_inactive = query.include_inactive && user.actor.is_admin;
    let achievements = state.achievements.list(include_inactive).await?;
    Ok(Json(ApiResponse::success(achievements)))
}

/// GET /api/achievements/{id}
pub async fn get_achievement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Achievement>>> {
    let achievement = state.achievements.get(id).await?;
    Ok(Json(ApiResponse::success(achievement)))
}

/// POST /api/achievements
pub async fn create_achievement(
    State(state): State<AppState>,
    Json(req): Json<CreateAchievementRequest>,
) -> Result<Json<ApiResponse<Achievement>>> {
    req.validate()?;
    let achievement = state.achievements.create(req).await?;
    Ok(Json(ApiResponse::success_with_message(achievement, "成就已创建")))
}

/// PUT /api/achievements/{id}
pub async fn update_achievement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAchievementRequest>,
) -> Result<Json<ApiResponse<Achievement>>> {
    req.validate()?;
    let achievement = state.achievements.update(id, req).await?;
    Ok(Json(ApiResponse::success(achievement)))
}

/// 停用成就
///
/// DELETE /api/achievements/{id}
pub async fn delete_achievement(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.achievements.deactivate(id).await?;
    Ok(Json(ApiResponse::success_empty()))
}

/// 重新评估用户的成就和徽章（本人或管理员）
///
/// POST /api/achievements/evaluate/{user_id}
pub async fn evaluate_user(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProgressUpdate>>> {
    user.actor.require_self_or_admin(user_id)?;
    let update = state.progression.on_progress(user_id).await;
    Ok(Json(ApiResponse::success(update)))
}

/// GET /api/achievements/users/{user_id}
pub async fn list_user_achievements(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<UserAchievementView>>>> {
    let achievements = state.achievements.list_user_achievements(user_id).await?;
    Ok(Json(ApiResponse::success(achievements)))
}
