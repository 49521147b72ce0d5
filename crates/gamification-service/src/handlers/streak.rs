//! 连续打卡 API 处理器

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::dto::ApiResponse;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::Streak;
use crate::service::StreakActivity;
use crate::state::AppState;

/// 记录今天的学习活动
///
/// POST /api/streaks/activity
pub async fn record_activity(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<StreakActivity>>> {
    let activity = state.streaks.record_activity(user.user_id()).await?;
    Ok(Json(ApiResponse::success(activity)))
}

/// GET /api/streaks/me
pub async fn get_my_streak(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Streak>>> {
    let streak = state.streaks.get_streak(user.user_id()).await?;
    Ok(Json(ApiResponse::success(streak)))
}

/// GET /api/streaks/{user_id}
pub async fn get_streak(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Streak>>> {
    let streak = state.streaks.get_streak(user_id).await?;
    Ok(Json(ApiResponse::success(streak)))
}
