//! 积分档案 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{ApiResponse, CompleteMissionRequest, GrantPointsRequest, HistoryQuery};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{GamificationProfile, PointsEvent};
use crate::service::PointsOutcome;
use crate::state::AppState;

/// 当前用户的积分档案
///
/// GET /api/gamification/me
pub async fn get_my_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<GamificationProfile>>> {
    let profile = state.gamification.get_profile(user.user_id()).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// 指定用户的积分档案
///
/// GET /api/gamification/{user_id}
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<GamificationProfile>>> {
    let profile = state.gamification.get_profile(user_id).await?;
    Ok(Json(ApiResponse::success(profile)))
}

/// 发放积分（管理员）
///
/// POST /api/gamification/grant-points/{user_id}
pub async fn grant_points(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<GrantPointsRequest>,
) -> Result<Json<ApiResponse<PointsOutcome>>> {
    req.validate()?;
    let outcome = state
        .gamification
        .grant_points(user_id, req.points, req.reason)
        .await?;
    Ok(Json(ApiResponse::success_with_message(outcome, "积分已发放")))
}

/// 记录任务完成（管理员）
///
/// POST /api/gamification/{user_id}/missions
pub async fn complete_mission(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<CompleteMissionRequest>,
) -> Result<Json<ApiResponse<PointsOutcome>>> {
    req.validate()?;
    let outcome = state
        .gamification
        .complete_mission(user_id, req.mission_id, req.points)
        .await?;
    Ok(Json(ApiResponse::success(outcome)))
}

/// 积分历史
///
/// GET /api/gamification/{user_id}/history?limit=20
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<ApiResponse<Vec<PointsEvent>>>> {
    let history = state.gamification.history(user_id, query.limit).await?;
    Ok(Json(ApiResponse::success(history)))
}
