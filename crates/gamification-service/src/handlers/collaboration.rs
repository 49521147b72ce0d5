//! 协作奖励 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    ApiResponse, ClaimRewardRequest, CreateRewardRequest, ListQuery, UpdateRewardRequest,
};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{CollaborationReward, UserRewardView};
use crate::service::ClaimOutcome;
use crate::state::AppState;

/// GET /api/collaboration-rewards
pub async fn list_rewards(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<CollaborationReward>>>> {
    let include_inactive = query.include_inactive && user.actor.is_admin;
    let rewards = state.collaboration.list(include_inactive).await?;
    Ok(Json(ApiResponse::success(rewards)))
}

/// GET /api/collaboration-rewards/{id}
pub async fn get_reward(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<CollaborationReward>>> {
    let reward = state.collaboration.get(id).await?;
    Ok(Json(ApiResponse::success(reward)))
}

/// POST /api/collaboration-rewards
pub async fn create_reward(
    State(state): State<AppState>,
    Json(req): Json<CreateRewardRequest>,
) -> Result<Json<ApiResponse<CollaborationReward>>> {
    req.validate()?;
    let reward = state.collaboration.create(req).await?;
    Ok(Json(ApiResponse::success_with_message(reward, "协作奖励已创建")))
}

/// PUT /api/collaboration-rewards/{id}
pub async fn update_reward(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateRewardRequest>,
) -> Result<Json<ApiResponse<CollaborationReward>>> {
    req.validate()?;
    let reward = state.collaboration.update(id, req).await?;
    Ok(Json(ApiResponse::success(reward)))
}

/// DELETE /api/collaboration-rewards/{id}
pub async fn delete_reward(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>> {
    state.collaboration.deactivate(id).await?;
    Ok(Json(ApiResponse::success_empty()))
}

/// 领取协作奖励
///
/// POST /api/collaboration-rewards/{id}/claim
pub async fn claim_reward(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ClaimRewardRequest>,
) -> Result<Json<ApiResponse<ClaimOutcome>>> {
    req.validate()?;
    let outcome = state.collaboration.claim(user.user_id(), id, req).await?;
    Ok(Json(ApiResponse::success_with_message(outcome, "奖励已领取")))
}

/// GET /api/collaboration-rewards/users/{user_id}
pub async fn list_user_rewards(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<UserRewardView>>>> {
    let rewards = state.collaboration.list_user_rewards(user_id).await?;
    Ok(Json(ApiResponse::success(rewards)))
}
