//! 排行榜 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::dto::{ApiResponse, LeaderboardQuery};
use crate::error::Result;
use crate::models::LeaderboardEntry;
use crate::state::AppState;

/// GET /api/leaderboard?limit=10
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<ApiResponse<Vec<LeaderboardEntry>>>> {
    let entries = state.leaderboard.get_leaderboard(query.limit).await?;
    Ok(Json(ApiResponse::success(entries)))
}

/// GET /api/leaderboard/users/{user_id}
pub async fn get_user_rank(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<LeaderboardEntry>>> {
    let entry = state.leaderboard.get_user_rank(user_id).await?;
    Ok(Json(ApiResponse::success(entry)))
}
