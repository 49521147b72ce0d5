//! 师徒 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::{
    ApiResponse, MentorQuery, RecordSessionRequest, RegisterMentorRequest,
    RequestMentorshipRequest, UpdateMentorRequest,
};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::{Mentor, MentorshipRelation, MentorshipView};
use crate::state::AppState;

// ==================== 导师 ====================

/// 注册为导师
///
/// POST /api/mentors
pub async fn register_mentor(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RegisterMentorRequest>,
) -> Result<Json<ApiResponse<Mentor>>> {
    req.validate()?;
    let mentor = state.mentorship.register_mentor(user.user_id(), req).await?;
    Ok(Json(ApiResponse::success_with_message(mentor, "导师已注册")))
}

/// GET /api/mentors?specialty=grammar
pub async fn list_mentors(
    State(state): State<AppState>,
    Query(query): Query<MentorQuery>,
) -> Result<Json<ApiResponse<Vec<Mentor>>>> {
    let mentors = state
        .mentorship
        .list_mentors(query.specialty.as_deref())
        .await?;
    Ok(Json(ApiResponse::success(mentors)))
}

/// GET /api/mentors/{id}
pub async fn get_mentor(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Mentor>>> {
    let mentor = state.mentorship.get_mentor(id).await?;
    Ok(Json(ApiResponse::success(mentor)))
}

/// PUT /api/mentors/{id}
pub async fn update_mentor(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateMentorRequest>,
) -> Result<Json<ApiResponse<Mentor>>> {
    req.validate()?;
    let mentor = state.mentorship.update_mentor(id, user.actor, req).await?;
    Ok(Json(ApiResponse::success(mentor)))
}

// ==================== 师徒关系 ====================

/// 学员申请
///
/// POST /api/mentorships
pub async fn request_mentorship(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RequestMentorshipRequest>,
) -> Result<Json<ApiResponse<MentorshipRelation>>> {
    req.validate()?;
    let relation = state
        .mentorship
        .request_mentorship(user.user_id(), req)
        .await?;
    Ok(Json(ApiResponse::success_with_message(relation, "申请已提交")))
}

/// POST /api/mentorships/{id}/accept
pub async fn accept(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MentorshipRelation>>> {
    let relation = state.mentorship.accept(id, user.actor).await?;
    Ok(Json(ApiResponse::success(relation)))
}

/// POST /api/mentorships/{id}/sessions
pub async fn record_session(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<RecordSessionRequest>,
) -> Result<Json<ApiResponse<MentorshipRelation>>> {
    req.validate()?;
    let relation = state
        .mentorship
        .record_session(id, user.actor, req.notes)
        .await?;
    Ok(Json(ApiResponse::success(relation)))
}

/// POST /api/mentorships/{id}/complete
pub async fn complete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MentorshipRelation>>> {
    let relation = state.mentorship.complete(id, user.actor).await?;
    Ok(Json(ApiResponse::success(relation)))
}

/// POST /api/mentorships/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MentorshipRelation>>> {
    let relation = state.mentorship.cancel(id, user.actor).await?;
    Ok(Json(ApiResponse::success(relation)))
}

/// 当前用户作为导师或学员的全部关系
///
/// GET /api/mentorships/me
pub async fn my_mentorships(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<Vec<MentorshipView>>>> {
    let relations = state.mentorship.list_for_user(user.user_id()).await?;
    Ok(Json(ApiResponse::success(relations)))
}
