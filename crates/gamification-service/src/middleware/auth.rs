//! JWT 认证中间件
//!
//! Token 可以来自 `Authorization: Bearer` 请求头，也可以来自 `access_token` Cookie。
//! 验证通过后将 Claims 注入请求扩展。

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, StatusCode, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;

use crate::auth::Claims;
use crate::error::GamificationError;
use crate::service::Actor;
use crate::state::AppState;

/// 无需认证的路径
const PUBLIC_PATHS: [&str; 4] = ["/health", "/ready", "/api/auth/register", "/api/auth/login"];

/// 认证中间件
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path();
    if PUBLIC_PATHS.contains(&path) || request.method() == axum::http::Method::OPTIONS {
        return next.run(request).await;
    }

    let Some(token) = extract_token(request.headers(), &state.config.auth.cookie_name) else {
        return unauthorized_response("缺少认证 Token");
    };

    match state.jwt.verify_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => unauthorized_response(&e.to_string()),
    }
}

/// 提取 Token：优先请求头，其次 Cookie
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
}

/// 生成 401 未授权响应
fn unauthorized_response(message: &str) -> Response {
    let body = json!({
        "success": false,
        "code": "UNAUTHORIZED",
        "message": message,
        "data": null
    });

    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

/// 当前登录用户
///
/// 处理器参数中声明即可获得 Claims 和对应的 [`Actor`]
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
    pub actor: Actor,
}

impl CurrentUser {
    pub fn user_id(&self) -> uuid::Uuid {
        self.actor.user_id
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = GamificationError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| GamificationError::Unauthorized("未认证".to_string()))?;
        let actor = Actor::from_claims(&claims)?;
        Ok(Self { claims, actor })
    }
}
