//! 认证相关的 HTTP 处理器
//!
//! 提供注册、登录、登出、获取当前用户和刷新 Token 的 API。
//! Token 同时写入响应体和 HttpOnly Cookie。

use axum::{
    Json,
    extract::State,
    http::header::{HeaderName, SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
};
use kamentsa_shared::config::AuthConfig;
use validator::Validate;

use crate::auth::{build_access_cookie, build_clear_cookie};
use crate::dto::{ApiResponse, AuthResponse, LoginRequest, RegisterRequest};
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::models::User;
use crate::state::AppState;

/// 用户注册
///
/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<TokenResponse> {
    req.validate()?;
    let response = state.auth.register(req).await?;
    Ok(with_cookie(&state.config.auth, state.jwt.expires_in_secs(), response, "注册成功"))
}

/// 用户登录
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<TokenResponse> {
    req.validate()?;
    let response = state.auth.login(req).await?;
    Ok(with_cookie(&state.config.auth, state.jwt.expires_in_secs(), response, "登录成功"))
}

/// 登出：清除 Cookie
///
/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, build_clear_cookie(&state.config.auth))]),
        Json(ApiResponse::<()>::success_empty()),
    )
}

/// 当前用户
///
/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<ApiResponse<User>>> {
    let me = state.auth.me(user.user_id()).await?;
    Ok(Json(ApiResponse::success(me)))
}

/// 刷新 Token
///
/// POST /api/auth/refresh
pub async fn refresh(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<TokenResponse> {
    let me = state.auth.me(user.user_id()).await?;
    let (token, expires_at) = state.jwt.issue_for(&me)?;
    let response = AuthResponse {
        token,
        expires_at,
        user: me,
    };
    Ok(with_cookie(&state.config.auth, state.jwt.expires_in_secs(), response, "Token 已刷新"))
}

/// 带 Set-Cookie 头的 Token 响应
type TokenResponse = (
    AppendHeaders<[(HeaderName, String); 1]>,
    Json<ApiResponse<AuthResponse>>,
);

fn with_cookie(
    auth: &AuthConfig,
    expires_in_secs: i64,
    response: AuthResponse,
    message: &str,
) -> TokenResponse {
    let cookie = build_access_cookie(auth, &response.token, expires_in_secs);
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(ApiResponse::success_with_message(response, message)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_cookie_owns_its_values() {
        let response = {
            let auth = AuthConfig::default();
            let user = User::new("juan_k".into(), "juan@kamentsa.test".into(), "hash".into());
            let body = AuthResponse {
                token: "abc.def.ghi".into(),
                expires_at: 0,
                user,
            };
            with_cookie(&auth, 3600, body, "登录成功")
        };

        let (AppendHeaders([(name, cookie)]), Json(body)) = response;
        assert_eq!(name, SET_COOKIE);
        assert!(cookie.starts_with("access_token=abc.def.ghi"));
        assert!(cookie.contains("Max-Age=3600"));
        assert_eq!(body.data.map(|r| r.token).as_deref(), Some("abc.def.ghi"));
    }
}
