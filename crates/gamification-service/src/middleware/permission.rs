//! 管理员权限检查
//!
//! 挂在需要管理员的路由组上，必须位于认证中间件之后

use axum::{body::Body, http::Request, middleware::Next, response::{IntoResponse, Response}};

use crate::auth::Claims;
use crate::error::GamificationError;

pub async fn require_admin(request: Request<Body>, next: Next) -> Response {
    match request.extensions().get::<Claims>() {
        Some(claims) if claims.is_admin() => next.run(request).await,
        Some(_) => GamificationError::Forbidden("需要管理员权限".to_string()).into_response(),
        None => GamificationError::Unauthorized("未认证".to_string()).into_response(),
    }
}
