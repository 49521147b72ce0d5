//! 中间件模块
//!
//! 提供认证、管理员权限检查和当前用户提取

mod auth;
mod permission;

pub use auth::{CurrentUser, auth_middleware, extract_token};
pub use permission::require_admin;
