//! 认证模块
//!
//! 提供 JWT Token 生成、验证、访问令牌 Cookie 和密码处理功能

mod cookie;
mod jwt;
mod password;

pub use cookie::{build_access_cookie, build_clear_cookie};
pub use jwt::{Claims, JwtConfig, JwtManager};
pub use password::{hash_password, verify_password};
