//! HTTP 请求处理器模块
//!
//! 处理器只负责参数提取、校验和响应包装，业务逻辑在服务层

pub mod achievement;
pub mod auth;
pub mod badge;
pub mod collaboration;
pub mod gamification;
pub mod health;
pub mod leaderboard;
pub mod mentorship;
pub mod multimedia;
pub mod streak;
