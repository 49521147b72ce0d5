//! Kamëntsá 语言学习平台游戏化服务
//!
//! 为语言学习应用提供积分、等级、连续学习、成就、徽章、排行榜、
//! 师徒辅导、协作奖励和多媒体上传的 REST API。
//!
//! ## 核心功能
//!
//! - **积分与等级**：所有积分变动经过统一账本，按经验值逐级升级
//! - **连续学习**：按自然日统计，连续天数决定积分倍率
//! - **成就与徽章**：积分变动后自动评估解锁条件
//! - **排行榜**：按总积分排序，Redis 缓存完整排名
//! - **师徒辅导**：导师注册、申请、会话记录和结业奖励
//! - **协作奖励**：按贡献质量和连续学习加成计算积分，每日限领
//! - **多媒体**：音频、图片、视频、文档上传到本地目录
//!
//! ## 模块结构
//!
//! - `auth`: JWT、密码哈希、Cookie
//! - `dto`: 请求和响应的数据传输对象
//! - `models`: 领域模型
//! - `repository`: PostgreSQL 数据访问
//! - `scoring`: 等级、倍率、奖励计算等纯函数
//! - `service`: 业务服务
//! - `handlers` / `routes`: HTTP 层
//! - `middleware`: 认证和管理员权限
//! - `state`: 应用状态
//!
//! ## 技术栈
//!
//! - Web 框架：Axum
//! - 数据库：sqlx + PostgreSQL
//! - 数据验证：validator
//! - 序列化：serde (camelCase)

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod scoring;
pub mod service;
pub mod state;

pub use error::{GamificationError, Result};
pub use state::AppState;
