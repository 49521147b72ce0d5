//! 数据模型
//!
//! 与数据库表一一对应的实体，以及 JSONB 字段中的嵌套结构

mod achievement;
mod badge;
mod collaboration;
mod enums;
mod gamification;
mod leaderboard;
mod mentorship;
mod multimedia;
mod requirement;
mod streak;
mod user;

pub use achievement::*;
pub use badge::*;
pub use collaboration::*;
pub use enums::*;
pub use gamification::*;
pub use leaderboard::*;
pub use mentorship::*;
pub use multimedia::*;
pub use requirement::*;
pub use streak::*;
pub use user::*;
