//! 请求与响应 DTO

mod request;
mod response;

pub use request::*;
pub use response::*;
