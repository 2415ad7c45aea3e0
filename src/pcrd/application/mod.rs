//! 应用信息模块
//!
//! 从应用信息服务查询当前发布的应用版本

pub mod api;
pub mod types;

pub use api::ApplicationApi;
pub use types::{ApplicationItem, ApplicationListResp};
