//! 版本事件模块
//!
//! 资源版本变更后对外发布事件：Webhook 或进程内监听器

pub mod listener;
pub mod types;
pub mod webhook;

pub use listener::{EmptyVersionListener, ListenerVersionEvent, VersionListener};
pub use types::VersionEvent;
pub use webhook::WebhookVersionEvent;
