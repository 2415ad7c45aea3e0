//! 本地存储模块（SQLite）
//!
//! 设置、当前版本、版本历史三张表，表结构由 `migrations/` 管理

pub mod history_dao;
pub mod setting_dao;
pub mod version_dao;

pub use history_dao::HistoryDao;
pub use setting_dao::SettingDao;
pub use version_dao::VersionDao;

use crate::pcrd::error::{UpdaterError, UpdaterResult};
use sqlx::{Pool, Sqlite};

/// 连接可用性检查
pub(crate) async fn ping(db: &Pool<Sqlite>) -> UpdaterResult<()> {
    sqlx::query("SELECT 1")
        .execute(db)
        .await
        .map(|_| ())
        .map_err(|e| UpdaterError::RetrieveData(format!("sqlite ping failed: {}", e)))
}
