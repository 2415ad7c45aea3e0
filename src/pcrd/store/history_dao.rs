//! 版本历史数据访问层（DAO）

use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::models::GameVersion;
use crate::pcrd::repository::HistoryRepository;
use crate::pcrd::store::version_dao::row_to_version;
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use tracing::{error, info, Instrument};

/// 历史 DAO（基于 sqlx），只追加
pub struct HistoryDao {
    db: Pool<Sqlite>,
}

impl HistoryDao {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    async fn append(&self, version: &GameVersion) -> UpdaterResult<()> {
        sqlx::query(
            r#"
            INSERT INTO histories (
                setting_id, server_code, app_version, res_version, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&version.setting_id)
        .bind(version.server_code.as_str())
        .bind(&version.app_version)
        .bind(&version.res_version)
        .bind(version.created_at.timestamp_millis())
        .bind(version.updated_at.timestamp_millis())
        .execute(&self.db)
        .await
        .map_err(|e| {
            error!("[HistoryDAO] 写入历史失败: {:?}, version: {:?}", e, version);
            UpdaterError::SaveVersion(e.to_string())
        })?;

        info!(
            "[HistoryDAO] 已记录历史: {} res={}",
            version.setting_id, version.res_version
        );
        Ok(())
    }

    /// 查询某个设置的版本历史（最新在前）
    pub async fn list_by_setting(
        &self,
        setting_id: &str,
        limit: u32,
    ) -> UpdaterResult<Vec<GameVersion>> {
        let rows = sqlx::query(
            r#"
            SELECT setting_id, server_code, app_version, res_version, created_at, updated_at
            FROM histories
            WHERE setting_id = ?
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(setting_id)
        .bind(i64::from(limit))
        .fetch_all(&self.db)
        .await
        .map_err(|e| {
            error!("[HistoryDAO] 查询历史失败: {:?}", e);
            UpdaterError::RetrieveVersion(e.to_string())
        })?;

        rows.iter().map(row_to_version).collect()
    }
}

#[async_trait]
impl HistoryRepository for HistoryDao {
    async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
        super::ping(&self.db).await
    }

    async fn create(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "history_repository.create",
            trace_id = %ctx.trace_id(),
            setting_id = %version.setting_id
        );
        // 写入一旦开始就不响应取消，避免提交后仍向调用方报告取消
        self.append(version).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcrd::db::create_sqlite_pool_with_migration;
    use crate::pcrd::models::{now_millis, ServerCode, Setting};

    #[tokio::test]
    async fn appends_and_lists_newest_first() {
        let db = create_sqlite_pool_with_migration("sqlite::memory:")
            .await
            .unwrap();
        let dao = HistoryDao::new(db);
        let ctx = OpContext::new();
        let setting = Setting {
            id: "s2".to_string(),
            server_code: ServerCode::Jp,
        };

        let mut v = GameVersion::initial(&setting, "4.1.0", now_millis());
        for res in ["10027300", "10027310", "10027320"] {
            v.res_version = res.to_string();
            dao.create(&ctx, &v).await.unwrap();
        }

        let list = dao.list_by_setting("s2", 10).await.unwrap();
        let res: Vec<&str> = list.iter().map(|h| h.res_version.as_str()).collect();
        assert_eq!(res, vec!["10027320", "10027310", "10027300"]);
        assert!(list.iter().all(|h| h.server_code == ServerCode::Jp));

        assert_eq!(dao.list_by_setting("s2", 1).await.unwrap().len(), 1);
        assert!(dao.list_by_setting("other", 10).await.unwrap().is_empty());
    }
}
