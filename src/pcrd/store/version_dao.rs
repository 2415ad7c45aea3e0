//! 版本数据访问层（DAO）
//!
//! 更新使用 `updated_at` 做乐观锁：只有读取之后没有被修改过的行才会被更新。

use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::models::{millis_to_datetime, now_millis, GameVersion};
use crate::pcrd::repository::VersionRepository;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};
use tracing::{debug, error, info, warn, Instrument};

/// 版本 DAO（基于 sqlx）
pub struct VersionDao {
    db: Pool<Sqlite>,
}

/// 将查询行转换为版本（history_dao 共用）
pub(crate) fn row_to_version(row: &SqliteRow) -> UpdaterResult<GameVersion> {
    let server_code: String = row.get("server_code");
    Ok(GameVersion {
        setting_id: row.get("setting_id"),
        server_code: server_code.parse()?,
        app_version: row.get("app_version"),
        res_version: row.get("res_version"),
        created_at: millis_to_datetime(row.get("created_at")),
        updated_at: millis_to_datetime(row.get("updated_at")),
    })
}

impl VersionDao {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    async fn find_by_id(&self, setting_id: &str) -> UpdaterResult<GameVersion> {
        if setting_id.is_empty() {
            error!("[VersionDAO] 缺少 setting id");
            return Err(UpdaterError::MissingAppId);
        }

        let row = sqlx::query(
            r#"
            SELECT setting_id, server_code, app_version, res_version, created_at, updated_at
            FROM versions
            WHERE setting_id = ?
            "#,
        )
        .bind(setting_id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!("[VersionDAO] 查询版本失败: {:?}", e);
            UpdaterError::RetrieveVersion(e.to_string())
        })?;

        let Some(row) = row else {
            debug!("[VersionDAO] 版本不存在: {}", setting_id);
            return Err(UpdaterError::VersionNotFound(setting_id.to_string()));
        };

        row_to_version(&row).map_err(|e| {
            error!("[VersionDAO] 版本数据无效: {}, {}", setting_id, e);
            UpdaterError::RetrieveVersion(e.to_string())
        })
    }

    async fn insert(&self, version: &GameVersion) -> UpdaterResult<()> {
        sqlx::query(
            r#"
            INSERT INTO versions (
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
            error!("[VersionDAO] 创建版本失败: {:?}, version: {:?}", e, version);
            UpdaterError::SaveVersion(e.to_string())
        })?;

        info!(
            "[VersionDAO] 已创建版本: {} app={} res={:?}",
            version.setting_id, version.app_version, version.res_version
        );
        Ok(())
    }

    async fn compare_and_update(&self, version: &GameVersion) -> UpdaterResult<GameVersion> {
        let expected = version.updated_at.timestamp_millis();
        // 同一毫秒内的连续更新也要让 updated_at 前进，否则乐观锁无法区分
        let updated_at = now_millis().timestamp_millis().max(expected + 1);

        let result = sqlx::query(
            r#"
            UPDATE versions
            SET app_version = ?, res_version = ?, updated_at = ?
            WHERE setting_id = ? AND updated_at = ?
            "#,
        )
        .bind(&version.app_version)
        .bind(&version.res_version)
        .bind(updated_at)
        .bind(&version.setting_id)
        .bind(expected)
        .execute(&self.db)
        .await
        .map_err(|e| {
            error!("[VersionDAO] 更新版本失败: {:?}, version: {:?}", e, version);
            UpdaterError::SaveVersion(e.to_string())
        })?;

        if result.rows_affected() == 0 {
            // 区分"行已消失"和"行被并发修改"
            return match self.find_by_id(&version.setting_id).await {
                Err(UpdaterError::VersionNotFound(id)) => {
                    error!("[VersionDAO] 无法更新，版本不存在: {}", id);
                    Err(UpdaterError::VersionNotFound(id))
                }
                Ok(_) => {
                    warn!("[VersionDAO] 版本在读取后被修改: {}", version.setting_id);
                    Err(UpdaterError::VersionConflict(version.setting_id.clone()))
                }
                Err(e) => Err(e),
            };
        }

        info!(
            "[VersionDAO] 已更新版本: {} app={} res={}",
            version.setting_id, version.app_version, version.res_version
        );

        Ok(GameVersion {
            updated_at: millis_to_datetime(updated_at),
            ..version.clone()
        })
    }
}

#[async_trait]
impl VersionRepository for VersionDao {
    async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
        super::ping(&self.db).await
    }

    async fn get_by_id(&self, ctx: &OpContext, setting_id: &str) -> UpdaterResult<GameVersion> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "version_repository.get_by_id",
            trace_id = %ctx.trace_id(),
            setting_id = %setting_id
        );
        ctx.guard(self.find_by_id(setting_id)).instrument(span).await
    }

    async fn create(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "version_repository.create",
            trace_id = %ctx.trace_id(),
            setting_id = %version.setting_id
        );
        // 写入不响应取消，见 update
        self.insert(version).instrument(span).await
    }

    async fn update(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<GameVersion> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "version_repository.update",
            trace_id = %ctx.trace_id(),
            setting_id = %version.setting_id
        );
        // 中途丢弃 future 时语句可能已提交，所以写入不接受取消
        self.compare_and_update(version).instrument(span).await
    }
}
