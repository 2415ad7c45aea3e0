//! 设置数据访问层（DAO）

use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::models::{Credential, PcrdSetting, Setting};
use crate::pcrd::repository::SettingRepository;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Pool, Row, Sqlite};
use tracing::{debug, error, info, Instrument};

/// 设置 DAO（基于 sqlx）
pub struct SettingDao {
    db: Pool<Sqlite>,
}

impl SettingDao {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// 插入或更新设置（CLI 管理用）
    pub async fn save_setting(&self, setting: &PcrdSetting) -> UpdaterResult<()> {
        let sql = r#"
            INSERT INTO settings (
                id, server_code, udid, short_udid, viewer_id, session_id, guess_start_version
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                server_code = excluded.server_code,
                udid = excluded.udid,
                short_udid = excluded.short_udid,
                viewer_id = excluded.viewer_id,
                session_id = excluded.session_id,
                guess_start_version = excluded.guess_start_version
        "#;

        sqlx::query(sql)
            .bind(&setting.setting.id)
            .bind(setting.setting.server_code.as_str())
            .bind(&setting.credential.udid)
            .bind(setting.credential.short_udid)
            .bind(setting.credential.viewer_id)
            .bind(&setting.credential.session_id)
            .bind(&setting.guess_start_version)
            .execute(&self.db)
            .await
            .map_err(|e| {
                error!("[SettingDAO] 保存设置失败: {:?}", e);
                UpdaterError::SaveSetting(e.to_string())
            })?;

        info!(
            "[SettingDAO] 已保存设置: {} ({})",
            setting.setting.id, setting.setting.server_code
        );
        Ok(())
    }

    fn row_to_setting(row: &SqliteRow) -> UpdaterResult<PcrdSetting> {
        let server_code: String = row.get("server_code");
        Ok(PcrdSetting {
            setting: Setting {
                id: row.get("id"),
                server_code: server_code.parse()?,
            },
            credential: Credential {
                udid: row.get("udid"),
                short_udid: row.get("short_udid"),
                viewer_id: row.get("viewer_id"),
                session_id: row.get("session_id"),
            },
            guess_start_version: row.get("guess_start_version"),
        })
    }

    async fn find_by_id(&self, id: &str) -> UpdaterResult<PcrdSetting> {
        let row = sqlx::query(
            r#"
            SELECT id, server_code, udid, short_udid, viewer_id, session_id, guess_start_version
            FROM settings
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| {
            error!("[SettingDAO] 查询设置失败: {:?}", e);
            UpdaterError::RetrieveSetting(e.to_string())
        })?;

        let Some(row) = row else {
            error!("[SettingDAO] 设置不存在: {}", id);
            return Err(UpdaterError::SettingNotExists(id.to_string()));
        };

        let setting = Self::row_to_setting(&row).map_err(|e| {
            error!("[SettingDAO] 设置数据无效: {}, {}", id, e);
            UpdaterError::RetrieveSetting(e.to_string())
        })?;
        debug!(
            "[SettingDAO] 读取设置: {} ({})",
            setting.setting.id, setting.setting.server_code
        );
        Ok(setting)
    }
}

#[async_trait]
impl SettingRepository for SettingDao {
    async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
        super::ping(&self.db).await
    }

    async fn get_setting_by_id(&self, ctx: &OpContext, id: &str) -> UpdaterResult<PcrdSetting> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "setting_repository.get_setting_by_id",
            trace_id = %ctx.trace_id(),
            id = %id
        );
        ctx.guard(self.find_by_id(id)).instrument(span).await
    }
}
