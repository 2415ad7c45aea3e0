//! 版本事件载荷

use crate::pcrd::models::{GameVersion, ServerCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 版本变更事件（以 setting id 作为事件键）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEvent {
    pub id: String,
    pub server_code: ServerCode,
    pub app_version: String,
    pub res_version: String,
    pub updated_at: DateTime<Utc>,
}

impl VersionEvent {
    pub fn new(version: &GameVersion, now: DateTime<Utc>) -> Self {
        Self {
            id: version.setting_id.clone(),
            server_code: version.server_code,
            app_version: version.app_version.clone(),
            res_version: version.res_version.clone(),
            updated_at: now,
        }
    }

    pub fn key(&self) -> &str {
        &self.id
    }
}
