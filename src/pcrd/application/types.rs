//! 应用信息服务 DTO

use crate::pcrd::error::UpdaterResult;
use crate::pcrd::models::AppInfo;
use serde::{Deserialize, Deserializer};

/// `GET /app` 响应
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationListResp {
    #[serde(default)]
    pub results: Vec<ApplicationItem>,
    #[serde(default)]
    pub total: i64,
}

/// 缺失或 `null` 的字符串字段按空串处理
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationItem {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub app_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bundle_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub author: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub icon: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub platform: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub update_datetime: String,
}

impl ApplicationItem {
    pub fn into_app_info(self) -> UpdaterResult<AppInfo> {
        Ok(AppInfo {
            platform: self.platform.parse()?,
            app_id: self.app_id,
            bundle_id: self.bundle_id,
            name: self.name,
            version: self.version,
            author: self.author,
            icon: self.icon,
        })
    }
}

impl ApplicationListResp {
    pub fn into_app_infos(self) -> UpdaterResult<Vec<AppInfo>> {
        self.results
            .into_iter()
            .map(ApplicationItem::into_app_info)
            .collect()
    }
}
