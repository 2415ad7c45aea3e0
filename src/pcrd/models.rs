//! 领域模型定义

use crate::pcrd::error::UpdaterError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 服务器区域（决定使用哪种协议获取资源版本）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerCode {
    /// 泰服：签名请求协议
    Th,
    /// 日服：探测协议
    Jp,
}

impl ServerCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerCode::Th => "th",
            ServerCode::Jp => "jp",
        }
    }
}

impl fmt::Display for ServerCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerCode {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "th" => Ok(ServerCode::Th),
            "jp" => Ok(ServerCode::Jp),
            other => Err(UpdaterError::InvalidServerCode(other.to_string())),
        }
    }
}

/// 应用发布平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    #[default]
    None,
    Android,
    Ios,
}

impl FromStr for Platform {
    type Err = UpdaterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(Platform::None),
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            other => Err(UpdaterError::InvalidPlatform(other.to_string())),
        }
    }
}

/// 游戏配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Setting {
    pub id: String,
    pub server_code: ServerCode,
}

/// 泰服账号凭证
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Credential {
    pub udid: String,
    pub short_udid: i32,
    pub viewer_id: i32,
    /// 服务器下发的会话 ID，为空时用账号身份派生 SID
    pub session_id: String,
}

/// 设置存储中的一行：配置 + 凭证 + 日服探测起点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcrdSetting {
    pub setting: Setting,
    pub credential: Credential,
    pub guess_start_version: String,
}

/// 应用商店中当前发布的应用信息
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppInfo {
    pub app_id: String,
    pub bundle_id: String,
    pub name: String,
    pub version: String,
    pub author: String,
    pub icon: String,
    pub platform: Platform,
}

/// 随泰服请求发送的版本信息（不持久化）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PcrdVersion {
    pub app_version: String,
    pub res_version: String,
}

/// 持久化的游戏版本（每个 setting id 一行）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameVersion {
    pub setting_id: String,
    pub server_code: ServerCode,
    pub app_version: String,
    pub res_version: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GameVersion {
    /// 首次解析时的初始版本：资源版本为空
    pub fn initial(setting: &Setting, app_version: &str, now: DateTime<Utc>) -> Self {
        Self {
            setting_id: setting.id.clone(),
            server_code: setting.server_code,
            app_version: app_version.to_string(),
            res_version: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// 毫秒时间戳 -> UTC 时间（越界时回退到 UNIX 纪元）
pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// 当前时间，截断到毫秒（与存储精度一致）
pub(crate) fn now_millis() -> DateTime<Utc> {
    millis_to_datetime(Utc::now().timestamp_millis())
}
