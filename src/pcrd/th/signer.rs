//! 泰服请求签名
//!
//! 纯转换，不做任何 I/O：根据凭证、版本、接口名和参数生成请求头与 JSON body。
//!
//! - `PARAM` = SHA1(udid + "/" + function + base64(msgpack(param)) + viewer_id)
//! - `SID`   = MD5(session_id + salt)，session_id 为空时 MD5(viewer_id + udid + salt)

use crate::pcrd::crypto::{make_md5, make_sha1};
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::models::{Credential, PcrdVersion};
use base64::Engine;
use serde::Serialize;
use std::collections::BTreeMap;

/// 获取游戏启动信息（响应头部块带 `required_res_ver`）
pub const GAME_START_FUNCTION: &str = "check/game_start";

/// 模拟设备的固定请求头
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Dalvik/2.1.0 (Linux; Android 5.1.1; SOV32 Build/32.0.D.0.282; wv)",
    ),
    ("X-Unity-Version", "2018.4.22f1"),
    ("Content-Type", "application/x-www-form-urlencoded"),
    ("DEVICE", "2"),
    ("DEVICE-ID", "ad8a8ea1422cf6f46faa846cc2ecd220"),
    ("DEVICE-NAME", "Sony E6528"),
    ("GRAPHICS-DEVICE-NAME", "Mali-T820"),
    (
        "PLATFORM-OS-VERSION",
        "Android OS 5.1 / API-22 (29.1.A.0.101/418366884)",
    ),
    ("CARRIER", "CARRIER"),
    ("PLATFORM", "2"),
    ("LOCALE", "Eng"),
    ("BATTLE-LOGIC-VERSION", "4"),
    ("KEYCHAIN", ""),
    ("BUNDLE-VER", ""),
];

/// 签名后的请求（请求头 + JSON body）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub function: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl SignedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// 泰服请求签名器（持有区域盐值）
#[derive(Debug, Clone)]
pub struct RequestSigner {
    salt: String,
}

impl RequestSigner {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    /// 生成完整的签名请求
    pub fn sign<P: Serialize>(
        &self,
        credential: &Credential,
        version: &PcrdVersion,
        function: &str,
        param: &P,
    ) -> UpdaterResult<SignedRequest> {
        let mut headers: BTreeMap<String, String> = DEFAULT_HEADERS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        headers.insert("APP-VER".to_string(), version.app_version.clone());
        headers.insert("RES-VER".to_string(), version.res_version.clone());
        headers.insert("UDID".to_string(), credential.udid.clone());
        headers.insert(
            "SHORT-UDID".to_string(),
            credential.short_udid.to_string(),
        );
        headers.insert(
            "PARAM".to_string(),
            Self::param_hash(credential, function, param)?,
        );
        headers.insert("SID".to_string(), self.session_key(credential));

        let body = serde_json::to_vec(param).map_err(|e| {
            UpdaterError::DataTransform(format!("error while marshal the request: {}", e))
        })?;

        Ok(SignedRequest {
            function: function.to_string(),
            headers,
            body,
        })
    }

    /// 计算 `PARAM` 签名
    pub fn param_hash<P: Serialize>(
        credential: &Credential,
        function: &str,
        param: &P,
    ) -> UpdaterResult<String> {
        let packed = rmp_serde::to_vec_named(param).map_err(|e| {
            UpdaterError::DataTransform(format!("error while marshal the request: {}", e))
        })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(packed);

        Ok(make_sha1(&format!(
            "{}/{}{}{}",
            credential.udid, function, encoded, credential.viewer_id
        )))
    }

    /// 计算 `SID`
    pub fn session_key(&self, credential: &Credential) -> String {
        if credential.session_id.is_empty() {
            make_md5(&format!(
                "{}{}{}",
                credential.viewer_id, credential.udid, self.salt
            ))
        } else {
            make_md5(&format!("{}{}", credential.session_id, self.salt))
        }
    }
}
