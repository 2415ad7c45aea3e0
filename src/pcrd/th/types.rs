//! 泰服 API DTO（请求参数和响应结构体）

use serde::{Deserialize, Serialize};

/// `check/game_start` 的 campaign 签名（客户端内置常量）
pub const CAMPAIGN_SIGN: &str = "69fc9ddde974cc75a0756abb16b2ef35";

/// `check/game_start` 的 campaign 用户（客户端内置常量）
pub const CAMPAIGN_USER: i64 = 157428;

/// `check/game_start` 请求参数
///
/// 字段顺序即 msgpack map 的键顺序，参与 PARAM 签名，不能调整
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckGameStartParam {
    pub app_type: i64,
    pub campaign_data: String,
    pub campaign_sign: String,
    pub campaign_user: i64,
    pub viewer_id: String,
}

impl CheckGameStartParam {
    pub fn new(viewer_id: i32) -> Self {
        Self {
            app_type: 0,
            campaign_data: String::new(),
            campaign_sign: CAMPAIGN_SIGN.to_string(),
            campaign_user: CAMPAIGN_USER,
            viewer_id: viewer_id.to_string(),
        }
    }
}

/// 响应公共头部块
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThDataHeader {
    #[serde(default)]
    pub result_code: i64,
    #[serde(default)]
    pub required_res_ver: Option<String>,
    #[serde(default)]
    pub short_udid: i64,
    #[serde(default)]
    pub viewer_id: i64,
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub servertime: i64,
}

/// `check/game_start` 响应 data 部分
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckGameStartData {
    #[serde(default)]
    pub now_viewer_id: i64,
    #[serde(default)]
    pub is_set_transition_password: bool,
    #[serde(default)]
    pub now_name: String,
    #[serde(default)]
    pub now_team_level: i64,
    #[serde(default)]
    pub now_tutorial: bool,
    #[serde(default)]
    pub bundle_ver: String,
    #[serde(default)]
    pub resource_fix: bool,
    #[serde(default)]
    pub bundle_fix: bool,
}

/// `check/game_start` 完整响应
#[derive(Debug, Clone, Deserialize)]
pub struct CheckGameStartResp {
    #[serde(default)]
    pub data_headers: ThDataHeader,
    #[serde(default)]
    pub data: Option<CheckGameStartData>,
}

impl CheckGameStartResp {
    /// 非空的资源版本
    pub fn required_res_ver(&self) -> Option<&str> {
        self.data_headers
            .required_res_ver
            .as_deref()
            .filter(|v| !v.is_empty())
    }
}
