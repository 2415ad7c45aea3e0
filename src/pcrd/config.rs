//! 更新器配置

use std::time::Duration;

/// 日服探测参数
///
/// 默认值：步长 10、尝试 19 次、每次间隔 1 秒。步长和次数决定了能发现的最远版本
/// (`start + stride * attempts`)，间隔用于限制对 CDN 的请求频率。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub stride: i64,
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            stride: 10,
            attempts: 19,
            delay: Duration::from_secs(1),
        }
    }
}

/// 更新器配置（由二进制从命令行 / 环境变量组装）
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// SQLite 数据库 URL，例如 `sqlite://pcrd-version.db?mode=rwc`
    pub database_url: String,
    /// 应用信息服务基础 URL
    pub application_base_url: String,
    /// 日服 CDN 地址
    pub jp_endpoint: String,
    /// 日服资源语言目录
    pub jp_locale: String,
    /// 泰服游戏 API 地址
    pub th_endpoint: String,
    /// 泰服 SID 盐值
    pub th_salt: String,
    /// 单次 HTTP 请求超时
    pub http_timeout: Duration,
    pub probe: ProbeConfig,
    /// 版本事件 Webhook，未设置时只写日志
    pub event_webhook: Option<String>,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://pcrd-version.db?mode=rwc".to_string(),
            application_base_url: String::new(),
            jp_endpoint: "http://prd-priconne-redive.akamaized.net".to_string(),
            jp_locale: "Jpn".to_string(),
            th_endpoint: "https://pcc-game.i3play.com".to_string(),
            th_salt: String::new(),
            http_timeout: Duration::from_secs(10),
            probe: ProbeConfig::default(),
            event_webhook: None,
        }
    }
}

impl UpdaterConfig {
    /// 创建所有 HTTP 适配器共用的客户端（带超时，关闭压缩）
    pub fn http_client(&self) -> anyhow::Result<reqwest::Client> {
        use anyhow::Context;

        reqwest::ClientBuilder::new()
            .timeout(self.http_timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .context("创建 HTTP 客户端失败")
    }
}
