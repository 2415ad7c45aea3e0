//! 应用信息 HTTP API 客户端

use crate::pcrd::application::types::ApplicationListResp;
use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::models::AppInfo;
use crate::pcrd::repository::ApplicationRepository;
use async_trait::async_trait;
use tracing::{debug, error, info, Instrument};

/// 应用信息服务客户端
pub struct ApplicationApi {
    client: reqwest::Client,
    base_url: String,
}

impl ApplicationApi {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn fetch_android_app(&self, app_id: &str) -> UpdaterResult<AppInfo> {
        let url = reqwest::Url::parse_with_params(
            &format!("{}/app", self.base_url.trim_end_matches('/')),
            &[("platform", "android"), ("bundle_id", app_id)],
        )
        .map_err(|e| {
            error!("[AppAPI] 构造请求地址失败: {:?}", e);
            UpdaterError::RetrieveApplication(format!("invalid url: {}", e))
        })?;

        debug!("[AppAPI] 📡 请求应用信息: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            error!("[AppAPI] 请求失败: {:?}", e);
            UpdaterError::RetrieveApplication(format!("execute request failed: {}", e))
        })?;

        let status = response.status();
        let body_bytes = response.bytes().await.map_err(|e| {
            error!("[AppAPI] 读取响应 body 失败: {:?}", e);
            UpdaterError::RetrieveApplication(format!("io read failed: {}", e))
        })?;

        if !status.is_success() {
            let body_str = String::from_utf8_lossy(&body_bytes);
            error!(
                "[AppAPI] 应用信息请求失败，HTTP状态: {}, 响应: {}",
                status, body_str
            );
            return Err(UpdaterError::RetrieveApplication(format!(
                "HTTP 错误 {}",
                status
            )));
        }

        let resp: ApplicationListResp = serde_json::from_slice(&body_bytes).map_err(|e| {
            error!(
                "[AppAPI] 反序列化失败: {:?}\n原始响应: {}",
                e,
                String::from_utf8_lossy(&body_bytes)
            );
            UpdaterError::RetrieveApplication(format!("unmarshal failed: {}", e))
        })?;

        let apps = resp.into_app_infos().map_err(|e| {
            error!("[AppAPI] 转换应用信息失败: {}", e);
            UpdaterError::RetrieveApplication(e.to_string())
        })?;

        match apps.into_iter().next() {
            Some(app) => {
                info!(
                    "[AppAPI] ✅ 应用 {} 当前版本: {}",
                    app_id, app.version
                );
                Ok(app)
            }
            None => {
                error!("[AppAPI] 应用不存在: {}", app_id);
                Err(UpdaterError::ApplicationNotFound(app_id.to_string()))
            }
        }
    }
}

#[async_trait]
impl ApplicationRepository for ApplicationApi {
    async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
        Ok(())
    }

    async fn get_android_app_by_id(&self, ctx: &OpContext, app_id: &str) -> UpdaterResult<AppInfo> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "application.get_android_app_by_id",
            trace_id = %ctx.trace_id(),
            app_id = %app_id
        );

        if app_id.is_empty() {
            span.in_scope(|| error!("[AppAPI] 缺少 app id"));
            return Err(UpdaterError::MissingAppId);
        }

        ctx.guard(self.fetch_android_app(app_id))
            .instrument(span)
            .await
    }
}
