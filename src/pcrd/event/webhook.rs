//! Webhook 版本事件发布

use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::event::types::VersionEvent;
use crate::pcrd::models::{now_millis, GameVersion};
use crate::pcrd::repository::VersionEventRepository;
use async_trait::async_trait;
use tracing::{debug, error, info, Instrument};

/// 事件键所在的请求头
pub const EVENT_KEY_HEADER: &str = "X-Event-Key";

/// 以 JSON POST 发布版本事件
pub struct WebhookVersionEvent {
    client: reqwest::Client,
    url: String,
}

impl WebhookVersionEvent {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    async fn post(&self, event: &VersionEvent) -> UpdaterResult<()> {
        debug!("[Webhook] 📡 发布事件: {} -> {}", event.key(), self.url);

        let response = self
            .client
            .post(&self.url)
            .header(EVENT_KEY_HEADER, event.key())
            .json(event)
            .send()
            .await
            .map_err(|e| {
                error!("[Webhook] 请求失败: {:?}", e);
                UpdaterError::VersionPublish(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[Webhook] 发布失败，HTTP状态: {}, 响应: {}", status, body);
            return Err(UpdaterError::VersionPublish(format!("HTTP 错误 {}", status)));
        }

        info!("[Webhook] ✅ 事件已发布: {} res={}", event.key(), event.res_version);
        Ok(())
    }
}

#[async_trait]
impl VersionEventRepository for WebhookVersionEvent {
    async fn publish_version(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "version_event.webhook",
            trace_id = %ctx.trace_id(),
            setting_id = %version.setting_id
        );
        let event = VersionEvent::new(version, now_millis());
        self.post(&event).instrument(span).await
    }
}
