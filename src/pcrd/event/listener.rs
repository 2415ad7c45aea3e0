//! 版本事件监听器回调接口

use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::event::types::VersionEvent;
use crate::pcrd::models::{now_millis, GameVersion};
use crate::pcrd::repository::VersionEventRepository;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, Instrument};

/// 版本事件监听器
#[async_trait]
pub trait VersionListener: Send + Sync {
    /// 资源版本发生变更，`key` 为 setting id，`event_json` 为事件 JSON 字符串
    async fn on_version_changed(&self, key: String, event_json: String);
}

/// 默认实现：只写日志
pub struct EmptyVersionListener;

#[async_trait]
impl VersionListener for EmptyVersionListener {
    async fn on_version_changed(&self, key: String, event_json: String) {
        info!("[VersionEvent] 版本变更: key={}, event={}", key, event_json);
    }
}

/// 将版本事件交给进程内监听器
pub struct ListenerVersionEvent {
    listener: Arc<dyn VersionListener>,
}

impl ListenerVersionEvent {
    pub fn new(listener: Arc<dyn VersionListener>) -> Self {
        Self { listener }
    }
}

impl Default for ListenerVersionEvent {
    fn default() -> Self {
        Self::new(Arc::new(EmptyVersionListener))
    }
}

#[async_trait]
impl VersionEventRepository for ListenerVersionEvent {
    async fn publish_version(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "version_event.listener",
            trace_id = %ctx.trace_id(),
            setting_id = %version.setting_id
        );

        async {
            let event = VersionEvent::new(version, now_millis());
            let json = serde_json::to_string(&event).map_err(|e| {
                error!("[VersionEvent] 序列化事件失败: {:?}", e);
                UpdaterError::VersionPublish(e.to_string())
            })?;
            self.listener
                .on_version_changed(event.key().to_string(), json)
                .await;
            Ok::<(), UpdaterError>(())
        }
        .instrument(span)
        .await
    }
}
