//! 日服资源版本探测
//!
//! 从已知版本 `start` 开始，依次探测 `start + stride * i`（i = 1..=attempts），
//! 取最后一个存在的候选版本；全部不存在时原样返回 `start`。
//! 单个候选的传输错误只记录日志，不中断探测。

use crate::pcrd::config::ProbeConfig;
use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::repository::PcrdJpRepository;
use async_trait::async_trait;
use tracing::{debug, error, info, warn, Instrument};

/// 单个版本是否存在的检查
#[async_trait]
pub trait ManifestProbe: Send + Sync {
    async fn manifest_exists(&self, version: i64) -> UpdaterResult<bool>;
}

/// 日服版本探测策略
pub struct VersionProbe<P> {
    probe: P,
    config: ProbeConfig,
}

impl<P: ManifestProbe> VersionProbe<P> {
    /// `config.stride` 小于 1 时按 1 处理，保证结果不低于起点
    pub fn new(probe: P, mut config: ProbeConfig) -> Self {
        config.stride = config.stride.max(1);
        Self { probe, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    async fn search(&self, ctx: &OpContext, start_version: &str) -> UpdaterResult<String> {
        let start: i64 = start_version.parse().map_err(|e| {
            error!("[JpProbe] 起始版本无效: {:?}, startVersion: {}", e, start_version);
            UpdaterError::RetrieveData(format!("invalid start version {}: {}", start_version, e))
        })?;

        let mut accepted: Option<i64> = None;
        for i in 1..=self.config.attempts {
            ctx.check()?;

            let Some(candidate) = self
                .config
                .stride
                .checked_mul(i64::from(i))
                .and_then(|step| start.checked_add(step))
            else {
                warn!("[JpProbe] 候选版本溢出，停止探测: start={}, i={}", start, i);
                break;
            };

            debug!("[JpProbe] 探测版本: {}", candidate);
            match ctx.guard(self.probe.manifest_exists(candidate)).await {
                Ok(true) => {
                    debug!("[JpProbe] 版本存在: {}", candidate);
                    accepted = Some(candidate);
                }
                Ok(false) => {}
                Err(UpdaterError::Cancelled) => return Err(UpdaterError::Cancelled),
                Err(e) => {
                    warn!(
                        "[JpProbe] 探测失败，按不存在处理: version={}, error={}",
                        candidate, e
                    );
                }
            }

            if i < self.config.attempts {
                ctx.sleep(self.config.delay).await?;
            }
        }

        match accepted {
            Some(version) => {
                info!("[JpProbe] ✅ 探测到新版本: {} -> {}", start_version, version);
                Ok(version.to_string())
            }
            None => {
                info!("[JpProbe] 未发现更新的版本，保持 {}", start_version);
                Ok(start_version.to_string())
            }
        }
    }
}

#[async_trait]
impl<P: ManifestProbe> PcrdJpRepository for VersionProbe<P> {
    async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
        Ok(())
    }

    async fn get_resource_version(
        &self,
        ctx: &OpContext,
        start_version: &str,
    ) -> UpdaterResult<String> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "pcrd_jp.get_resource_version",
            trace_id = %ctx.trace_id(),
            start_version = %start_version
        );
        self.search(ctx, start_version).instrument(span).await
    }
}
