//! 调用上下文
//!
//! 由引擎的调用方创建，显式传入每一次协作方调用：
//! - `trace_id`：一次运行的追踪 ID，写入每条日志
//! - `span`：父 span，各协作方在其下创建子 span
//! - `cancel`：取消令牌，取消后尚未开始的步骤直接返回 [`UpdaterError::Cancelled`]

use crate::pcrd::error::{UpdaterError, UpdaterResult};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct OpContext {
    trace_id: String,
    span: Span,
    cancel: CancellationToken,
}

impl OpContext {
    /// 新建上下文（随机 trace_id，独立的取消令牌）
    pub fn new() -> Self {
        Self::with_cancellation(CancellationToken::new())
    }

    /// 使用调用方提供的取消令牌
    pub fn with_cancellation(cancel: CancellationToken) -> Self {
        let trace_id = Uuid::new_v4().simple().to_string();
        let span = tracing::info_span!("pcrd.run", trace_id = %trace_id);
        Self {
            trace_id,
            span,
            cancel,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 已取消时返回错误，用于步骤之间的检查点
    pub fn check(&self) -> UpdaterResult<()> {
        if self.cancel.is_cancelled() {
            return Err(UpdaterError::Cancelled);
        }
        Ok(())
    }

    /// 运行一个可被取消的 future
    pub async fn guard<F, T>(&self, fut: F) -> UpdaterResult<T>
    where
        F: Future<Output = UpdaterResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UpdaterError::Cancelled),
            res = fut => res,
        }
    }

    /// 可被取消的等待
    pub async fn sleep(&self, duration: std::time::Duration) -> UpdaterResult<()> {
        self.guard(async {
            tokio::time::sleep(duration).await;
            Ok(())
        })
        .await
    }
}

impl Default for OpContext {
    fn default() -> Self {
        Self::new()
    }
}
