//! 协作方接口
//!
//! 编排器只依赖这些 trait，具体实现（REST、SQLite、Webhook）在外部构造后注入。

use crate::pcrd::context::OpContext;
use crate::pcrd::error::UpdaterResult;
use crate::pcrd::models::{AppInfo, Credential, GameVersion, PcrdSetting, PcrdVersion};
use async_trait::async_trait;

/// 应用信息来源
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()>;

    /// 按 bundle id 查询 Android 应用，未找到返回 `ApplicationNotFound`
    async fn get_android_app_by_id(&self, ctx: &OpContext, app_id: &str) -> UpdaterResult<AppInfo>;
}

/// 设置存储
#[async_trait]
pub trait SettingRepository: Send + Sync {
    async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()>;

    /// 未找到返回 `SettingNotExists`
    async fn get_setting_by_id(&self, ctx: &OpContext, id: &str) -> UpdaterResult<PcrdSetting>;
}

/// 版本存储
#[async_trait]
pub trait VersionRepository: Send + Sync {
    async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()>;

    /// 未找到返回 `VersionNotFound`
    async fn get_by_id(&self, ctx: &OpContext, setting_id: &str) -> UpdaterResult<GameVersion>;

    /// 写入首行，时间戳按传入值保存
    async fn create(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()>;

    /// 更新已有行并返回写入后的行。
    ///
    /// `version.updated_at` 必须是读取时的值：行不存在返回 `VersionNotFound`，
    /// 行已被其他调用修改返回 `VersionConflict`。不会在缺失时插入。
    async fn update(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<GameVersion>;
}

/// 历史存储（只追加）
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()>;

    async fn create(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()>;
}

/// 泰服后端
#[async_trait]
pub trait PcrdThRepository: Send + Sync {
    async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()>;

    async fn get_resource_version(
        &self,
        ctx: &OpContext,
        credential: &Credential,
        version: &PcrdVersion,
    ) -> UpdaterResult<String>;
}

/// 日服后端
#[async_trait]
pub trait PcrdJpRepository: Send + Sync {
    async fn health_check(&self, ctx: &OpContext) -> UpdaterResult<()>;

    async fn get_resource_version(&self, ctx: &OpContext, start_version: &str)
        -> UpdaterResult<String>;
}

/// 版本变更事件
#[async_trait]
pub trait VersionEventRepository: Send + Sync {
    async fn publish_version(&self, ctx: &OpContext, version: &GameVersion) -> UpdaterResult<()>;
}
