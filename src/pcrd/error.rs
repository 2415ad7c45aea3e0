//! 错误类型定义
//!
//! 所有协作方（HTTP 客户端、DAO、事件发布）都把底层错误包装成 [`UpdaterError`]
//! 的某一类，编排器再把它和失败阶段一起包装成 [`ResolveError`] 向上返回。

use std::fmt;
use thiserror::Error;

/// 更新器错误分类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdaterError {
    // ---------- 输入校验 ----------
    #[error("app id is required")]
    MissingAppId,

    #[error("invalid request parameter: {0}")]
    InvalidRequestParam(String),

    #[error("cannot parse:[{0}] as servercode")]
    InvalidServerCode(String),

    #[error("cannot parse:[{0}] as platform")]
    InvalidPlatform(String),

    // ---------- 未找到 ----------
    #[error("setting not found: {0}")]
    SettingNotExists(String),

    #[error("application not found: {0}")]
    ApplicationNotFound(String),

    #[error("version not found: {0}")]
    VersionNotFound(String),

    #[error("resource version not available from remote")]
    ResVersionUnavailable,

    // ---------- 读取失败 ----------
    #[error("failed to retrieving setting data: {0}")]
    RetrieveSetting(String),

    #[error("failed to retrieving application data: {0}")]
    RetrieveApplication(String),

    #[error("failed to retrieving version data: {0}")]
    RetrieveVersion(String),

    /// 传输层错误（请求构造、网络、非 2xx、超时）
    #[error("data retrieve failed: {0}")]
    RetrieveData(String),

    /// 序列化 / 反序列化错误
    #[error("data transformation error: {0}")]
    DataTransform(String),

    // ---------- 持久化 ----------
    #[error("failed to save version: {0}")]
    SaveVersion(String),

    #[error("failed to save setting: {0}")]
    SaveSetting(String),

    /// 读取与写入之间版本行被其他调用修改（updated_at 比对失败）
    #[error("version {0} was modified by another run")]
    VersionConflict(String),

    // ---------- 事件 ----------
    #[error("cannot publish version: {0}")]
    VersionPublish(String),

    #[error("operation cancelled")]
    Cancelled,
}

/// 库内统一的结果类型
pub type UpdaterResult<T> = std::result::Result<T, UpdaterError>;

/// 编排器的执行阶段，用于标识失败位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    LoadSetting,
    LoadApplication,
    LoadVersion,
    CreateVersion,
    Discover,
    UpdateVersion,
    WriteHistory,
    Publish,
}

impl fmt::Display for ResolveStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResolveStage::LoadSetting => "load setting",
            ResolveStage::LoadApplication => "load application",
            ResolveStage::LoadVersion => "load version",
            ResolveStage::CreateVersion => "create version",
            ResolveStage::Discover => "discover resource version",
            ResolveStage::UpdateVersion => "update version",
            ResolveStage::WriteHistory => "write history",
            ResolveStage::Publish => "publish version event",
        };
        f.write_str(name)
    }
}

/// 一次解析运行的唯一错误：失败阶段 + 错误分类
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {source}")]
pub struct ResolveError {
    pub stage: ResolveStage,
    #[source]
    pub source: UpdaterError,
}

impl ResolveError {
    pub fn new(stage: ResolveStage, source: UpdaterError) -> Self {
        Self { stage, source }
    }

    pub fn kind(&self) -> &UpdaterError {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_error_names_stage_and_kind() {
        let err = ResolveError::new(
            ResolveStage::LoadSetting,
            UpdaterError::SettingNotExists("s1".to_string()),
        );
        assert_eq!(err.to_string(), "load setting failed: setting not found: s1");
        assert_eq!(err.kind(), &UpdaterError::SettingNotExists("s1".to_string()));
    }
}
