pub mod pcrd;

// 重新导出常用类型和函数，方便外部使用
pub use pcrd::{
    config::{ProbeConfig, UpdaterConfig},
    context::OpContext,
    error::{ResolveError, ResolveStage, UpdaterError, UpdaterResult},
    models::{AppInfo, Credential, GameVersion, PcrdSetting, PcrdVersion, ServerCode, Setting},
    service::{ResolveOutcome, ResourceVersionUpdater},
};
