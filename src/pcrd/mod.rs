pub mod application;
pub mod config;
pub mod context;
pub mod crypto;
pub mod db;
pub mod error;
pub mod event;
pub mod jp;
pub mod models;
pub mod repository;
pub mod service;
pub mod store;
pub mod th;

// 重新导出协作方接口
pub use repository::{
    ApplicationRepository, HistoryRepository, PcrdJpRepository, PcrdThRepository,
    SettingRepository, VersionEventRepository, VersionRepository,
};

// 重新导出编排器
pub use service::{ResolveOutcome, ResourceVersionUpdater};
