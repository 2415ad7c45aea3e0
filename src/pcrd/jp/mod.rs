//! 日服模块
//!
//! 日服没有"当前版本"接口，只能逐个探测资源清单是否存在

pub mod api;
pub mod probe;

pub use api::PcrdJpApi;
pub use probe::{ManifestProbe, VersionProbe};
