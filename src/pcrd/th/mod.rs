//! 泰服模块
//!
//! 通过签名请求调用 `check/game_start`，从响应头部块中读取 `required_res_ver`

pub mod api;
pub mod signer;
pub mod types;

pub use api::PcrdThApi;
pub use signer::{RequestSigner, SignedRequest, GAME_START_FUNCTION};
pub use types::{CheckGameStartData, CheckGameStartParam, CheckGameStartResp, ThDataHeader};
