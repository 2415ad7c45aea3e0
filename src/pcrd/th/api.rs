//! 泰服游戏 HTTP API 客户端

use crate::pcrd::context::OpContext;
use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::models::{Credential, PcrdVersion};
use crate::pcrd::repository::PcrdThRepository;
use crate::pcrd::th::signer::{RequestSigner, SignedRequest, GAME_START_FUNCTION};
use crate::pcrd::th::types::{CheckGameStartParam, CheckGameStartResp};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, info, Instrument};

/// 泰服游戏 API 客户端
pub struct PcrdThApi {
    client: reqwest::Client,
    base_url: String,
    signer: RequestSigner,
}

impl PcrdThApi {
    pub fn new(client: reqwest::Client, base_url: String, salt: String) -> Self {
        Self {
            client,
            base_url,
            signer: RequestSigner::new(salt),
        }
    }

    /// 发送签名请求，返回原始响应 body
    async fn call(&self, request: &SignedRequest) -> UpdaterResult<Vec<u8>> {
        let url = format!(
            "{}/{}?format=json",
            self.base_url.trim_end_matches('/'),
            request.function
        );
        debug!("[ThApi] 📡 请求URL: {}", url);

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                UpdaterError::InvalidRequestParam(format!("header {}: {}", name, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                UpdaterError::InvalidRequestParam(format!("header {}: {}", name, e))
            })?;
            headers.insert(name, value);
        }

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| {
                error!("[ThApi] 请求失败: {:?}", e);
                UpdaterError::RetrieveData(format!("request failed: {}", e))
            })?;

        let status = response.status();
        let body_bytes = response.bytes().await.map_err(|e| {
            error!("[ThApi] 读取响应 body 失败: {:?}", e);
            UpdaterError::RetrieveData(format!("response read error: {}", e))
        })?;

        if !status.is_success() {
            error!(
                "[ThApi] 请求失败，HTTP状态: {}, 响应: {}",
                status,
                String::from_utf8_lossy(&body_bytes)
            );
            return Err(UpdaterError::RetrieveData(format!("HTTP 错误 {}", status)));
        }

        Ok(body_bytes.to_vec())
    }

    async fn fetch_resource_version(
        &self,
        credential: &Credential,
        version: &PcrdVersion,
    ) -> UpdaterResult<String> {
        let param = CheckGameStartParam::new(credential.viewer_id);
        let request = self
            .signer
            .sign(credential, version, GAME_START_FUNCTION, &param)
            .inspect_err(|e| error!("[ThApi] 生成签名失败: {}", e))?;

        let body = self.call(&request).await?;

        let resp: CheckGameStartResp = serde_json::from_slice(&body).map_err(|e| {
            error!(
                "[ThApi] 反序列化失败: {:?}\n原始响应: {}",
                e,
                String::from_utf8_lossy(&body)
            );
            UpdaterError::DataTransform(format!("error while unmarshal the response: {}", e))
        })?;

        match resp.required_res_ver() {
            Some(res_ver) => {
                info!("[ThApi] ✅ 远端资源版本: {}", res_ver);
                Ok(res_ver.to_string())
            }
            None => {
                error!(
                    "[ThApi] 响应中没有资源版本，result_code: {}",
                    resp.data_headers.result_code
                );
                Err(UpdaterError::ResVersionUnavailable)
            }
        }
    }
}

#[async_trait]
impl PcrdThRepository for PcrdThApi {
    async fn health_check(&self, _ctx: &OpContext) -> UpdaterResult<()> {
        Ok(())
    }

    async fn get_resource_version(
        &self,
        ctx: &OpContext,
        credential: &Credential,
        version: &PcrdVersion,
    ) -> UpdaterResult<String> {
        let span = tracing::info_span!(
            parent: ctx.span(),
            "pcrd_th.get_resource_version",
            trace_id = %ctx.trace_id(),
            app_version = %version.app_version
        );
        ctx.guard(self.fetch_resource_version(credential, version))
            .instrument(span)
            .await
    }
}
