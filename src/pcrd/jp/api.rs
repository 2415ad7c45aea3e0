//! 日服 CDN 客户端：按版本号检查资源清单是否存在

use crate::pcrd::error::{UpdaterError, UpdaterResult};
use crate::pcrd::jp::probe::ManifestProbe;
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

/// 日服 CDN 客户端
pub struct PcrdJpApi {
    client: reqwest::Client,
    base_url: String,
    locale: String,
}

impl PcrdJpApi {
    pub fn new(client: reqwest::Client, base_url: String, locale: String) -> Self {
        Self {
            client,
            base_url,
            locale,
        }
    }

    pub fn manifest_url(&self, version: i64) -> String {
        format!(
            "{}/dl/Resources/{}/{}/AssetBundles/Android/manifest/manifest_assetmanifest",
            self.base_url.trim_end_matches('/'),
            version,
            self.locale
        )
    }
}

#[async_trait]
impl ManifestProbe for PcrdJpApi {
    async fn manifest_exists(&self, version: i64) -> UpdaterResult<bool> {
        let url = self.manifest_url(version);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpdaterError::RetrieveData(format!("request failed: {}", e)))?;

        let status = response.status();
        debug!("[JpApi] {} -> {}", url, status);
        Ok(status == StatusCode::OK)
    }
}
