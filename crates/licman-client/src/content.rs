//! # Content Store
//!
//! Documents are stored by content address: the store computes the address
//! from the bytes, so the same document always yields the same address and
//! an address can never point at different bytes later.
//!
//! [`IpfsContentStore`] uploads through the IPFS HTTP API
//! (`/api/v0/add`, pinned) and serves retrievals and display links from the
//! gateway (`/ipfs/<cid>`).

use std::future::Future;
use std::time::Duration;

use licman_core::ContentAddress;
use serde::Deserialize;

use crate::config::ContentStoreConfig;
use crate::error::ContentStoreError;

/// A document selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Original file name. Informational only; the address ignores it.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }
}

/// A content-addressed document store.
pub trait ContentStore: Send + Sync {
    /// Store the document and return its content address.
    fn put(
        &self,
        document: &Document,
    ) -> impl Future<Output = Result<ContentAddress, ContentStoreError>> + Send;

    /// Retrieve the bytes stored at `address`.
    fn get(
        &self,
        address: &ContentAddress,
    ) -> impl Future<Output = Result<Vec<u8>, ContentStoreError>> + Send;

    /// A URL at which a browser can open the document, or `None` if the
    /// reference has no safe gateway form.
    fn link(&self, address: &ContentAddress) -> Option<String>;
}

/// Response body of `/api/v0/add`.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size", default)]
    size: Option<String>,
}

/// IPFS-backed content store.
#[derive(Debug, Clone)]
pub struct IpfsContentStore {
    http: reqwest::Client,
    config: ContentStoreConfig,
}

impl IpfsContentStore {
    pub fn new(config: ContentStoreConfig) -> Result<Self, ContentStoreError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ContentStoreError::Http {
                endpoint: "client_init".to_string(),
                source: e,
            })?;
        Ok(Self { http, config })
    }

    fn api_endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{path}", self.config.api_url.as_str().trim_end_matches('/'))
    }

    fn gateway_url(&self, address: &ContentAddress) -> Option<String> {
        gateway_link(self.config.gateway_url.as_str(), address)
    }
}

impl ContentStore for IpfsContentStore {
    async fn put(&self, document: &Document) -> Result<ContentAddress, ContentStoreError> {
        let endpoint = self.api_endpoint("add");
        let part = reqwest::multipart::Part::bytes(document.bytes.clone())
            .file_name(document.file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(&endpoint)
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await
            .map_err(|e| ContentStoreError::Http {
                endpoint: endpoint.clone(),
                source: e,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ContentStoreError::Api {
                endpoint,
                status: status.as_u16(),
                body,
            });
        }

        let added: AddResponse =
            resp.json()
                .await
                .map_err(|e| ContentStoreError::MalformedResponse {
                    endpoint: endpoint.clone(),
                    reason: e.to_string(),
                })?;
        let address = ContentAddress::new(added.hash).map_err(|e| {
            ContentStoreError::MalformedResponse {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        tracing::info!(
            cid = %address,
            file = %document.file_name,
            size = added.size.as_deref().unwrap_or("?"),
            "document uploaded"
        );
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> Result<Vec<u8>, ContentStoreError> {
        let url = self
            .gateway_url(address)
            .ok_or_else(|| ContentStoreError::Unaddressable(address.to_string()))?;
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ContentStoreError::Http {
                endpoint: url.clone(),
                source: e,
            })?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ContentStoreError::NotFound(address.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ContentStoreError::Api {
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await.map_err(|e| ContentStoreError::Http {
            endpoint: url.clone(),
            source: e,
        })?;
        Ok(bytes.to_vec())
    }

    fn link(&self, address: &ContentAddress) -> Option<String> {
        self.gateway_url(address)
    }
}

/// `{gateway}/ipfs/{path}` for references with a safe gateway path.
pub(crate) fn gateway_link(gateway: &str, address: &ContentAddress) -> Option<String> {
    let path = address.gateway_path()?;
    Some(format!("{}/ipfs/{path}", gateway.trim_end_matches('/')))
}
