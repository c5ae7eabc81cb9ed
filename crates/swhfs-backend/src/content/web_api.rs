//! A [`crate::ContentBackend`] fallback that fetches raw bytes from the
//! archive's HTTP Web API (§4.2), used when no dedicated objstorage is
//! configured.

use async_trait::async_trait;
use swhid::{Kind, Swhid};

use crate::error::BackendError;
use crate::{require_kind, ContentBackend};

/// Content backend querying the Software Heritage Web API's raw-content
/// endpoint.
pub struct WebApiContentBackend {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl WebApiContentBackend {
    pub fn new(base_url: impl Into<String>, auth_token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            auth_token,
        }
    }
}

#[async_trait]
impl ContentBackend for WebApiContentBackend {
    async fn get_blob(&self, cnt: Swhid) -> Result<Vec<u8>, BackendError> {
        require_kind(cnt, Kind::Content)?;
        log::debug!("retrieving blob {cnt} via web API");

        let url = format!(
            "{}/content/sha1_git:{}/raw/",
            self.base_url,
            cnt.hash_hex()
        );
        let mut req = self.client.get(url);
        if let Some(token) = &self.auth_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}
