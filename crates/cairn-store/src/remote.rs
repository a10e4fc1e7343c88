//! # RemoteStore — HTTP Block Exchange
//!
//! Blocking client for a Cairn block server (or any server speaking the
//! same two-endpoint protocol).
//!
//! | Method | Path | Outcome |
//! |--------|------|---------|
//! | GET  | `{download_base}/{urlencoded name}` | 200 `application/octet-stream` ⇒ bytes, 410 ⇒ `NoSuchBlock`, else `Network` |
//! | POST | `{upload_url}` | multipart `AUTHENTICATOR`, `DIGEST_ALGORITHM`, `EXPECTED_NAME`, `FILE_CONTENTS`; the first body line must echo the name |
//!
//! There is no retry. Backoff is the caller's policy.
//!
//! The client is `reqwest::blocking`, so a `RemoteStore` must be created,
//! used and dropped outside an async runtime context (use
//! `spawn_blocking` from async code).

use std::time::Duration;

use cairn_core::{CairnError, Fingerprint, RemoteConfig, Result, Secret};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;

use crate::bytes::BlockBytes;
use crate::store::Backend;

/// Content type of block bodies in both directions.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Multipart field names of the upload form.
pub mod fields {
    /// Shared secret proving the uploader may write.
    pub const AUTHENTICATOR: &str = "AUTHENTICATOR";
    /// Digest algorithm of the expected name, informational.
    pub const DIGEST_ALGORITHM: &str = "DIGEST_ALGORITHM";
    /// The name the server must store the bytes under.
    pub const EXPECTED_NAME: &str = "EXPECTED_NAME";
    /// The raw block bytes.
    pub const FILE_CONTENTS: &str = "FILE_CONTENTS";
}

/// Backing medium reached over HTTP.
pub struct RemoteStore {
    http: Client,
    download_base: String,
    upload_url: String,
    authenticator: Secret,
}

impl RemoteStore {
    /// Build a client from `config`. Fails with `Config` if the HTTP client
    /// cannot be constructed.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CairnError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            download_base: config.download_base.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.clone(),
            authenticator: config.authenticator.clone(),
        })
    }

    /// URL a block named `name` is downloaded from.
    pub fn download_url(&self, name: &str) -> String {
        let encoded: String = url::form_urlencoded::byte_serialize(name.as_bytes()).collect();
        format!("{}/{encoded}", self.download_base)
    }
}

fn network(endpoint: &str, reason: impl std::fmt::Display) -> CairnError {
    CairnError::Network {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    }
}

impl Backend for RemoteStore {
    fn put(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let endpoint = format!("POST {}", self.upload_url);

        let contents = Part::bytes(bytes.to_vec())
            .file_name(name.to_string())
            .mime_str(OCTET_STREAM)
            .map_err(|e| network(&endpoint, e))?;
        let mut form = Form::new().text(fields::AUTHENTICATOR, self.authenticator.expose().to_string());
        if let Ok(fingerprint) = Fingerprint::decode(name) {
            form = form.text(fields::DIGEST_ALGORITHM, fingerprint.algorithm().as_str());
        }
        let form = form
            .text(fields::EXPECTED_NAME, name.to_string())
            .part(fields::FILE_CONTENTS, contents);

        let resp = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .map_err(|e| network(&endpoint, e))?;
        let status = resp.status();
        let body = resp.text().map_err(|e| network(&endpoint, e))?;
        if !status.is_success() {
            return Err(network(
                &endpoint,
                format!("server returned {}: {}", status.as_u16(), body.trim()),
            ));
        }

        let echoed = body.lines().next().unwrap_or_default().trim();
        if echoed != name {
            return Err(network(
                &endpoint,
                format!("server stored '{echoed}' instead of '{name}'"),
            ));
        }
        tracing::debug!(name, len = bytes.len(), "uploaded block");
        Ok(())
    }

    fn get(&self, name: &str) -> Result<BlockBytes> {
        let url = self.download_url(name);
        let endpoint = format!("GET {url}");

        let resp = self
            .http
            .get(&url)
            .send()
            .map_err(|e| network(&endpoint, e))?;
        match resp.status() {
            StatusCode::OK => {}
            StatusCode::GONE => return Err(CairnError::no_such_block(name)),
            status => {
                return Err(network(
                    &endpoint,
                    format!("server returned {}", status.as_u16()),
                ))
            }
        }

        let essence = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        if !essence.eq_ignore_ascii_case(OCTET_STREAM) {
            let shown = if essence.is_empty() { "none" } else { essence };
            return Err(network(
                &endpoint,
                format!("unexpected content type '{shown}'"),
            ));
        }

        let bytes = resp.bytes().map_err(|e| network(&endpoint, e))?;
        Ok(BlockBytes::from(bytes.to_vec()))
    }

    fn kind(&self) -> &'static str {
        "remote"
    }
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("download_base", &self.download_base)
            .field("upload_url", &self.upload_url)
            .field("authenticator", &self.authenticator)
            .finish()
    }
}
