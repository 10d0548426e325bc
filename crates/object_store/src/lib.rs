//! Fetches document and asset XML from the object store over HTTP, and
//! enumerates/rewrites the `xlink:href` asset references inside it.
//!
//! This is the one place in the workspace that talks to the network; every
//! other crate either consumes [`FetchAssets`] or is indifferent to how
//! assets are discovered.

pub mod client;
pub mod xml;

use std::time::Duration;

use async_trait::async_trait;
use errors::KernelError;

pub use client::Client;
pub use xml::{
    enumerate_assets,
    rewrite_hrefs,
    AssetRef,
    ParsedXml,
};

/// Seam the `model` crate's `Document` aggregate fetches XML through. The
/// production implementation is [`Client`]; tests substitute an in-memory
/// fake so the retry/backoff/network stack never runs in unit tests.
#[async_trait]
pub trait FetchAssets: Send + Sync {
    async fn fetch_assets(&self, url: &str, timeout: Duration) -> Result<(ParsedXml, Vec<AssetRef>), KernelError>;
}

#[async_trait]
impl FetchAssets for Client {
    async fn fetch_assets(&self, url: &str, timeout: Duration) -> Result<(ParsedXml, Vec<AssetRef>), KernelError> {
        let bytes = self.fetch(url, timeout).await?;
        let text = String::from_utf8(bytes).map_err(|err| KernelError::Terminal(format!("non-utf8 XML: {err}")))?;
        enumerate_assets(text)
    }
}
