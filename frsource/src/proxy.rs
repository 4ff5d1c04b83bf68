//! Upstream proxy capability consumed by the resolver.

use anyhow::Result;
use async_trait::async_trait;

/// Capability offered by an upstream caching/proxy server.
///
/// Implementations translate an original media URL into a locator served by
/// the proxy (typically a local streaming endpoint) and optionally warm the
/// proxy cache ahead of playback. Both operations may fail; the resolver
/// absorbs those failures and degrades to the original URL.
#[async_trait]
pub trait UpstreamProxy: Send + Sync {
    /// Translate an original URL into its proxied equivalent.
    async fn translate(&self, url: &str) -> Result<String>;

    /// Ask the proxy to start caching `url` ahead of playback.
    ///
    /// Advisory only. The default implementation does nothing.
    async fn precache(&self, url: &str) -> Result<()> {
        let _ = url;
        Ok(())
    }
}

/// Proxy implementation for setups running without a caching server.
///
/// Translation is the identity and warming is a no-op, so the resolver keeps
/// returning original URLs with a permanently healthy circuit.
pub struct NoopProxy;

#[async_trait]
impl UpstreamProxy for NoopProxy {
    async fn translate(&self, url: &str) -> Result<String> {
        Ok(url.to_string())
    }
}
