//! # frsource
//!
//! Source resolution for FeedRoll.
//!
//! This crate decides which locator a playback resource should be opened
//! against: the cached/proxied URL served by an upstream caching proxy, or the
//! original source URL when the proxy is unavailable.
//!
//! ## Overview
//!
//! - [`UpstreamProxy`] — swappable capability for URL translation and
//!   advisory cache warming. A [`NoopProxy`] implementation is provided for
//!   setups running without a proxy.
//! - [`CacheResolver`] — translation cache plus a soft circuit breaker.
//!   After `max_failures` consecutive translation failures the circuit opens
//!   and every resolution degrades to the original URL without contacting the
//!   upstream. One successful translation after a reset closes it again.
//!
//! Resolution is side-effect free from the caller's point of view: it always
//! returns a usable URL and never an error.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use frsource::{CacheResolver, NoopProxy, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let resolver = CacheResolver::new(ResolverConfig::default(), Arc::new(NoopProxy));
//!     let url = resolver.resolved_url("http://example.com/clip.mp4").await;
//!     assert_eq!(url, "http://example.com/clip.mp4");
//! }
//! ```

pub mod proxy;
pub mod resolver;

pub use proxy::{NoopProxy, UpstreamProxy};
pub use resolver::{CacheResolver, ResolverConfig};
