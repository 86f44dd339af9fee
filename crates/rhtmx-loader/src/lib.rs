//! # RHTMX Loader - data loading for client-side navigation
//!
//! This crate turns declarative load plans into concrete data for the
//! RHTMX client router.
//!
//! ## Features
//!
//! - **Load Plans**: Map logical names to resource specs (request + parser + caching hints)
//! - **Caching Strategies**: stale-while-revalidate, cache-first, network-first, no-store
//! - **Deduplication**: Concurrent loads of the same request share one fetch
//! - **Change Detection**: Background refreshes only notify when the data actually changed
//! - **Invalidation**: Drop entries by canonical key or by tag
//!
//! ## Example
//!
//! ```rust
//! use rhtmx_loader::{fetch_fn, CacheConfig, LoadPlan, ResourceCache, ResourceSpec, Response};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let fetcher = fetch_fn(|_request| async { Ok(Response::json(&serde_json::json!({"id": 1}))) });
//!     let config = CacheConfig {
//!         base_url: Some("https://example.com".to_string()),
//!         ..CacheConfig::default()
//!     };
//!     let cache = ResourceCache::new(config, Arc::new(fetcher)).unwrap();
//!
//!     let plan = LoadPlan::new().with("user", ResourceSpec::get("/api/users/1").tag("users"));
//!     let data = cache.load_plan(&plan, None).await.unwrap();
//!     assert_eq!(data["user"]["id"], 1);
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod plan;
pub mod request;

pub use cache::{CacheEntry, CacheStats};
pub use config::{CacheConfig, CacheTomlConfig};
pub use engine::{ResourceCache, Revalidation, RevalidateSink};
pub use error::LoadError;
pub use fetch::{fetch_fn, Fetch, FnFetch};
pub use plan::{CacheHints, CacheStrategy, LoadPlan, ResourceSpec, ResponseParser};
pub use request::{CacheKey, Request, Response};

/// Boxed, sendable future used at every async seam of the loader
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
