//! Arbiter policy decision point
//!
//! Ties the policy evaluation core to its runtime surroundings: the PDP
//! engine, decision caches, decision result filters, the extension registry
//! and TOML configuration.
//!
//! # Architecture
//!
//! A [`Pdp`] owns one root policy (any [`arbiter_policy::Decidable`]), an
//! optional [`DecisionCache`] and a [`DecisionResultFilter`]. A batch of
//! individual requests is looked up in the cache, the misses are evaluated
//! against the root policy, new results are written back best-effort, and
//! everything flows through the filter's collector.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod registry;

pub use cache::{DecisionCache, DecisionCacheFactory};
pub use config::{DecisionCacheConfig, PdpConfig, ResultFilterConfig};
pub use engine::Pdp;
pub use error::{CacheError, CacheResult, PdpError, PdpResult};
pub use filter::{DecisionResultFilter, ResultCollector};
pub use registry::ExtensionRegistry;
