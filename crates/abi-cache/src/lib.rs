//! Asynchronous result cache for ABI artifact diffs.
//!
//! [`DiffCache`] memoizes [`abi_diff::AbiDiff`] results per
//! [`abi_types::DependencyDescriptor`]. Concurrent requests for the same
//! descriptor share a single computation; finished results are bounded by an
//! LRU policy and expire after an idle period (see [`CacheConfig`]).
//!
//! Previous artifact versions are located through an [`ArtifactHistory`]:
//! [`StaticHistory`] for known paths, [`DirectoryHistory`] for a
//! content-addressed store on disk.

pub mod cache;
pub mod config;
pub mod error;
pub mod history;

pub use cache::{CacheStats, DiffCache};
pub use config::CacheConfig;
pub use error::{CacheError, CacheResult};
pub use history::{ArtifactHistory, DirectoryHistory, StaticHistory, HISTORY_EXTENSION};
