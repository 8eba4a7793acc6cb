//! Texture resources, loading and residency.
//!
//! - `resource`: per-image state (path, logical size, backend bands)
//! - `store`: arena addressed by generational handles
//! - `sidecar` / `list`: on-disk metadata written by the asset converter
//! - `cache`: eager/lazy loading, band splitting and eviction

mod cache;
pub mod list;
mod resource;
pub mod sidecar;
mod store;

pub use cache::{RecentlyDrawn, TextureCache, UsagePolicy};
pub use list::{ListEntry, LoadList};
pub use resource::{TextureResource, MAX_BANDS};
pub use store::{TextureHandle, TextureStore};
