//! Data model for the Viewfinder progressive image loader.
//!
//! This crate holds the pure, I/O-free types shared between the loader
//! engine and its callers: the quality [`Tier`] ladder, the [`ResourceUrl`]
//! value type used as the unit of caching, the externally supplied
//! [`ImageManifest`], and the [`TierLadder`] that resolves a manifest into
//! concrete fetch candidates with format fallback.

pub mod identifier;
pub mod ladder;
pub mod manifest;
pub mod tier;

pub use identifier::ResourceUrl;
pub use ladder::TierLadder;
pub use manifest::ImageManifest;
pub use tier::{Tier, WidthDescriptor};
