//! URL handling module for Catalog-Sweep
//!
//! This module provides the trailing-colon cleanup applied before every fetch,
//! the normalization used as the detail-page dedup key, and pagination URL building.

mod normalize;

pub use normalize::{dedup_key, normalize_url, page_url, strip_trailing_colon};
