//! Core domain entities.
//!
//! # Entity Types
//!
//! - [`Link`] - A short code → destination mapping with a hard expiry
//! - [`ClickEvent`] - One successful resolution, staged for analytics
//! - [`ClickStats`] - Per-dimension click counts for a link
//! - [`LimitPolicy`] / [`RateDecision`] - Fixed-window quota inputs and outputs
//!
//! Creation and partial updates use separate structs (`NewLink`, `LinkPatch`).

pub mod click;
pub mod link;
pub mod quota;

pub use click::{ClickEvent, ClickStats, DIRECT_REFERRER, DimensionCounts, TOTAL_KEY};
pub use link::{Link, LinkPatch, NewLink};
pub use quota::{LimitPolicy, RateDecision};
