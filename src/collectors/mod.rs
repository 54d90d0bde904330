//! Fetchers for the four upstream data sets
//!
//! Collectors never fail: an unavailable endpoint yields partial or empty
//! data, and the failure has already been counted by the [`Upstream`]
//! implementation.
//!
//! [`Upstream`]: crate::upstream::Upstream

pub mod alerts;
pub mod resources;
pub mod stats;
pub mod supermetrics;

pub use alerts::collect_alerts;
pub use resources::collect_resources;
pub use stats::{StatSample, collect_stats, latest_samples};
pub use supermetrics::collect_supermetrics;
