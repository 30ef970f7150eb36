pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod broker;
pub mod cache;
pub mod config;
pub mod models;
pub mod notifier;
pub mod remote;
pub mod sources;
pub mod storage;
pub mod util;

pub use models::{AggregatedMetric, LabelValue, Labels, Metric};
