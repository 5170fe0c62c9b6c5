mod link_stats;
mod stat;
mod value;
mod weight;

pub use link_stats::FlowedLinkStats;
pub use stat::{Stat, StatType};
pub use value::{format_ratio, InfoRate, Summary};
pub use weight::{LinkWeigher, RouteWeigher, BYTE_LOSS_CENTER, LATENCY_CENTER_MS, UNSAFE_PENALTY};
