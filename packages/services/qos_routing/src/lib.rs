mod config;
mod diff;
mod error;
mod handler;
mod internal;
mod listener;
mod manager;

pub use config::{RoutingConfig, DEFAULT_ALL_ROUTES_LIMIT, DEFAULT_MAX_ALTERNATE_ROUTES};
pub use diff::RouteDiff;
pub use error::RoutingError;
#[cfg(any(test, feature = "mock"))]
pub use listener::MockQosRoutingListener;
pub use listener::{QosRoutingListener, RoutingEvent};
pub use manager::QosRoutingManager;
