mod error;
mod flowed_topology;
mod pretty;
mod route;
mod search;

pub use error::RouteError;
pub use flowed_topology::{ConnectionMap, FlowedTopology};
pub use route::{FlowedRoute, FlowedRouteBuilder};
