mod connection;
mod flow;
mod link;
mod node_id;
mod path;

pub use connection::{DatapathConnection, FlowedConnection};
pub use flow::{Flow, MatchEntry, MatchField};
pub use link::{BidiNodePorts, DatapathLink, FlowedLink};
pub use node_id::{NodeId, NodePort, PortId};
pub use path::{DatapathHop, DatapathPath, FlowedPath, PathError};
