use te_sdn_identity::{DatapathLink, FlowedConnection};
use te_sdn_router::RouteError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RoutingError {
    #[error("connection {0} is already registered")]
    AlreadyRegistered(FlowedConnection),
    #[error("connection {0} is not registered")]
    NotRegistered(FlowedConnection),
    #[error("invalid virtual capacity for {link}: {reason}")]
    InvalidCapacity { link: DatapathLink, reason: String },
    #[error(transparent)]
    Route(#[from] RouteError),
}
