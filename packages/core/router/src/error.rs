use te_sdn_identity::{DatapathLink, Flow, PathError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RouteError {
    #[error("link {link} does not continue from {prev}")]
    DisconnectedLink { prev: DatapathLink, link: DatapathLink },
    #[error("statistics of flow {actual} do not belong to flow {expected}")]
    FlowMismatch { expected: Flow, actual: Flow },
    #[error("weight {weight} of link {link} is not a finite non-negative number")]
    InvalidWeight { link: DatapathLink, weight: f64 },
    #[error(transparent)]
    Path(#[from] PathError),
}
