use te_sdn_identity::FlowedConnection;
use te_sdn_router::FlowedRoute;

/// Route lifecycle notifications, delivered in the order they happened
#[derive(Debug, Clone, PartialEq)]
pub enum RoutingEvent {
    ConnectionRegistered(FlowedConnection),
    ConnectionUnregistered { connection: FlowedConnection, last_route: Option<FlowedRoute> },
    RouteInstalled(FlowedRoute),
    /// The new route must be installed before the old one is removed
    RouteReplacing { old: FlowedRoute, new: FlowedRoute },
    RouteStatsUpdated(FlowedRoute),
    RouteRemoved { connection: FlowedConnection, old: FlowedRoute },
}

impl RoutingEvent {
    pub fn connection(&self) -> FlowedConnection {
        match self {
            RoutingEvent::ConnectionRegistered(connection) => connection.clone(),
            RoutingEvent::ConnectionUnregistered { connection, .. } => connection.clone(),
            RoutingEvent::RouteInstalled(route) => route.connection(),
            RoutingEvent::RouteReplacing { new, .. } => new.connection(),
            RoutingEvent::RouteStatsUpdated(route) => route.connection(),
            RoutingEvent::RouteRemoved { connection, .. } => connection.clone(),
        }
    }
}

/// Subscriber of route lifecycle notifications.
///
/// Called synchronously; an implementation may query the manager but must not register,
/// unregister or push statistics from inside the callback.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait QosRoutingListener: Send + Sync {
    fn on_routing_event(&self, event: &RoutingEvent);
}
