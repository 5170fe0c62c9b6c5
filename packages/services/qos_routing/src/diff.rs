use te_sdn_router::FlowedRoute;

/// Outcome of comparing the active route of a connection with a freshly computed one
#[derive(Debug, Clone, PartialEq)]
pub enum RouteDiff {
    Install(FlowedRoute),
    Replace { old: FlowedRoute, new: FlowedRoute },
    StatsUpdate(FlowedRoute),
    Remove(FlowedRoute),
    Unchanged,
}

impl RouteDiff {
    pub fn between(old: Option<&FlowedRoute>, new: Option<&FlowedRoute>) -> Self {
        match (old, new) {
            (Some(old), Some(new)) if !old.has_same_path(new) => RouteDiff::Replace { old: old.clone(), new: new.clone() },
            (Some(old), Some(new)) if !old.has_same_core_stats(new) => RouteDiff::StatsUpdate(new.clone()),
            (Some(_), Some(_)) => RouteDiff::Unchanged,
            (Some(old), None) => RouteDiff::Remove(old.clone()),
            (None, Some(new)) => RouteDiff::Install(new.clone()),
            (None, None) => RouteDiff::Unchanged,
        }
    }

    /// The route that should be active after applying this diff, None when the active route stays as is
    pub fn next_active(&self) -> Option<Option<&FlowedRoute>> {
        match self {
            RouteDiff::Install(new) | RouteDiff::StatsUpdate(new) | RouteDiff::Replace { new, .. } => Some(Some(new)),
            RouteDiff::Remove(_) => Some(None),
            RouteDiff::Unchanged => None,
        }
    }
}
