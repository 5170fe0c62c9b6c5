use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::{FlowedLinkStats, Stat, StatType};

/// Latency (in milliseconds) that receives half of the maximum latency weight
pub const LATENCY_CENTER_MS: f64 = 50.0;
/// Mapped byte-loss that receives half of the maximum byte-loss weight, this is 25% loss
pub const BYTE_LOSS_CENTER: f64 = 0.25 / (1.0 - 0.25);
/// Added to the weight of a measured but unsafe statistic
pub const UNSAFE_PENALTY: f64 = 1.0;

/// Anything that can turn link statistics into a routing cost.
///
/// Returned weights must be finite and non-negative.
pub trait LinkWeigher {
    fn link_weight(&self, stats: &FlowedLinkStats) -> f64;
}

impl<F: Fn(&FlowedLinkStats) -> f64> LinkWeigher for F {
    fn link_weight(&self, stats: &FlowedLinkStats) -> f64 {
        self(stats)
    }
}

/// Named route selection strategies
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RouteWeigher {
    MinLatency,
    MinByteLoss,
    #[default]
    Goodness,
}

impl RouteWeigher {
    pub const ALL: [RouteWeigher; 3] = [RouteWeigher::MinLatency, RouteWeigher::MinByteLoss, RouteWeigher::Goodness];

    /// Weight of the given stats, None when the strategy has no data to work with
    pub fn weigh(&self, stats: &FlowedLinkStats) -> Option<f64> {
        match self {
            RouteWeigher::MinLatency => latency_weight(&stats.mean_latency()),
            RouteWeigher::MinByteLoss => byte_loss_weight(&stats.mean_byte_loss()),
            RouteWeigher::Goodness => match (latency_weight(&stats.mean_latency()), byte_loss_weight(&stats.mean_byte_loss())) {
                (None, None) => None,
                (lat, loss) => Some(lat.unwrap_or(0.0) + loss.unwrap_or(0.0)),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RouteWeigher::MinLatency => "min_latency",
            RouteWeigher::MinByteLoss => "min_byte_loss",
            RouteWeigher::Goodness => "goodness",
        }
    }
}

impl LinkWeigher for RouteWeigher {
    fn link_weight(&self, stats: &FlowedLinkStats) -> f64 {
        self.weigh(stats).unwrap_or(0.0)
    }
}

impl Display for RouteWeigher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for RouteWeigher {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL.into_iter().find(|w| w.name() == lower).ok_or_else(|| format!("unknown route weigher '{}'", s))
    }
}

fn penalty(kind: StatType) -> f64 {
    match kind {
        StatType::Safe => 0.0,
        StatType::Unsafe => UNSAFE_PENALTY,
    }
}

/// Maps `[0, inf]` into `[0, 1]`, reaching 0.5 at `center`
fn center_map(x: f64, center: f64) -> f64 {
    if x.is_infinite() {
        1.0
    } else {
        x / (center + x)
    }
}

fn latency_weight(latency: &Stat<Option<f64>>) -> Option<f64> {
    let ms = (*latency.value())?;
    if ms.is_nan() {
        return None;
    }
    Some(center_map(ms.max(0.0), LATENCY_CENTER_MS) + penalty(latency.kind()))
}

fn byte_loss_weight(loss: &Stat<Option<f64>>) -> Option<f64> {
    let ratio = (*loss.value())?;
    if ratio.is_nan() {
        return None;
    }
    let base = if ratio >= 1.0 {
        1.0
    } else {
        let ratio = ratio.max(0.0);
        center_map(ratio / (1.0 - ratio), BYTE_LOSS_CENTER)
    };
    Some(base + penalty(loss.kind()))
}
