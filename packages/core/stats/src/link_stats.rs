use serde::{Deserialize, Serialize};
use te_sdn_identity::{DatapathLink, Flow, FlowedLink};

use crate::{InfoRate, Stat, StatType, Summary};

/// Latest measurement of a flowed-link.
///
/// Latency summaries are in milliseconds, byte-loss summaries are ratios in [0, 1].
/// A link that was never measured has "absent" statistics: every value is None and every
/// stat is unsafe.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FlowedLinkStats {
    link: FlowedLink,
    latency: Stat<Option<Summary>>,
    byte_loss: Stat<Option<Summary>>,
    throughput: Stat<Option<InfoRate>>,
    data_capacity: Stat<Option<InfoRate>>,
}

impl FlowedLinkStats {
    pub fn absent(link: FlowedLink) -> Self {
        Self {
            link,
            latency: Stat::new(None, 0, StatType::Unsafe),
            byte_loss: Stat::new(None, 0, StatType::Unsafe),
            throughput: Stat::new(None, 0, StatType::Unsafe),
            data_capacity: Stat::new(None, 0, StatType::Unsafe),
        }
    }

    pub fn with_latency(mut self, latency: Stat<Option<Summary>>) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_byte_loss(mut self, byte_loss: Stat<Option<Summary>>) -> Self {
        self.byte_loss = byte_loss;
        self
    }

    pub fn with_throughput(mut self, throughput: Stat<Option<InfoRate>>) -> Self {
        self.throughput = throughput;
        self
    }

    pub fn with_data_capacity(mut self, data_capacity: Stat<Option<InfoRate>>) -> Self {
        self.data_capacity = data_capacity;
        self
    }

    pub fn link(&self) -> &FlowedLink {
        &self.link
    }

    pub fn datapath_link(&self) -> DatapathLink {
        self.link.unflowed()
    }

    pub fn flow(&self) -> &Flow {
        self.link.flow()
    }

    pub fn latency(&self) -> &Stat<Option<Summary>> {
        &self.latency
    }

    pub fn byte_loss(&self) -> &Stat<Option<Summary>> {
        &self.byte_loss
    }

    pub fn throughput(&self) -> &Stat<Option<InfoRate>> {
        &self.throughput
    }

    pub fn data_capacity(&self) -> &Stat<Option<InfoRate>> {
        &self.data_capacity
    }

    /// Mean latency in milliseconds
    pub fn mean_latency(&self) -> Stat<Option<f64>> {
        self.latency.map(|s| s.map(|s| s.mean))
    }

    pub fn mean_byte_loss(&self) -> Stat<Option<f64>> {
        self.byte_loss.map(|s| s.map(|s| s.mean))
    }

    /// Capacity minus throughput, never negative
    pub fn available_bandwidth(&self) -> Stat<Option<InfoRate>> {
        self.data_capacity.combine(&self.throughput, |capa, used| match (capa, used) {
            (Some(capa), Some(used)) => Some(capa.pos_diff(*used)),
            _ => None,
        })
    }

    /// Throughput relative to capacity
    pub fn data_utilization(&self) -> Stat<Option<f64>> {
        self.data_capacity.combine(&self.throughput, |capa, used| match (capa, used) {
            (Some(capa), Some(used)) => used.ratio_of(*capa),
            _ => None,
        })
    }

    pub fn is_absent(&self) -> bool {
        self.latency.value().is_none() && self.byte_loss.value().is_none() && self.throughput.value().is_none() && self.data_capacity.value().is_none()
    }

    /// Compares mean latency, mean byte-loss, throughput and capacity, including trust tags
    pub fn has_same_core_stats(&self, other: &Self) -> bool {
        self.mean_latency() == other.mean_latency() && self.mean_byte_loss() == other.mean_byte_loss() && self.throughput == other.throughput && self.data_capacity == other.data_capacity
    }
}
