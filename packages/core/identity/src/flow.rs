use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Debug, Display, Formatter};

/// Packet header fields a flow may constrain
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MatchField {
    EthSrc,
    EthDst,
    EthType,
    VlanVid,
    IpProto,
    Ipv4Src,
    Ipv4Dst,
    TcpSrc,
    TcpDst,
    UdpSrc,
    UdpDst,
}

impl MatchField {
    pub fn name(&self) -> &'static str {
        match self {
            MatchField::EthSrc => "eth_src",
            MatchField::EthDst => "eth_dst",
            MatchField::EthType => "eth_type",
            MatchField::VlanVid => "vlan_vid",
            MatchField::IpProto => "ip_proto",
            MatchField::Ipv4Src => "ipv4_src",
            MatchField::Ipv4Dst => "ipv4_dst",
            MatchField::TcpSrc => "tcp_src",
            MatchField::TcpDst => "tcp_dst",
            MatchField::UdpSrc => "udp_src",
            MatchField::UdpDst => "udp_dst",
        }
    }
}

/// Single header constraint, exact when `mask` is None
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchEntry {
    pub field: MatchField,
    pub value: u64,
    #[serde(default)]
    pub mask: Option<u64>,
}

impl MatchEntry {
    pub fn exact(field: MatchField, value: u64) -> Self {
        Self { field, value, mask: None }
    }

    pub fn masked(field: MatchField, value: u64, mask: u64) -> Self {
        Self { field, value, mask: Some(mask) }
    }
}

impl Display for MatchEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.mask {
            Some(mask) => write!(f, "{}={:#x}/{:#x}", self.field.name(), self.value, mask),
            None => write!(f, "{}={:#x}", self.field.name(), self.value),
        }
    }
}

/// Immutable traffic-class predicate, compared structurally.
///
/// A flow is the set of its match entries; at most one entry per field is kept and
/// the empty flow matches every packet.
#[derive(Serialize, Deserialize, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Flow {
    entries: BTreeSet<MatchEntry>,
}

impl Flow {
    /// The flow matching all traffic
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of(entries: impl IntoIterator<Item = MatchEntry>) -> Self {
        let mut flow = Self::default();
        for entry in entries {
            flow = flow.with(entry);
        }
        flow
    }

    /// Returns a copy of this flow where `entry` replaces any entry on the same field
    pub fn with(&self, entry: MatchEntry) -> Self {
        let mut entries: BTreeSet<MatchEntry> = self.entries.iter().filter(|e| e.field != entry.field).cloned().collect();
        entries.insert(entry);
        Self { entries }
    }

    pub fn entry(&self, field: MatchField) -> Option<&MatchEntry> {
        self.entries.iter().find(|e| e.field == field)
    }

    pub fn entries(&self) -> impl Iterator<Item = &MatchEntry> {
        self.entries.iter()
    }

    pub fn is_all(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Display for Flow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.entries.is_empty() {
            return write!(f, "[*]");
        }
        write!(f, "[")?;
        for (i, entry) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", entry)?;
        }
        write!(f, "]")
    }
}

impl Debug for Flow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::{Flow, MatchEntry, MatchField};

    #[test]
    fn structural_equality() {
        let f1 = Flow::of([MatchEntry::exact(MatchField::EthType, 0x800), MatchEntry::exact(MatchField::IpProto, 6)]);
        let f2 = Flow::of([MatchEntry::exact(MatchField::IpProto, 6), MatchEntry::exact(MatchField::EthType, 0x800)]);
        assert_eq!(f1, f2);
        assert_ne!(f1, Flow::all());
    }

    #[test]
    fn same_field_is_replaced() {
        let flow = Flow::of([MatchEntry::exact(MatchField::EthType, 0x800), MatchEntry::exact(MatchField::EthType, 0x86dd)]);
        assert_eq!(flow.entries().count(), 1);
        assert_eq!(flow.entry(MatchField::EthType), Some(&MatchEntry::exact(MatchField::EthType, 0x86dd)));
    }

    #[test]
    fn display() {
        assert_eq!(Flow::all().to_string(), "[*]");
        let flow = Flow::of([MatchEntry::exact(MatchField::EthType, 0x800), MatchEntry::masked(MatchField::Ipv4Dst, 0x0a000000, 0xff000000)]);
        assert_eq!(flow.to_string(), "[eth_type=0x800,ipv4_dst=0xa000000/0xff000000]");
    }
}
