use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Summary of a sampled quantity
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub latest: f64,
}

impl Summary {
    pub fn new(mean: f64, latest: f64) -> Self {
        Self { mean, latest }
    }

    /// Summary of a single sample
    pub fn single(value: f64) -> Self {
        Self::new(value, value)
    }
}

/// Information rate in bits per second
#[derive(Serialize, Deserialize, Copy, Clone, PartialEq, PartialOrd)]
#[serde(transparent)]
pub struct InfoRate(f64);

impl InfoRate {
    pub const ZERO: InfoRate = InfoRate(0.0);

    pub fn from_bps(bps: f64) -> Self {
        Self(bps)
    }

    pub fn from_kbps(kbps: f64) -> Self {
        Self(kbps * 1e3)
    }

    pub fn from_mbps(mbps: f64) -> Self {
        Self(mbps * 1e6)
    }

    pub fn from_gbps(gbps: f64) -> Self {
        Self(gbps * 1e9)
    }

    pub fn bps(&self) -> f64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0.0
    }

    pub fn max(self, other: Self) -> Self {
        Self(self.0.max(other.0))
    }

    pub fn min(self, other: Self) -> Self {
        Self(self.0.min(other.0))
    }

    /// Difference clamped at zero
    pub fn pos_diff(self, other: Self) -> Self {
        Self((self.0 - other.0).max(0.0))
    }

    /// `self / total`, None when `total` is zero
    pub fn ratio_of(self, total: Self) -> Option<f64> {
        if total.0 > 0.0 {
            Some(self.0 / total.0)
        } else {
            None
        }
    }
}

impl Display for InfoRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let bps = self.0;
        if bps >= 1e9 {
            write!(f, "{:.3} Gb/s", bps / 1e9)
        } else if bps >= 1e6 {
            write!(f, "{:.3} Mb/s", bps / 1e6)
        } else if bps >= 1e3 {
            write!(f, "{:.3} kb/s", bps / 1e3)
        } else {
            write!(f, "{:.3} b/s", bps)
        }
    }
}

impl Debug for InfoRate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

/// Renders a ratio in [0, 1] as a percentage with two decimals
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.2}%", ratio * 100.0)
}

#[cfg(test)]
mod tests {
    use super::{format_ratio, InfoRate};

    #[test]
    fn info_rate_ops() {
        let cap = InfoRate::from_mbps(100.0);
        let used = InfoRate::from_mbps(30.0);
        assert_eq!(cap.pos_diff(used), InfoRate::from_mbps(70.0));
        assert_eq!(used.pos_diff(cap), InfoRate::ZERO);
        assert_eq!(used.ratio_of(cap), Some(0.3));
        assert_eq!(used.ratio_of(InfoRate::ZERO), None);
        assert_eq!(cap.max(used), cap);
        assert_eq!(cap.min(used), used);
    }

    #[test]
    fn display() {
        assert_eq!(InfoRate::from_bps(512.0).to_string(), "512.000 b/s");
        assert_eq!(InfoRate::from_mbps(1.5).to_string(), "1.500 Mb/s");
        assert_eq!(InfoRate::from_gbps(10.0).to_string(), "10.000 Gb/s");
        assert_eq!(format_ratio(0.125), "12.50%");
    }
}
