use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// Trust tag of a measured statistic
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatType {
    /// Can be trusted even under attacks that aim to disrupt the monitoring
    Safe,
    /// May have been manipulated by an adversary
    Unsafe,
}

impl StatType {
    /// Safe only when both are safe
    pub fn combine(self, other: StatType) -> StatType {
        match (self, other) {
            (StatType::Safe, StatType::Safe) => StatType::Safe,
            _ => StatType::Unsafe,
        }
    }
}

impl Display for StatType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatType::Safe => write!(f, "safe"),
            StatType::Unsafe => write!(f, "unsafe"),
        }
    }
}

/// A timestamped value tagged with its trust level.
///
/// Equality ignores the timestamp. Combining two stats keeps the later timestamp and is
/// only safe if both inputs are safe.
#[derive(Serialize, Deserialize, Copy, Clone)]
pub struct Stat<V> {
    value: V,
    timestamp_ms: u64,
    kind: StatType,
}

impl<V> Stat<V> {
    pub fn new(value: V, timestamp_ms: u64, kind: StatType) -> Self {
        Self { value, timestamp_ms, kind }
    }

    pub fn safe(value: V, timestamp_ms: u64) -> Self {
        Self::new(value, timestamp_ms, StatType::Safe)
    }

    pub fn unsafe_(value: V, timestamp_ms: u64) -> Self {
        Self::new(value, timestamp_ms, StatType::Unsafe)
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn kind(&self) -> StatType {
        self.kind
    }

    pub fn is_safe(&self) -> bool {
        self.kind == StatType::Safe
    }

    pub fn with_kind(self, kind: StatType) -> Self {
        Self { kind, ..self }
    }

    /// Transforms the value, keeping timestamp and trust tag
    pub fn map<U>(&self, f: impl FnOnce(&V) -> U) -> Stat<U> {
        Stat::new(f(&self.value), self.timestamp_ms, self.kind)
    }

    pub fn combine<U, R>(&self, other: &Stat<U>, f: impl FnOnce(&V, &U) -> R) -> Stat<R> {
        Stat::new(f(&self.value, &other.value), self.timestamp_ms.max(other.timestamp_ms), self.kind.combine(other.kind))
    }
}

impl<V: PartialEq> PartialEq for Stat<V> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.kind == other.kind
    }
}

impl<V: Debug> Debug for Stat<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({}) [{}]", self.value, self.kind, self.timestamp_ms)
    }
}
