use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use super::{BrokerId, TopicPartition};

/// Address of a log directory: the owning broker plus the directory name.
///
/// Ordered by broker id, then name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LogDirId {
    pub broker_id: BrokerId,
    pub name: String,
}

impl LogDirId {
    pub fn new(broker_id: BrokerId, name: impl Into<String>) -> Self {
        Self {
            broker_id,
            name: name.into(),
        }
    }
}

impl fmt::Display for LogDirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.broker_id, self.name)
    }
}

/// A broker-local storage location holding zero or more replicas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogDir {
    pub broker_id: BrokerId,
    pub name: String,
    pub capacity_bytes: u64,
    pub(crate) used_bytes: u64,
    pub(crate) partitions: BTreeSet<TopicPartition>,
}

impl LogDir {
    pub fn new(broker_id: BrokerId, name: impl Into<String>, capacity_bytes: u64) -> Self {
        Self {
            broker_id,
            name: name.into(),
            capacity_bytes,
            used_bytes: 0,
            partitions: BTreeSet::new(),
        }
    }

    pub fn id(&self) -> LogDirId {
        LogDirId::new(self.broker_id, self.name.clone())
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Partitions with a replica in this directory, ascending.
    pub fn partitions(&self) -> impl Iterator<Item = &TopicPartition> {
        self.partitions.iter()
    }

    pub fn replica_count(&self) -> usize {
        self.partitions.len()
    }

    /// Disk utilization as a fraction of capacity (0.0 to 1.0, more when overfull)
    pub fn utilization(&self) -> f64 {
        utilization_of(self.used_bytes, self.capacity_bytes)
    }

    /// Utilization this directory would have after receiving `bytes`
    pub fn utilization_after_adding(&self, bytes: u64) -> f64 {
        utilization_of(self.used_bytes.saturating_add(bytes), self.capacity_bytes)
    }

    /// Utilization this directory would have after releasing `bytes`
    pub fn utilization_after_removing(&self, bytes: u64) -> f64 {
        utilization_of(self.used_bytes.saturating_sub(bytes), self.capacity_bytes)
    }
}

/// Shared by the model and the disk goals so both compute the exact same ratio.
pub fn utilization_of(used_bytes: u64, capacity_bytes: u64) -> f64 {
    if capacity_bytes == 0 {
        if used_bytes == 0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        used_bytes as f64 / capacity_bytes as f64
    }
}
