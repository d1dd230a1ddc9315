//! Cluster snapshots: the optimizer's only input.
//!
//! A [`ClusterSnapshot`] is a plain value handed over by whatever collects
//! broker, disk and replica metadata. [`SnapshotProvider`] is the seam for
//! that collector, and [`CachedSnapshotProvider`] keeps recent snapshots per
//! cluster with a time-to-live and a bounded number of entries.

use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::models::{BrokerId, PartitionId, TopicName};
use crate::RebalancerError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSnapshot {
    pub brokers: Vec<BrokerSnapshot>,
    pub partitions: Vec<PartitionSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerSnapshot {
    pub id: BrokerId,
    #[serde(default)]
    pub rack: Option<String>,
    pub log_dirs: Vec<LogDirSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDirSnapshot {
    pub name: String,
    pub capacity_bytes: u64,
    /// Reported usage; defaults to the sum of the hosted replica sizes
    #[serde(default)]
    pub used_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSnapshot {
    pub topic: TopicName,
    pub partition: PartitionId,
    /// Replicas in assignment order; the first one is the preferred leader
    pub replicas: Vec<ReplicaSnapshot>,
    pub leader: BrokerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSnapshot {
    pub broker_id: BrokerId,
    pub log_dir: String,
    #[serde(default)]
    pub size_bytes: u64,
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self, RebalancerError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RebalancerError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Add a broker with `(name, capacity_bytes)` log directories.
    pub fn with_broker(mut self, id: BrokerId, rack: Option<&str>, log_dirs: &[(&str, u64)]) -> Self {
        self.brokers.push(BrokerSnapshot {
            id,
            rack: rack.map(str::to_string),
            log_dirs: log_dirs
                .iter()
                .map(|(name, capacity_bytes)| LogDirSnapshot {
                    name: name.to_string(),
                    capacity_bytes: *capacity_bytes,
                    used_bytes: None,
                })
                .collect(),
        });
        self
    }

    /// Add a partition with `(broker, log_dir, size_bytes)` replicas.
    pub fn with_partition(
        mut self,
        topic: &str,
        partition: PartitionId,
        replicas: &[(BrokerId, &str, u64)],
        leader: BrokerId,
    ) -> Self {
        self.partitions.push(PartitionSnapshot {
            topic: topic.to_string(),
            partition,
            replicas: replicas
                .iter()
                .map(|(broker_id, log_dir, size_bytes)| ReplicaSnapshot {
                    broker_id: *broker_id,
                    log_dir: log_dir.to_string(),
                    size_bytes: *size_bytes,
                })
                .collect(),
            leader,
        });
        self
    }
}

/// Source of cluster snapshots, keyed by cluster id.
pub trait SnapshotProvider: Send + Sync {
    fn snapshot(&self, cluster_id: u64) -> Result<Arc<ClusterSnapshot>, RebalancerError>;
}

struct CachedEntry {
    snapshot: Arc<ClusterSnapshot>,
    loaded_at: Instant,
}

/// Caches snapshots of an inner provider.
///
/// Entries expire `ttl` after they were loaded; at most `max_entries`
/// clusters are kept, least recently used first out.
pub struct CachedSnapshotProvider<P> {
    inner: P,
    ttl: Duration,
    entries: Mutex<LruCache<u64, CachedEntry>>,
}

impl<P: SnapshotProvider> CachedSnapshotProvider<P> {
    pub fn new(inner: P, ttl: Duration, max_entries: NonZeroUsize) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(LruCache::new(max_entries)),
        }
    }

    pub fn invalidate(&self, cluster_id: u64) {
        self.lock().pop(&cluster_id);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<u64, CachedEntry>> {
        // The cache holds no invariants a panicking holder could break
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<P: SnapshotProvider> SnapshotProvider for CachedSnapshotProvider<P> {
    fn snapshot(&self, cluster_id: u64) -> Result<Arc<ClusterSnapshot>, RebalancerError> {
        {
            let mut entries = self.lock();
            let cached = entries
                .get(&cluster_id)
                .map(|entry| (Arc::clone(&entry.snapshot), entry.loaded_at.elapsed() < self.ttl));
            match cached {
                Some((snapshot, true)) => return Ok(snapshot),
                Some((_, false)) => {
                    debug!(cluster_id, "snapshot expired");
                    entries.pop(&cluster_id);
                }
                None => {}
            }
        }

        let snapshot = self.inner.snapshot(cluster_id)?;
        self.lock().put(
            cluster_id,
            CachedEntry {
                snapshot: Arc::clone(&snapshot),
                loaded_at: Instant::now(),
            },
        );
        Ok(snapshot)
    }
}
