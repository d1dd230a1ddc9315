use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use super::{BrokerId, LogDir, Replica, TopicPartition};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Broker {
    pub id: BrokerId,
    pub rack: Option<String>,
    pub(crate) log_dirs: BTreeMap<String, LogDir>,
    pub(crate) replicas: BTreeMap<TopicPartition, Replica>,
}

impl Broker {
    pub fn new(id: BrokerId, rack: Option<String>) -> Self {
        Self {
            id,
            rack,
            log_dirs: BTreeMap::new(),
            replicas: BTreeMap::new(),
        }
    }

    /// The replica of `topic_partition` hosted here, if any. A broker hosts
    /// at most one replica per partition.
    pub fn replica(&self, topic_partition: &TopicPartition) -> Option<&Replica> {
        self.replicas.get(topic_partition)
    }

    /// Replicas on this broker, ordered by partition
    pub fn replicas(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.values()
    }

    pub fn leader_replicas(&self) -> impl Iterator<Item = &Replica> {
        self.replicas.values().filter(|r| r.is_leader)
    }

    pub fn log_dir(&self, name: &str) -> Option<&LogDir> {
        self.log_dirs.get(name)
    }

    /// Log directories ordered by name
    pub fn log_dirs(&self) -> impl Iterator<Item = &LogDir> {
        self.log_dirs.values()
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn leader_count(&self) -> usize {
        self.leader_replicas().count()
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.log_dirs.values().map(|d| d.capacity_bytes).sum()
    }

    pub fn used_bytes(&self) -> u64 {
        self.log_dirs.values().map(|d| d.used_bytes).sum()
    }

    pub(crate) fn add_log_dir(&mut self, log_dir: LogDir) {
        self.log_dirs.insert(log_dir.name.clone(), log_dir);
    }
}
