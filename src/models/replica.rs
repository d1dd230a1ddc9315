use serde::{Deserialize, Serialize};
use super::{BrokerId, LogDirId, TopicPartition};

/// One broker-local copy of a partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replica {
    pub topic_partition: TopicPartition,
    pub broker_id: BrokerId,
    pub log_dir: String,
    pub is_leader: bool,
    pub size_bytes: u64,
}

impl Replica {
    pub fn log_dir_id(&self) -> LogDirId {
        LogDirId::new(self.broker_id, self.log_dir.clone())
    }
}
