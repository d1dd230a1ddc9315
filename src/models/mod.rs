// Type aliases used across models
pub type BrokerId = u32;
pub type TopicName = String;
pub type PartitionId = u32;

// Module declarations
mod topic;
mod replica;
mod log_dir;
mod broker;
mod cluster;

// Re-exports
pub use topic::TopicPartition;
pub use replica::Replica;
pub use log_dir::{LogDir, LogDirId};
pub use broker::Broker;
pub use cluster::ClusterModel;

/// Failures of the cluster model's mutators and of snapshot validation.
///
/// Any of these coming out of a relocation means a legality check was
/// bypassed or the snapshot is inconsistent, so the run must stop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Unknown broker {0}")]
    UnknownBroker(BrokerId),

    #[error("Unknown log dir {dir} on broker {broker}")]
    UnknownLogDir { broker: BrokerId, dir: String },

    #[error("Duplicate broker {0}")]
    DuplicateBroker(BrokerId),

    #[error("Duplicate log dir {dir} on broker {broker}")]
    DuplicateLogDir { broker: BrokerId, dir: String },

    #[error("No replica of {partition} on broker {broker} log dir {dir}")]
    ReplicaNotFound {
        partition: TopicPartition,
        broker: BrokerId,
        dir: String,
    },

    #[error("Broker {broker} already hosts a replica of {partition}")]
    DestinationHostsReplica {
        partition: TopicPartition,
        broker: BrokerId,
    },

    #[error("Replica of {partition} on broker {broker} is not the leader")]
    NotLeader {
        partition: TopicPartition,
        broker: BrokerId,
    },

    #[error("Broker {broker} hosts no follower replica of {partition}")]
    DestinationLacksFollower {
        partition: TopicPartition,
        broker: BrokerId,
    },

    #[error("Partition {partition} must have exactly one leader, found {leaders}")]
    LeaderCount {
        partition: TopicPartition,
        leaders: usize,
    },

    #[error("Partition {0} has no replicas")]
    EmptyPartition(TopicPartition),

    #[error("Log dir {dir} on broker {broker} reports {reported} bytes used but holds {hosted} bytes of replicas")]
    UsageBelowReplicas {
        broker: BrokerId,
        dir: String,
        reported: u64,
        hosted: u64,
    },
}
