use serde::{Deserialize, Serialize};
use std::fmt;
use super::{PartitionId, TopicName};

/// Immutable identity of a partition: topic name plus partition index.
///
/// Ordered by topic, then index, which is the order goals walk replicas in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: TopicName,
    pub partition: PartitionId,
}

impl TopicPartition {
    pub fn new(topic: impl Into<TopicName>, partition: PartitionId) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_order() {
        let a = TopicPartition::new("orders", 2);
        let b = TopicPartition::new("orders", 10);
        let c = TopicPartition::new("payments", 0);

        assert_eq!(a.to_string(), "orders-2");
        assert!(a < b);
        assert!(b < c);
    }
}
