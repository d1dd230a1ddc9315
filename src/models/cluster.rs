use std::collections::BTreeMap;
use crate::actions::{ActionType, BalancingAction, ClusterStats, CommittedAction};
use crate::snapshot::ClusterSnapshot;
use super::{Broker, BrokerId, LogDir, LogDirId, ModelError, Replica, TopicPartition};

/// In-memory state of the cluster for one optimization run.
///
/// Placement only changes through [`ClusterModel::relocate_replica`] and
/// [`ClusterModel::relocate_leadership`]; both record what they did, so the
/// model always knows which partitions were already moved during the run.
#[derive(Debug, Clone, Default)]
pub struct ClusterModel {
    brokers: BTreeMap<BrokerId, Broker>,
    /// Replica assignment per partition; the first broker is the preferred leader
    assignments: BTreeMap<TopicPartition, Vec<BrokerId>>,
    balance_action_history: BTreeMap<TopicPartition, Vec<BalancingAction>>,
    committed_actions: Vec<CommittedAction>,
}

impl ClusterModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a model from a snapshot, rejecting inconsistent input.
    pub fn from_snapshot(snapshot: &ClusterSnapshot) -> Result<Self, ModelError> {
        let mut model = Self::new();

        for broker in &snapshot.brokers {
            model.add_broker(broker.id, broker.rack.clone())?;
            for dir in &broker.log_dirs {
                model.add_log_dir(broker.id, &dir.name, dir.capacity_bytes)?;
            }
        }

        for partition in &snapshot.partitions {
            let tp = TopicPartition::new(partition.topic.clone(), partition.partition);
            if partition.replicas.is_empty() {
                return Err(ModelError::EmptyPartition(tp));
            }
            for replica in &partition.replicas {
                model.add_replica(
                    &tp,
                    replica.broker_id,
                    &replica.log_dir,
                    replica.broker_id == partition.leader,
                    replica.size_bytes,
                )?;
            }
        }

        // Reported usage wins over the sum of replica sizes when present, but
        // may not claim less than the replicas the dir holds
        for broker in &snapshot.brokers {
            for dir in &broker.log_dirs {
                if let Some(used) = dir.used_bytes {
                    if let Some(log_dir) = model
                        .brokers
                        .get_mut(&broker.id)
                        .and_then(|b| b.log_dirs.get_mut(&dir.name))
                    {
                        if used < log_dir.used_bytes {
                            return Err(ModelError::UsageBelowReplicas {
                                broker: broker.id,
                                dir: dir.name.clone(),
                                reported: used,
                                hosted: log_dir.used_bytes,
                            });
                        }
                        log_dir.used_bytes = used;
                    }
                }
            }
        }

        model.validate()?;
        Ok(model)
    }

    pub(crate) fn add_broker(&mut self, id: BrokerId, rack: Option<String>) -> Result<(), ModelError> {
        if self.brokers.contains_key(&id) {
            return Err(ModelError::DuplicateBroker(id));
        }
        self.brokers.insert(id, Broker::new(id, rack));
        Ok(())
    }

    pub(crate) fn add_log_dir(
        &mut self,
        broker_id: BrokerId,
        name: &str,
        capacity_bytes: u64,
    ) -> Result<(), ModelError> {
        let broker = self
            .brokers
            .get_mut(&broker_id)
            .ok_or(ModelError::UnknownBroker(broker_id))?;
        if broker.log_dirs.contains_key(name) {
            return Err(ModelError::DuplicateLogDir {
                broker: broker_id,
                dir: name.to_string(),
            });
        }
        broker.add_log_dir(LogDir::new(broker_id, name, capacity_bytes));
        Ok(())
    }

    pub(crate) fn add_replica(
        &mut self,
        tp: &TopicPartition,
        broker_id: BrokerId,
        log_dir: &str,
        is_leader: bool,
        size_bytes: u64,
    ) -> Result<(), ModelError> {
        let broker = self
            .brokers
            .get_mut(&broker_id)
            .ok_or(ModelError::UnknownBroker(broker_id))?;
        if broker.replicas.contains_key(tp) {
            return Err(ModelError::DestinationHostsReplica {
                partition: tp.clone(),
                broker: broker_id,
            });
        }
        let dir = broker
            .log_dirs
            .get_mut(log_dir)
            .ok_or_else(|| ModelError::UnknownLogDir {
                broker: broker_id,
                dir: log_dir.to_string(),
            })?;

        dir.partitions.insert(tp.clone());
        dir.used_bytes = dir.used_bytes.saturating_add(size_bytes);
        broker.replicas.insert(
            tp.clone(),
            Replica {
                topic_partition: tp.clone(),
                broker_id,
                log_dir: log_dir.to_string(),
                is_leader,
                size_bytes,
            },
        );
        self.assignments.entry(tp.clone()).or_default().push(broker_id);
        Ok(())
    }

    /// Every partition must have exactly one leader.
    pub fn validate(&self) -> Result<(), ModelError> {
        for tp in self.assignments.keys() {
            let leaders = self.replicas_of(tp).iter().filter(|r| r.is_leader).count();
            if leaders != 1 {
                return Err(ModelError::LeaderCount {
                    partition: tp.clone(),
                    leaders,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read primitives
    // ------------------------------------------------------------------

    /// Brokers in ascending id order
    pub fn brokers(&self) -> impl Iterator<Item = &Broker> {
        self.brokers.values()
    }

    pub fn broker(&self, id: BrokerId) -> Option<&Broker> {
        self.brokers.get(&id)
    }

    pub fn broker_ids(&self) -> Vec<BrokerId> {
        self.brokers.keys().copied().collect()
    }

    pub fn rack_of(&self, broker_id: BrokerId) -> Option<&str> {
        self.brokers
            .get(&broker_id)
            .and_then(|b| b.rack.as_deref())
    }

    /// All log directories, by broker id then directory name
    pub fn log_dirs(&self) -> impl Iterator<Item = &LogDir> {
        self.brokers.values().flat_map(|b| b.log_dirs())
    }

    pub fn log_dir(&self, id: &LogDirId) -> Option<&LogDir> {
        self.brokers
            .get(&id.broker_id)
            .and_then(|b| b.log_dir(&id.name))
    }

    /// All partitions, ascending
    pub fn partitions(&self) -> impl Iterator<Item = &TopicPartition> {
        self.assignments.keys()
    }

    /// Brokers hosting `tp`, in assignment order
    pub fn assignment(&self, tp: &TopicPartition) -> Option<&[BrokerId]> {
        self.assignments.get(tp).map(Vec::as_slice)
    }

    pub fn preferred_leader(&self, tp: &TopicPartition) -> Option<BrokerId> {
        self.assignments.get(tp).and_then(|a| a.first().copied())
    }

    pub fn replica(&self, tp: &TopicPartition, broker_id: BrokerId) -> Option<&Replica> {
        self.brokers.get(&broker_id).and_then(|b| b.replica(tp))
    }

    /// Replicas of `tp`, in assignment order
    pub fn replicas_of(&self, tp: &TopicPartition) -> Vec<&Replica> {
        self.assignments
            .get(tp)
            .map(|brokers| {
                brokers
                    .iter()
                    .filter_map(|id| self.replica(tp, *id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn leader_of(&self, tp: &TopicPartition) -> Option<&Replica> {
        self.replicas_of(tp).into_iter().find(|r| r.is_leader)
    }

    pub fn partition_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn replica_count(&self) -> usize {
        self.brokers.values().map(Broker::replica_count).sum()
    }

    pub fn stats(&self) -> ClusterStats {
        ClusterStats {
            broker_count: self.brokers.len(),
            log_dir_count: self.log_dirs().count(),
            partition_count: self.partition_count(),
            replica_count: self.replica_count(),
        }
    }

    /// Replica movements committed so far in this run, per partition
    pub fn balance_action_history(&self) -> &BTreeMap<TopicPartition, Vec<BalancingAction>> {
        &self.balance_action_history
    }

    pub fn has_moved(&self, tp: &TopicPartition) -> bool {
        self.balance_action_history.contains_key(tp)
    }

    /// Every committed action, in commit order
    pub fn committed_actions(&self) -> &[CommittedAction] {
        &self.committed_actions
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Move the replica of `tp` from `source_broker`/`source_log_dir` to
    /// `destination_broker`/`destination_log_dir`.
    ///
    /// Nothing is mutated when this returns an error.
    #[allow(clippy::too_many_arguments)]
    pub fn relocate_replica(
        &mut self,
        goal_name: &str,
        action_label: &str,
        tp: &TopicPartition,
        source_broker: BrokerId,
        source_log_dir: &str,
        destination_broker: BrokerId,
        destination_log_dir: &str,
    ) -> Result<(), ModelError> {
        let source = self
            .brokers
            .get(&source_broker)
            .ok_or(ModelError::UnknownBroker(source_broker))?;
        match source.replica(tp) {
            Some(replica) if replica.log_dir == source_log_dir => {}
            _ => {
                return Err(ModelError::ReplicaNotFound {
                    partition: tp.clone(),
                    broker: source_broker,
                    dir: source_log_dir.to_string(),
                })
            }
        }

        let destination = self
            .brokers
            .get(&destination_broker)
            .ok_or(ModelError::UnknownBroker(destination_broker))?;
        if destination.log_dir(destination_log_dir).is_none() {
            return Err(ModelError::UnknownLogDir {
                broker: destination_broker,
                dir: destination_log_dir.to_string(),
            });
        }
        if destination.replica(tp).is_some() {
            return Err(ModelError::DestinationHostsReplica {
                partition: tp.clone(),
                broker: destination_broker,
            });
        }

        // Detach from the source
        let mut replica = self.detach_replica(tp, source_broker)?;
        let size_bytes = replica.size_bytes;

        // Attach to the destination
        replica.broker_id = destination_broker;
        replica.log_dir = destination_log_dir.to_string();
        let destination = self
            .brokers
            .get_mut(&destination_broker)
            .ok_or(ModelError::UnknownBroker(destination_broker))?;
        if let Some(dir) = destination.log_dirs.get_mut(destination_log_dir) {
            dir.partitions.insert(tp.clone());
            dir.used_bytes = dir.used_bytes.saturating_add(size_bytes);
        }
        destination.replicas.insert(tp.clone(), replica);

        if let Some(assignment) = self.assignments.get_mut(tp) {
            for broker_id in assignment.iter_mut() {
                if *broker_id == source_broker {
                    *broker_id = destination_broker;
                }
            }
        }

        let action = BalancingAction::new(
            tp.clone(),
            source_broker,
            source_log_dir,
            destination_broker,
            destination_log_dir,
            ActionType::ReplicaMovement,
        );
        self.balance_action_history
            .entry(tp.clone())
            .or_default()
            .push(action.clone());
        self.committed_actions.push(CommittedAction {
            goal: goal_name.to_string(),
            label: action_label.to_string(),
            replica_size_bytes: size_bytes,
            action,
        });
        Ok(())
    }

    /// Hand leadership of `tp` from `source_broker` to the follower replica on
    /// `destination_broker`.
    ///
    /// Nothing is mutated when this returns an error.
    pub fn relocate_leadership(
        &mut self,
        goal_name: &str,
        action_label: &str,
        tp: &TopicPartition,
        source_broker: BrokerId,
        destination_broker: BrokerId,
    ) -> Result<(), ModelError> {
        let (source_log_dir, size_bytes) = match self.replica(tp, source_broker) {
            Some(replica) if replica.is_leader => (replica.log_dir.clone(), replica.size_bytes),
            _ => {
                return Err(ModelError::NotLeader {
                    partition: tp.clone(),
                    broker: source_broker,
                })
            }
        };
        let destination_log_dir = match self.replica(tp, destination_broker) {
            Some(replica) if !replica.is_leader => replica.log_dir.clone(),
            _ => {
                return Err(ModelError::DestinationLacksFollower {
                    partition: tp.clone(),
                    broker: destination_broker,
                })
            }
        };

        self.set_leader_flag(tp, source_broker, false);
        self.set_leader_flag(tp, destination_broker, true);

        self.committed_actions.push(CommittedAction {
            goal: goal_name.to_string(),
            label: action_label.to_string(),
            replica_size_bytes: size_bytes,
            action: BalancingAction::new(
                tp.clone(),
                source_broker,
                source_log_dir,
                destination_broker,
                destination_log_dir,
                ActionType::LeadershipMovement,
            ),
        });
        Ok(())
    }

    fn detach_replica(&mut self, tp: &TopicPartition, broker_id: BrokerId) -> Result<Replica, ModelError> {
        let broker = self
            .brokers
            .get_mut(&broker_id)
            .ok_or(ModelError::UnknownBroker(broker_id))?;
        let replica = broker
            .replicas
            .remove(tp)
            .ok_or_else(|| ModelError::ReplicaNotFound {
                partition: tp.clone(),
                broker: broker_id,
                dir: String::new(),
            })?;
        if let Some(dir) = broker.log_dirs.get_mut(&replica.log_dir) {
            dir.partitions.remove(tp);
            dir.used_bytes = dir.used_bytes.saturating_sub(replica.size_bytes);
        }
        Ok(replica)
    }

    fn set_leader_flag(&mut self, tp: &TopicPartition, broker_id: BrokerId, is_leader: bool) {
        if let Some(replica) = self
            .brokers
            .get_mut(&broker_id)
            .and_then(|b| b.replicas.get_mut(tp))
        {
            replica.is_leader = is_leader;
        }
    }
}
