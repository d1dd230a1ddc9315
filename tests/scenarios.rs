// End-to-end scenarios for the log-dir rebalancer: model guards, the driver's
// candidate handling and full optimizer runs through the public API.

use std::collections::BTreeMap;

use logdir_rebalancer::goals::{maybe_apply_balancing_action, RackAwareGoal};
use logdir_rebalancer::{
    ActionType, ClusterModel, ClusterSnapshot, LogDirId, ModelError, OptimizationOptions, OptimizedGoals,
    RebalanceConfig, RebalancerError, TopicPartition,
};

fn four_brokers() -> ClusterModel {
    let snapshot = ClusterSnapshot::new()
        .with_broker(1, None, &[("/d1", 1000)])
        .with_broker(2, None, &[("/d1", 1000)])
        .with_broker(3, None, &[("/d1", 1000)])
        .with_broker(4, None, &[("/d1", 1000)])
        .with_partition("T", 0, &[(1, "/d1", 100), (2, "/d1", 100)], 1);
    ClusterModel::from_snapshot(&snapshot).unwrap()
}

/// Six brokers in three racks; every partition sits entirely in rack a
fn rack_skewed() -> ClusterSnapshot {
    let mut snapshot = ClusterSnapshot::new();
    for (id, rack) in [(1, "a"), (2, "a"), (3, "b"), (4, "b"), (5, "c"), (6, "c")] {
        snapshot = snapshot.with_broker(id, Some(rack), &[("/d1", 10_000), ("/d2", 10_000)]);
    }
    for p in 0..12 {
        let dir = if p % 2 == 0 { "/d1" } else { "/d2" };
        snapshot = snapshot.with_partition("orders", p, &[(1, dir, 100), (2, dir, 100)], 1);
    }
    snapshot
}

fn replica_moves_per_partition(actions: &[logdir_rebalancer::CommittedAction]) -> BTreeMap<TopicPartition, usize> {
    let mut moves = BTreeMap::new();
    for committed in actions {
        if committed.action.action_type() == ActionType::ReplicaMovement {
            *moves.entry(committed.action.topic_partition().clone()).or_insert(0) += 1;
        }
    }
    moves
}

#[test]
fn duplicate_replica_is_rejected_by_the_model() {
    let mut model = four_brokers();
    let tp = TopicPartition::new("T", 0);

    let result = model.relocate_replica("test", "REPLICA_MOVEMENT", &tp, 1, "/d1", 2, "/d1");

    assert_eq!(
        result,
        Err(ModelError::DestinationHostsReplica {
            partition: tp.clone(),
            broker: 2
        })
    );
    assert_eq!(model.assignment(&tp).unwrap(), &[1, 2]);
    assert!(model.committed_actions().is_empty());
    assert!(!model.has_moved(&tp));
}

#[test]
fn leadership_to_non_hosting_broker_is_rejected() {
    let mut model = four_brokers();
    let tp = TopicPartition::new("T", 0);

    let result = model.relocate_leadership("test", "LEADERSHIP_MOVEMENT", &tp, 1, 3);
    assert_eq!(
        result,
        Err(ModelError::DestinationLacksFollower {
            partition: tp.clone(),
            broker: 3
        })
    );

    // The driver treats the same request as illegal instead of failing
    let leader = model.leader_of(&tp).unwrap().clone();
    let chosen = maybe_apply_balancing_action(
        &RackAwareGoal::new(),
        &mut model,
        &leader,
        &[LogDirId::new(3, "/d1")],
        ActionType::LeadershipMovement,
        &OptimizedGoals::empty(),
        &OptimizationOptions::default(),
    )
    .unwrap();
    assert_eq!(chosen, None);
    assert_eq!(model.leader_of(&tp).unwrap().broker_id, 1);
}

#[test]
fn offline_candidate_is_filtered_and_next_candidate_used() {
    let mut model = four_brokers();
    let tp = TopicPartition::new("T", 0);
    let follower = model.replica(&tp, 2).unwrap().clone();
    let options = OptimizationOptions::default().with_offline_brokers([3]);

    let chosen = maybe_apply_balancing_action(
        &RackAwareGoal::new(),
        &mut model,
        &follower,
        &[LogDirId::new(3, "/d1"), LogDirId::new(4, "/d1")],
        ActionType::ReplicaMovement,
        &OptimizedGoals::empty(),
        &options,
    )
    .unwrap();

    assert_eq!(chosen, Some(LogDirId::new(4, "/d1")));
    assert_eq!(model.assignment(&tp).unwrap(), &[1, 4]);
    assert_eq!(model.log_dir(&LogDirId::new(4, "/d1")).unwrap().used_bytes(), 100);
    assert_eq!(model.log_dir(&LogDirId::new(2, "/d1")).unwrap().used_bytes(), 0);
}

#[test]
fn second_move_of_a_ledgered_partition_is_a_no_op() {
    let mut model = four_brokers();
    let tp = TopicPartition::new("T", 0);
    let goal = RackAwareGoal::new();

    let follower = model.replica(&tp, 2).unwrap().clone();
    let first = maybe_apply_balancing_action(
        &goal,
        &mut model,
        &follower,
        &[LogDirId::new(3, "/d1")],
        ActionType::ReplicaMovement,
        &OptimizedGoals::empty(),
        &OptimizationOptions::default(),
    )
    .unwrap();
    assert!(first.is_some());

    let leader = model.replica(&tp, 1).unwrap().clone();
    let second = maybe_apply_balancing_action(
        &goal,
        &mut model,
        &leader,
        &[LogDirId::new(4, "/d1")],
        ActionType::ReplicaMovement,
        &OptimizedGoals::empty(),
        &OptimizationOptions::default(),
    )
    .unwrap();

    assert_eq!(second, None);
    assert_eq!(model.assignment(&tp).unwrap(), &[1, 3]);
    assert_eq!(model.balance_action_history()[&tp].len(), 1);
    assert_eq!(model.committed_actions().len(), 1);
}

#[test]
fn default_config_spreads_partitions_across_racks() {
    let cluster = ClusterModel::from_snapshot(&rack_skewed()).unwrap();
    let mut rebalancer = RebalanceConfig::default().build_rebalancer();
    assert!(rebalancer
        .check_violations(&cluster)
        .iter()
        .any(|v| v.goal_name == "RackAwareGoal"));

    let outcome = rebalancer
        .generate_plan(&cluster, &OptimizationOptions::default())
        .unwrap();

    assert!(!outcome.plan.is_empty());
    assert_eq!(outcome.plan.actions, outcome.cluster.committed_actions().to_vec());
    assert!(replica_moves_per_partition(&outcome.plan.actions).values().all(|n| *n == 1));

    let report = rebalancer.goal_report(&outcome.cluster);
    let rack = report.iter().find(|r| r.name == "RackAwareGoal").unwrap();
    assert!(rack.is_satisfied(), "{:?}", rack.violations);
    let capacity = report.iter().find(|r| r.name == "DiskCapacityGoal").unwrap();
    assert!(capacity.is_satisfied());

    // The input model is never touched
    assert!(cluster.committed_actions().is_empty());
    assert_eq!(cluster.broker(1).unwrap().replica_count(), 12);
    assert_eq!(outcome.cluster.replica_count(), cluster.replica_count());
    outcome.cluster.validate().unwrap();
}

#[test]
fn offline_brokers_receive_nothing() {
    let cluster = ClusterModel::from_snapshot(&rack_skewed()).unwrap();
    let mut rebalancer = RebalanceConfig::default().build_rebalancer();
    let options = OptimizationOptions::excluding_brokers([5, 6]);

    let outcome = rebalancer.generate_plan(&cluster, &options).unwrap();

    assert!(!outcome.plan.is_empty());
    for committed in &outcome.plan.actions {
        assert!(!options.is_offline(committed.action.destination_broker()), "{}", committed.action);
    }
    assert_eq!(outcome.cluster.broker(5).unwrap().replica_count(), 0);
    assert_eq!(outcome.cluster.broker(6).unwrap().replica_count(), 0);
}

#[test]
fn balance_brokers_bound_the_run() {
    let cluster = ClusterModel::from_snapshot(&rack_skewed()).unwrap();
    let mut rebalancer = RebalanceConfig::default().build_rebalancer();
    let options = OptimizationOptions::for_brokers([1, 2, 3]);

    let outcome = rebalancer.generate_plan(&cluster, &options).unwrap();

    assert!(!outcome.plan.is_empty());
    for committed in &outcome.plan.actions {
        for broker in committed.action.affected_brokers() {
            assert!([1, 2, 3].contains(&broker), "{}", committed.action);
        }
    }
}

#[test]
fn excluded_topics_are_left_alone() {
    let snapshot = rack_skewed().with_partition("audit", 0, &[(3, "/d1", 100), (4, "/d1", 100)], 3);
    let cluster = ClusterModel::from_snapshot(&snapshot).unwrap();
    let mut rebalancer = RebalanceConfig::default().build_rebalancer();
    let options = OptimizationOptions::default().with_excluded_topics(["orders"]);

    let outcome = rebalancer.generate_plan(&cluster, &options).unwrap();

    assert!(outcome
        .plan
        .actions
        .iter()
        .all(|c| c.action.topic_partition().topic != "orders"));
}

#[test]
fn action_cap_truncates_the_plan() {
    let cluster = ClusterModel::from_snapshot(&rack_skewed()).unwrap();
    let mut rebalancer = RebalanceConfig::default().build_rebalancer();
    let options = OptimizationOptions::default().with_max_actions(3);

    let outcome = rebalancer.generate_plan(&cluster, &options).unwrap();

    assert_eq!(outcome.plan.actions.len(), 3);
}

#[test]
fn plan_batches_never_share_a_broker() {
    let cluster = ClusterModel::from_snapshot(&rack_skewed()).unwrap();
    let mut rebalancer = RebalanceConfig::default().build_rebalancer();
    let outcome = rebalancer
        .generate_plan(&cluster, &OptimizationOptions::default())
        .unwrap();

    let batches = outcome.plan.batch_actions(4);
    let total: usize = batches.iter().map(Vec::len).sum();
    assert_eq!(total, outcome.plan.actions.len());
    for batch in batches {
        assert!(batch.len() <= 4);
        let mut seen = std::collections::BTreeSet::new();
        for committed in batch {
            for broker in committed.action.affected_brokers() {
                assert!(seen.insert(broker));
            }
        }
    }
}

#[test]
fn snapshot_json_drives_a_full_run() {
    let json = r#"{
        "brokers": [
            {"id": 1, "rack": "a", "log_dirs": [{"name": "/data", "capacity_bytes": 1000, "used_bytes": 950}]},
            {"id": 2, "rack": "b", "log_dirs": [{"name": "/data", "capacity_bytes": 1000}]},
            {"id": 3, "rack": "c", "log_dirs": [{"name": "/data", "capacity_bytes": 1000}]}
        ],
        "partitions": [
            {"topic": "events", "partition": 0, "leader": 1,
             "replicas": [{"broker_id": 1, "log_dir": "/data", "size_bytes": 600}]},
            {"topic": "events", "partition": 1, "leader": 1,
             "replicas": [{"broker_id": 1, "log_dir": "/data", "size_bytes": 300}]}
        ]
    }"#;
    let snapshot = ClusterSnapshot::from_json_str(json).unwrap();
    let config = RebalanceConfig::from_json_str(r#"{"goals": [{"goal": "disk_capacity"}]}"#).unwrap();

    let outcome = config
        .build_rebalancer()
        .plan_for_snapshot(&snapshot, &config.options)
        .unwrap();

    assert_eq!(outcome.plan.actions.len(), 1);
    assert_eq!(outcome.plan.total_data_transfer_bytes, 600);
    assert_eq!(outcome.plan.metadata.goals_used, vec!["DiskCapacityGoal".to_string()]);
    let plan_json = serde_json::to_string(&outcome.plan).unwrap();
    assert!(plan_json.contains("REPLICA_MOVEMENT"));
}

#[test]
fn inconsistent_snapshot_is_refused() {
    let snapshot = ClusterSnapshot::new()
        .with_broker(1, None, &[("/d1", 1000)])
        .with_partition("T", 0, &[(2, "/d1", 10)], 2);

    let mut rebalancer = RebalanceConfig::default().build_rebalancer();
    let result = rebalancer.plan_for_snapshot(&snapshot, &OptimizationOptions::default());

    assert!(matches!(
        result,
        Err(RebalancerError::Model(ModelError::UnknownBroker(2)))
    ));
}
