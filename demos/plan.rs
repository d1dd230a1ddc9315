use logdir_rebalancer::*;
use std::collections::BTreeMap;

use tracing_subscriber::prelude::*;

fn main() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Kafka Log-Dir Rebalancer - Example Usage\n");

    // A config file path may be given as the first argument
    let config = match std::env::args().nth(1) {
        Some(path) => match RebalanceConfig::from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path, e);
                return;
            }
        },
        None => RebalanceConfig::default(),
    };

    let cluster = match ClusterModel::from_snapshot(&create_sample_snapshot()) {
        Ok(cluster) => cluster,
        Err(e) => {
            eprintln!("Invalid sample cluster: {}", e);
            return;
        }
    };

    let mut rebalancer = config.build_rebalancer();

    println!("=== Checking for Goal Violations ===");
    let violations = rebalancer.check_violations(&cluster);
    if violations.is_empty() {
        println!("No violations found!");
    } else {
        for violation in &violations {
            println!(
                "[{:?}] {} - {}",
                violation.severity, violation.goal_name, violation.description
            );
        }
    }

    println!("\n=== Generating Rebalance Plan ===");
    let outcome = match rebalancer.generate_plan(&cluster, &config.options) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Failed to generate plan: {}", e);
            return;
        }
    };
    let plan = &outcome.plan;
    println!("{}\n", plan.summary());

    if plan.is_empty() {
        println!("No rebalancing needed - cluster is already balanced!");
        return;
    }

    println!("Actions per goal:");
    for (goal, count) in &plan.actions_per_goal {
        println!("  {}: {}", goal, count);
    }

    println!("\n=== Proposed Actions (showing first 20) ===");
    for (i, committed) in plan.actions.iter().take(20).enumerate() {
        println!("{}. [{}] {}", i + 1, committed.goal, committed.action);
    }
    if plan.actions.len() > 20 {
        println!("... and {} more actions", plan.actions.len() - 20);
    }

    println!("\n=== Batched Execution (max 5 concurrent) ===");
    let batches = plan.batch_actions(5);
    println!("Total batches: {}", batches.len());
    for (i, batch) in batches.iter().take(5).enumerate() {
        println!("  Batch {}: {} actions", i + 1, batch.len());
    }
    if batches.len() > 5 {
        println!("  ... and {} more batches", batches.len() - 5);
    }

    println!("\n=== Replica Distribution (before -> after) ===");
    let before = replica_counts(&cluster);
    for (broker, after) in replica_counts(&outcome.cluster) {
        println!("  Broker {}: {} -> {}", broker, before.get(&broker).copied().unwrap_or(0), after);
    }

    println!("\n=== Goal Report ===");
    for report in rebalancer.goal_report(&outcome.cluster) {
        println!("  {}", report.summary());
    }

    match serde_json::to_string_pretty(plan) {
        Ok(json) => println!("\n=== Plan JSON ===\n{}", json),
        Err(e) => eprintln!("Failed to serialize plan: {}", e),
    }
}

fn replica_counts(cluster: &ClusterModel) -> BTreeMap<BrokerId, usize> {
    cluster.brokers().map(|b| (b.id, b.replica_count())).collect()
}

fn create_sample_snapshot() -> ClusterSnapshot {
    const GB: u64 = 1 << 30;

    // Brokers 0, 1 in rack-0
    // Broker 2 in rack-1
    // Brokers 3, 4 in rack-2
    let mut snapshot = ClusterSnapshot::new();
    for i in 0..5 {
        let rack = match i {
            0 | 1 => "rack-0",
            2 => "rack-1",
            _ => "rack-2",
        };
        snapshot = snapshot.with_broker(i, Some(rack), &[("/data/1", 500 * GB), ("/data/2", 500 * GB)]);
    }

    // Imbalanced on purpose: rack collisions on every third partition and
    // most data on brokers 0-2
    for topic_idx in 0..5 {
        let topic = format!("topic-{}", topic_idx);
        for partition in 0..12u32 {
            let brokers: [BrokerId; 3] = match partition % 3 {
                0 => [0, 1, 2],
                1 => [0, 2, 3],
                _ => [1, 2, 4],
            };
            let dir = if partition % 2 == 0 { "/data/1" } else { "/data/2" };
            let size = (5 + (partition as u64 % 4) * 5) * GB;
            let replicas: Vec<(BrokerId, &str, u64)> = brokers.iter().map(|b| (*b, dir, size)).collect();
            snapshot = snapshot.with_partition(topic.as_str(), partition, &replicas, brokers[0]);
        }
    }
    snapshot
}
