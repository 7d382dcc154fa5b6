//! Projection of recorded metadata endpoint documents
//!
//! The fixtures mirror what the v4 endpoint returns on Fargate (cumulative
//! CPU nanoseconds, `file` page cache) and on EC2 (per-core ticks, `cache`
//! page cache, a null stats entry for a stopped container).

use exporter_lib::projection::{ClockTickRate, Diagnostic, Projection, Projector};
use exporter_lib::{TaskMetadata, TaskMetricsCollector, TaskStats};
use prometheus::{Encoder, Registry, TextEncoder};

const FARGATE_METADATA: &str = include_str!("fixtures/fargate_task_metadata.json");
const FARGATE_STATS: &str = include_str!("fixtures/fargate_task_stats.json");
const EC2_METADATA: &str = include_str!("fixtures/ec2_task_metadata.json");
const EC2_STATS: &str = include_str!("fixtures/ec2_task_stats.json");

fn project(metadata: &str, stats: &str) -> Projection {
    let metadata: TaskMetadata = serde_json::from_str(metadata).unwrap();
    let stats: TaskStats = serde_json::from_str(stats).unwrap();
    Projector::new(ClockTickRate::new(100)).project(&metadata, &stats)
}

fn exposition(projection: Projection) -> String {
    let registry = Registry::new();
    let collector = TaskMetricsCollector::new().unwrap();
    registry.register(Box::new(collector.clone())).unwrap();
    collector.publish(projection.observations).unwrap();

    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .unwrap();
    String::from_utf8(buffer).unwrap()
}

fn sample<'a>(text: &'a str, series: &str) -> Option<&'a str> {
    text.lines()
        .find(|line| line.starts_with(series) && line[series.len()..].starts_with(' '))
        .map(|line| line[series.len() + 1..].trim())
}

#[test]
fn test_fargate_task() {
    let projection = project(FARGATE_METADATA, FARGATE_STATS);

    // 7 task level, 1 cpu + 3 memory + 8 network for the one container with stats
    assert_eq!(projection.observations.len(), 7 + 12);
    assert_eq!(
        projection.diagnostics,
        vec![Diagnostic::MissingStats {
            container_id: "158d1c8083dd49d6b527399fd6414f5c-1234567890".to_string(),
            container_name: "~internal~ecs~pause".to_string(),
        }]
    );

    let text = exposition(projection);

    assert_eq!(sample(&text, "ecs_task_cpu_limit_vcpus"), Some("0.25"));
    assert_eq!(sample(&text, "ecs_task_memory_limit_bytes"), Some("536870912"));
    assert_eq!(
        sample(&text, "ecs_task_ephemeral_storage_used_bytes"),
        Some("273678336")
    );
    assert_eq!(
        sample(
            &text,
            "ecs_container_cpu_usage_seconds_total{container_name=\"curl\"}"
        ),
        Some("0.15")
    );
    assert_eq!(
        sample(
            &text,
            "ecs_container_memory_limit_bytes{container_name=\"curl\"}"
        ),
        Some("134217728")
    );
    assert_eq!(
        sample(
            &text,
            "ecs_container_memory_page_cache_size_bytes{container_name=\"curl\"}"
        ),
        Some("1576960")
    );
    assert_eq!(
        sample(&text, "ecs_network_transmit_packets_total{interface=\"eth1\"}"),
        Some("40")
    );

    let pull_start: f64 = sample(&text, "ecs_task_image_pull_start_timestamp_seconds")
        .unwrap()
        .parse()
        .unwrap();
    assert!((pull_start - 1_601_599_386.2026).abs() < 1e-3);
    assert!(!text.contains("pause"));
}

#[test]
fn test_ec2_task() {
    let projection = project(EC2_METADATA, EC2_STATS);

    // info + task memory limit, 2 cores + 3 memory + 8 network
    assert_eq!(projection.observations.len(), 2 + 13);
    assert_eq!(projection.diagnostics.len(), 1);

    let text = exposition(projection);

    assert!(sample(&text, "ecs_task_cpu_limit_vcpus").is_none());
    assert_eq!(
        sample(
            &text,
            "ecs_container_cpu_usage_seconds_total{container_name=\"app\",cpu=\"0\"}"
        ),
        Some("10")
    );
    assert_eq!(
        sample(
            &text,
            "ecs_container_cpu_usage_seconds_total{container_name=\"app\",cpu=\"1\"}"
        ),
        Some("20")
    );
    // No container memory limit, so the task limit applies
    assert_eq!(
        sample(
            &text,
            "ecs_container_memory_limit_bytes{container_name=\"app\"}"
        ),
        Some("536870912")
    );
    assert_eq!(
        sample(
            &text,
            "ecs_network_receive_packets_dropped_total{interface=\"eth0\"}"
        ),
        Some("1")
    );
    assert!(!text.contains("migrations"));
}

#[test]
fn test_cpu_series_share_one_family() {
    let text = exposition(project(EC2_METADATA, EC2_STATS));

    let type_lines = text
        .lines()
        .filter(|l| l.starts_with("# TYPE ecs_container_cpu_usage_seconds_total "))
        .count();
    assert_eq!(type_lines, 1);
}
