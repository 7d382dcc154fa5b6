//! Task metadata and task stats documents served by the ECS metadata endpoint
//!
//! Field names follow the v4 endpoint responses. EC2 and Fargate return
//! slightly different task documents, so most identity fields default to
//! an empty string instead of failing the decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Response of `GET {endpoint}/task`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskMetadata {
    #[serde(default)]
    pub cluster: String,
    #[serde(rename = "TaskARN", default)]
    pub task_arn: String,
    #[serde(default)]
    pub family: String,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub desired_status: String,
    #[serde(default)]
    pub known_status: String,
    #[serde(default)]
    pub availability_zone: String,
    #[serde(default)]
    pub launch_type: String,
    /// Task level limits are optional on EC2, where they may only exist per container
    #[serde(default)]
    pub limits: Option<TaskLimits>,
    /// Only reported on Fargate
    #[serde(default)]
    pub ephemeral_storage_metrics: Option<EphemeralStorage>,
    #[serde(default)]
    pub pull_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pull_stopped_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub containers: Vec<ContainerMetadata>,
}

impl TaskMetadata {
    /// Task CPU limit in vCPUs
    pub fn cpu_limit(&self) -> Option<f64> {
        self.limits.as_ref().and_then(|l| l.cpu)
    }

    /// Task memory limit in MiB
    pub fn memory_limit_mib(&self) -> Option<u64> {
        self.limits.as_ref().and_then(|l| l.memory)
    }
}

/// Resource limits, shared by the task and container documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskLimits {
    #[serde(rename = "CPU", default)]
    pub cpu: Option<f64>,
    /// Mebibytes
    #[serde(rename = "Memory", default)]
    pub memory: Option<u64>,
}

/// Ephemeral storage block, in mebibytes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EphemeralStorage {
    pub utilized: u64,
    pub reserved: u64,
}

/// One container of the task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerMetadata {
    /// Key into the task stats document
    pub docker_id: String,
    pub name: String,
    #[serde(default)]
    pub limits: Option<TaskLimits>,
}

impl ContainerMetadata {
    /// Container memory limit in MiB, when configured on the container itself
    pub fn memory_limit_mib(&self) -> Option<u64> {
        self.limits.as_ref().and_then(|l| l.memory)
    }
}

/// Response of `GET {endpoint}/task/stats`
///
/// The endpoint reports `null` for containers without stats yet; those
/// entries behave exactly like missing ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStats(HashMap<String, Option<ContainerStats>>);

impl TaskStats {
    pub fn new(entries: HashMap<String, Option<ContainerStats>>) -> Self {
        Self(entries)
    }

    /// Stats for a container, if the endpoint reported any
    pub fn get(&self, docker_id: &str) -> Option<&ContainerStats> {
        self.0.get(docker_id).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, ContainerStats)> for TaskStats {
    fn from_iter<I: IntoIterator<Item = (String, ContainerStats)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(id, s)| (id, Some(s))).collect())
    }
}

/// Docker-style runtime stats for one container
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerStats {
    #[serde(default, deserialize_with = "reported_cpu_stats")]
    pub cpu_stats: Option<CpuStats>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub memory_stats: MemoryStats,
    #[serde(default, deserialize_with = "null_as_default")]
    pub networks: BTreeMap<String, NetworkInterfaceStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuStats {
    pub cpu_usage: CpuUsage,
}

/// Cumulative CPU time, in one of two mutually exclusive shapes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCpuUsage", into = "RawCpuUsage")]
pub enum CpuUsage {
    /// Single cumulative counter in nanoseconds
    Total { nanoseconds: u64 },
    /// Per-core cumulative counters in clock ticks
    PerCore { ticks: Vec<u64> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawCpuUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    total_usage: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    percpu_usage: Option<Vec<u64>>,
}

impl TryFrom<RawCpuUsage> for CpuUsage {
    type Error = String;

    fn try_from(raw: RawCpuUsage) -> Result<Self, Self::Error> {
        match (raw.percpu_usage, raw.total_usage) {
            (Some(ticks), _) if !ticks.is_empty() => Ok(CpuUsage::PerCore { ticks }),
            (_, Some(nanoseconds)) => Ok(CpuUsage::Total { nanoseconds }),
            _ => Err("cpu_usage reports neither total_usage nor percpu_usage".to_string()),
        }
    }
}

impl From<CpuUsage> for RawCpuUsage {
    fn from(usage: CpuUsage) -> Self {
        match usage {
            CpuUsage::Total { nanoseconds } => RawCpuUsage {
                total_usage: Some(nanoseconds),
                percpu_usage: None,
            },
            CpuUsage::PerCore { ticks } => RawCpuUsage {
                total_usage: None,
                percpu_usage: Some(ticks),
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    /// Bytes
    #[serde(default)]
    pub usage: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub stats: HashMap<String, u64>,
}

impl MemoryStats {
    /// Page cache component of the usage in bytes
    ///
    /// cgroup v1 reports it as `cache`, cgroup v2 as `file`.
    pub fn page_cache_bytes(&self) -> u64 {
        self.stats
            .get("cache")
            .or_else(|| self.stats.get("file"))
            .copied()
            .unwrap_or(0)
    }
}

/// Cumulative counters for one network interface
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceStats {
    #[serde(default)]
    pub rx_bytes: u64,
    #[serde(default)]
    pub rx_packets: u64,
    #[serde(default)]
    pub rx_dropped: u64,
    #[serde(default)]
    pub rx_errors: u64,
    #[serde(default)]
    pub tx_bytes: u64,
    #[serde(default)]
    pub tx_packets: u64,
    #[serde(default)]
    pub tx_dropped: u64,
    #[serde(default)]
    pub tx_errors: u64,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A `cpu_stats` block without usable counters reads as absent
fn reported_cpu_stats<'de, D>(deserializer: D) -> Result<Option<CpuStats>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct RawCpuStats {
        #[serde(default)]
        cpu_usage: Option<RawCpuUsage>,
    }

    Ok(Option::<RawCpuStats>::deserialize(deserializer)?
        .and_then(|raw| raw.cpu_usage)
        .and_then(|usage| CpuUsage::try_from(usage).ok())
        .map(|cpu_usage| CpuStats { cpu_usage }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_usage_prefers_per_core_counters() {
        let usage: CpuUsage =
            serde_json::from_str(r#"{"total_usage": 3000, "percpu_usage": [1000, 2000]}"#)
                .unwrap();
        assert_eq!(
            usage,
            CpuUsage::PerCore {
                ticks: vec![1000, 2000]
            }
        );
    }

    #[test]
    fn test_cpu_usage_empty_per_core_falls_back_to_total() {
        let usage: CpuUsage =
            serde_json::from_str(r#"{"total_usage": 3000, "percpu_usage": []}"#).unwrap();
        assert_eq!(usage, CpuUsage::Total { nanoseconds: 3000 });

        let usage: CpuUsage =
            serde_json::from_str(r#"{"total_usage": 42, "percpu_usage": null}"#).unwrap();
        assert_eq!(usage, CpuUsage::Total { nanoseconds: 42 });
    }

    #[test]
    fn test_cpu_usage_without_counters_is_rejected() {
        let result = serde_json::from_str::<CpuUsage>(r#"{"usage_in_kernelmode": 10}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_cpu_stats_without_counters_read_as_absent() {
        let stats: ContainerStats = serde_json::from_str(
            r#"{"cpu_stats": {"cpu_usage": {}, "online_cpus": 2}, "memory_stats": {"usage": 5}}"#,
        )
        .unwrap();
        assert!(stats.cpu_stats.is_none());
        assert_eq!(stats.memory_stats.usage, 5);

        let stats: ContainerStats =
            serde_json::from_str(r#"{"cpu_stats": {"cpu_usage": {"total_usage": 9}}}"#).unwrap();
        assert_eq!(
            stats.cpu_stats.unwrap().cpu_usage,
            CpuUsage::Total { nanoseconds: 9 }
        );
    }

    #[test]
    fn test_null_memory_stats_read_as_empty() {
        let stats: TaskStats = serde_json::from_str(
            r#"{"c1": {"memory_stats": null, "networks": {"eth0": {"rx_bytes": 1}}}}"#,
        )
        .unwrap();

        let c1 = stats.get("c1").unwrap();
        assert_eq!(c1.memory_stats, MemoryStats::default());
        assert_eq!(c1.networks["eth0"].rx_bytes, 1);
    }

    #[test]
    fn test_page_cache_reads_cgroup_v1_then_v2_key() {
        let mut stats = MemoryStats::default();
        assert_eq!(stats.page_cache_bytes(), 0);

        stats.stats.insert("file".to_string(), 2048);
        assert_eq!(stats.page_cache_bytes(), 2048);

        stats.stats.insert("cache".to_string(), 4096);
        assert_eq!(stats.page_cache_bytes(), 4096);
    }

    #[test]
    fn test_task_stats_null_entry_is_missing() {
        let stats: TaskStats =
            serde_json::from_str(r#"{"abc": null, "def": {"memory_stats": {"usage": 1}}}"#)
                .unwrap();
        assert_eq!(stats.len(), 2);
        assert!(stats.get("abc").is_none());
        assert_eq!(stats.get("def").unwrap().memory_stats.usage, 1);
        assert!(stats.get("ghi").is_none());
    }

    #[test]
    fn test_task_metadata_optional_blocks() {
        let metadata: TaskMetadata = serde_json::from_str(
            r#"{
                "Cluster": "prod",
                "TaskARN": "arn:aws:ecs:us-east-1:123456789012:task/prod/abc",
                "Family": "web",
                "Revision": "7",
                "Limits": {"CPU": 0.5},
                "PullStartedAt": "2023-11-14T22:13:20.5Z",
                "Containers": [{"DockerId": "c1", "Name": "app", "Limits": {"CPU": 0}}]
            }"#,
        )
        .unwrap();

        assert_eq!(metadata.task_arn, "arn:aws:ecs:us-east-1:123456789012:task/prod/abc");
        assert_eq!(metadata.cpu_limit(), Some(0.5));
        assert_eq!(metadata.memory_limit_mib(), None);
        assert!(metadata.ephemeral_storage_metrics.is_none());
        assert!(metadata.pull_started_at.is_some());
        assert!(metadata.pull_stopped_at.is_none());
        assert_eq!(metadata.containers[0].memory_limit_mib(), None);
    }
}
