//! Projection of task metadata and task stats into observations
//!
//! The production rules run in a fixed order so the output is deterministic
//! for a given pair of documents. Optional fields only suppress the
//! observations that depend on them; projection itself never fails.

use super::catalog::{self, Observation};
use super::clock_tick::ClockTickRate;
use crate::models::{
    ContainerMetadata, ContainerStats, CpuUsage, NetworkInterfaceStats, TaskMetadata, TaskStats,
};
use chrono::{DateTime, Utc};

const BYTES_PER_MIB: f64 = 1_048_576.0;
const NANOS_PER_SECOND: f64 = 1e9;

/// Recoverable condition found while projecting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The container has no entry (or a null entry) in the task stats
    MissingStats {
        container_id: String,
        container_name: String,
    },
    /// Neither the container nor the task configures a memory limit
    MissingMemoryLimit { container_name: String },
}

/// Output of one projection pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    pub observations: Vec<Observation>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Projection {
    fn push(&mut self, observation: Observation) {
        self.observations.push(observation);
    }
}

/// Stateless projection engine
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector {
    clock_ticks: ClockTickRate,
}

impl Projector {
    pub fn new(clock_ticks: ClockTickRate) -> Self {
        Self { clock_ticks }
    }

    /// Project one metadata/stats pair
    pub fn project(&self, metadata: &TaskMetadata, stats: &TaskStats) -> Projection {
        let mut projection = Projection::default();

        project_task(metadata, &mut projection);

        for container in &metadata.containers {
            let Some(container_stats) = stats.get(&container.docker_id) else {
                projection.diagnostics.push(Diagnostic::MissingStats {
                    container_id: container.docker_id.clone(),
                    container_name: container.name.clone(),
                });
                continue;
            };

            self.project_cpu(container, container_stats, &mut projection);
            project_memory(metadata, container, container_stats, &mut projection);
            project_network(container_stats, &mut projection);
        }

        projection
    }

    fn project_cpu(
        &self,
        container: &ContainerMetadata,
        stats: &ContainerStats,
        out: &mut Projection,
    ) {
        let name = container.name.as_str();

        match stats.cpu_stats.as_ref().map(|cpu| &cpu.cpu_usage) {
            Some(CpuUsage::Total { nanoseconds }) => {
                let seconds = *nanoseconds as f64 / NANOS_PER_SECOND;
                out.push(catalog::CONTAINER_CPU_SECONDS.observe([name], seconds));
            }
            Some(CpuUsage::PerCore { ticks }) => {
                for (core, core_ticks) in ticks.iter().enumerate() {
                    let core = core.to_string();
                    let labels = [name, core.as_str()];
                    let seconds = self.clock_ticks.to_seconds(*core_ticks);
                    out.push(catalog::CONTAINER_CPU_SECONDS_PER_CORE.observe(labels, seconds));
                }
            }
            None => {}
        }
    }
}

fn project_task(metadata: &TaskMetadata, out: &mut Projection) {
    out.push(catalog::TASK_METADATA_INFO.observe(
        [
            &metadata.cluster,
            &metadata.task_arn,
            &metadata.family,
            &metadata.revision,
            &metadata.desired_status,
            &metadata.known_status,
            &metadata.availability_zone,
            &metadata.launch_type,
        ],
        1.0,
    ));

    // vCPUs are passed through as configured
    if let Some(cpu) = metadata.cpu_limit() {
        out.push(catalog::TASK_CPU_LIMIT.observe([], cpu));
    }

    if let Some(memory) = metadata.memory_limit_mib() {
        out.push(catalog::TASK_MEMORY_LIMIT.observe([], mib_to_bytes(memory)));
    }

    if let Some(storage) = &metadata.ephemeral_storage_metrics {
        let used = mib_to_bytes(storage.utilized);
        let allocated = mib_to_bytes(storage.reserved);
        out.push(catalog::TASK_EPHEMERAL_STORAGE_USED.observe([], used));
        out.push(catalog::TASK_EPHEMERAL_STORAGE_ALLOCATED.observe([], allocated));
    }

    if let Some(started) = &metadata.pull_started_at {
        out.push(catalog::TASK_IMAGE_PULL_START.observe([], epoch_seconds(started)));
    }

    if let Some(stopped) = &metadata.pull_stopped_at {
        out.push(catalog::TASK_IMAGE_PULL_STOP.observe([], epoch_seconds(stopped)));
    }
}

fn project_memory(
    metadata: &TaskMetadata,
    container: &ContainerMetadata,
    stats: &ContainerStats,
    out: &mut Projection,
) {
    let labels = [container.name.as_str()];
    let usage = stats.memory_stats.usage as f64;
    let page_cache = stats.memory_stats.page_cache_bytes() as f64;

    out.push(catalog::CONTAINER_MEMORY_USAGE.observe(labels, usage));
    out.push(catalog::CONTAINER_MEMORY_PAGE_CACHE.observe(labels, page_cache));

    // The container limit overrides the task limit
    let task_limit = metadata.memory_limit_mib();
    match container.memory_limit_mib().or(task_limit) {
        Some(limit) => {
            let bytes = mib_to_bytes(limit);
            out.push(catalog::CONTAINER_MEMORY_LIMIT.observe(labels, bytes));
        }
        None => out.diagnostics.push(Diagnostic::MissingMemoryLimit {
            container_name: container.name.clone(),
        }),
    }
}

/// Interfaces are shared by every container in the task network namespace,
/// so they are labeled by interface only. Containers sharing an interface
/// report the same counters and produce identical observations.
fn project_network(stats: &ContainerStats, out: &mut Projection) {
    for (interface, net) in &stats.networks {
        let NetworkInterfaceStats {
            rx_bytes,
            rx_packets,
            rx_dropped,
            rx_errors,
            tx_bytes,
            tx_packets,
            tx_dropped,
            tx_errors,
        } = *net;
        let labels = [interface.as_str()];

        out.push(catalog::NETWORK_RECEIVE_BYTES.observe(labels, rx_bytes as f64));
        out.push(catalog::NETWORK_RECEIVE_PACKETS.observe(labels, rx_packets as f64));
        out.push(catalog::NETWORK_RECEIVE_DROPPED.observe(labels, rx_dropped as f64));
        out.push(catalog::NETWORK_RECEIVE_ERRORS.observe(labels, rx_errors as f64));
        out.push(catalog::NETWORK_TRANSMIT_BYTES.observe(labels, tx_bytes as f64));
        out.push(catalog::NETWORK_TRANSMIT_PACKETS.observe(labels, tx_packets as f64));
        out.push(catalog::NETWORK_TRANSMIT_DROPPED.observe(labels, tx_dropped as f64));
        out.push(catalog::NETWORK_TRANSMIT_ERRORS.observe(labels, tx_errors as f64));
    }
}

fn mib_to_bytes(mib: u64) -> f64 {
    mib as f64 * BYTES_PER_MIB
}

/// Unix epoch seconds with sub-second precision
fn epoch_seconds(at: &DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) / NANOS_PER_SECOND
}
