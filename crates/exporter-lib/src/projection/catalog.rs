//! Metric catalog
//!
//! Every metric the projection may emit is declared here exactly once. The
//! label arity is part of the type (`Metric<N>`), so an observation can only
//! be built with the right number of label values.

use prometheus::proto::MetricType;

/// Prometheus metric kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Gauge,
    Counter,
}

impl MetricKind {
    pub fn as_proto(self) -> MetricType {
        match self {
            MetricKind::Gauge => MetricType::GAUGE,
            MetricKind::Counter => MetricType::COUNTER,
        }
    }
}

/// Name, help, kind and ordered label names of one metric identity
#[derive(Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub label_names: &'static [&'static str],
}

/// A catalog entry bound to its label arity
#[derive(Debug)]
pub struct Metric<const N: usize> {
    descriptor: MetricDescriptor,
}

impl<const N: usize> Metric<N> {
    const fn new(
        name: &'static str,
        help: &'static str,
        kind: MetricKind,
        label_names: &'static [&'static str; N],
    ) -> Self {
        Self {
            descriptor: MetricDescriptor {
                name,
                help,
                kind,
                label_names,
            },
        }
    }

    const fn gauge(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str; N],
    ) -> Self {
        Self::new(name, help, MetricKind::Gauge, label_names)
    }

    const fn counter(
        name: &'static str,
        help: &'static str,
        label_names: &'static [&'static str; N],
    ) -> Self {
        Self::new(name, help, MetricKind::Counter, label_names)
    }

    pub fn descriptor(&'static self) -> &'static MetricDescriptor {
        &self.descriptor
    }

    /// Build an observation with label values in catalog order
    pub fn observe(&'static self, label_values: [&str; N], value: f64) -> Observation {
        Observation {
            metric: &self.descriptor,
            label_values: label_values.iter().map(|v| v.to_string()).collect(),
            value,
        }
    }
}

/// One labeled sample ready for exposition
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub metric: &'static MetricDescriptor,
    /// Positionally matches `metric.label_names`
    pub label_values: Vec<String>,
    pub value: f64,
}

impl Observation {
    pub fn name(&self) -> &'static str {
        self.metric.name
    }

    /// Label value by label name
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric
            .label_names
            .iter()
            .position(|n| *n == name)
            .and_then(|i| self.label_values.get(i))
            .map(String::as_str)
    }
}

const CONTAINER: &[&str; 1] = &["container_name"];
const INTERFACE: &[&str; 1] = &["interface"];

pub static TASK_METADATA_INFO: Metric<8> = Metric::gauge(
    "ecs_task_metadata_info",
    "ECS task metadata, sourced from the task metadata endpoint version 4.",
    &[
        "cluster",
        "task_arn",
        "family",
        "revision",
        "desired_status",
        "known_status",
        "availability_zone",
        "launch_type",
    ],
);

pub static TASK_CPU_LIMIT: Metric<0> = Metric::gauge(
    "ecs_task_cpu_limit_vcpus",
    "Configured task CPU limit in vCPUs (1 vCPU = 1024 CPU units).",
    &[],
);

pub static TASK_MEMORY_LIMIT: Metric<0> = Metric::gauge(
    "ecs_task_memory_limit_bytes",
    "Configured task memory limit in bytes.",
    &[],
);

pub static TASK_EPHEMERAL_STORAGE_USED: Metric<0> = Metric::gauge(
    "ecs_task_ephemeral_storage_used_bytes",
    "Current task ephemeral storage usage in bytes.",
    &[],
);

pub static TASK_EPHEMERAL_STORAGE_ALLOCATED: Metric<0> = Metric::gauge(
    "ecs_task_ephemeral_storage_allocated_bytes",
    "Configured task ephemeral storage in bytes.",
    &[],
);

pub static TASK_IMAGE_PULL_START: Metric<0> = Metric::gauge(
    "ecs_task_image_pull_start_timestamp_seconds",
    "The time at which the task started pulling docker images for its containers.",
    &[],
);

pub static TASK_IMAGE_PULL_STOP: Metric<0> = Metric::gauge(
    "ecs_task_image_pull_stop_timestamp_seconds",
    "The time at which the task stopped pulling docker images for its containers.",
    &[],
);

const CPU_SECONDS_NAME: &str = "ecs_container_cpu_usage_seconds_total";
const CPU_SECONDS_HELP: &str = "Cumulative total container CPU usage in seconds.";

pub static CONTAINER_CPU_SECONDS: Metric<1> =
    Metric::counter(CPU_SECONDS_NAME, CPU_SECONDS_HELP, CONTAINER);

/// Same series name as `CONTAINER_CPU_SECONDS`, split by core
pub static CONTAINER_CPU_SECONDS_PER_CORE: Metric<2> =
    Metric::counter(CPU_SECONDS_NAME, CPU_SECONDS_HELP, &["container_name", "cpu"]);

pub static CONTAINER_MEMORY_USAGE: Metric<1> = Metric::gauge(
    "ecs_container_memory_usage_bytes",
    "Current container memory usage in bytes.",
    CONTAINER,
);

pub static CONTAINER_MEMORY_LIMIT: Metric<1> = Metric::gauge(
    "ecs_container_memory_limit_bytes",
    "Configured container memory limit in bytes, falling back to the task-level limit.",
    CONTAINER,
);

pub static CONTAINER_MEMORY_PAGE_CACHE: Metric<1> = Metric::gauge(
    "ecs_container_memory_page_cache_size_bytes",
    "Current container memory page cache size in bytes. This is not a subset of used bytes.",
    CONTAINER,
);

pub static NETWORK_RECEIVE_BYTES: Metric<1> = Metric::counter(
    "ecs_network_receive_bytes_total",
    "Cumulative total size of network packets received in bytes.",
    INTERFACE,
);

pub static NETWORK_RECEIVE_PACKETS: Metric<1> = Metric::counter(
    "ecs_network_receive_packets_total",
    "Cumulative total count of network packets received.",
    INTERFACE,
);

pub static NETWORK_RECEIVE_DROPPED: Metric<1> = Metric::counter(
    "ecs_network_receive_packets_dropped_total",
    "Cumulative total count of network packets dropped in receiving.",
    INTERFACE,
);

pub static NETWORK_RECEIVE_ERRORS: Metric<1> = Metric::counter(
    "ecs_network_receive_errors_total",
    "Cumulative total count of network errors in receiving.",
    INTERFACE,
);

pub static NETWORK_TRANSMIT_BYTES: Metric<1> = Metric::counter(
    "ecs_network_transmit_bytes_total",
    "Cumulative total size of network packets transmitted in bytes.",
    INTERFACE,
);

pub static NETWORK_TRANSMIT_PACKETS: Metric<1> = Metric::counter(
    "ecs_network_transmit_packets_total",
    "Cumulative total count of network packets transmitted.",
    INTERFACE,
);

pub static NETWORK_TRANSMIT_DROPPED: Metric<1> = Metric::counter(
    "ecs_network_transmit_packets_dropped_total",
    "Cumulative total count of network packets dropped in transmit.",
    INTERFACE,
);

pub static NETWORK_TRANSMIT_ERRORS: Metric<1> = Metric::counter(
    "ecs_network_transmit_errors_total",
    "Cumulative total count of network errors in transmit.",
    INTERFACE,
);

/// Every catalog entry, in exposition order
pub fn all() -> [&'static MetricDescriptor; 20] {
    [
        TASK_METADATA_INFO.descriptor(),
        TASK_CPU_LIMIT.descriptor(),
        TASK_MEMORY_LIMIT.descriptor(),
        TASK_EPHEMERAL_STORAGE_USED.descriptor(),
        TASK_EPHEMERAL_STORAGE_ALLOCATED.descriptor(),
        TASK_IMAGE_PULL_START.descriptor(),
        TASK_IMAGE_PULL_STOP.descriptor(),
        CONTAINER_CPU_SECONDS.descriptor(),
        CONTAINER_CPU_SECONDS_PER_CORE.descriptor(),
        CONTAINER_MEMORY_USAGE.descriptor(),
        CONTAINER_MEMORY_LIMIT.descriptor(),
        CONTAINER_MEMORY_PAGE_CACHE.descriptor(),
        NETWORK_RECEIVE_BYTES.descriptor(),
        NETWORK_RECEIVE_PACKETS.descriptor(),
        NETWORK_RECEIVE_DROPPED.descriptor(),
        NETWORK_RECEIVE_ERRORS.descriptor(),
        NETWORK_TRANSMIT_BYTES.descriptor(),
        NETWORK_TRANSMIT_PACKETS.descriptor(),
        NETWORK_TRANSMIT_DROPPED.descriptor(),
        NETWORK_TRANSMIT_ERRORS.descriptor(),
    ]
}
