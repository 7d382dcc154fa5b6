//! Projection of ECS task documents into Prometheus observations
//!
//! - `catalog`: the fixed inventory of metric identities
//! - `engine`: the production rules turning documents into observations
//! - `clock_tick`: host clock tick rate used for per-core CPU counters

pub mod catalog;
mod clock_tick;
mod engine;

pub use catalog::{MetricDescriptor, MetricKind, Observation};
pub use clock_tick::ClockTickRate;
pub use engine::{Diagnostic, Projection, Projector};
