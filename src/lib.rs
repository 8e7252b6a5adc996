//! Thread-level CPU telemetry for the running process.
//!
//! This crate measures the CPU consumption of the current process by
//! enumerating its threads through the kernel's accounting interfaces,
//! reading each thread's accumulated scheduling statistics, and aggregating
//! them into a point-in-time snapshot. The snapshot feeds two Prometheus
//! instruments: a cumulative CPU-time counter and a utilization gauge.
//!
//! The sampling core lives in [`sampler`]; the Prometheus binding lives in
//! [`collector`]. The bundled binary serves the collector over HTTP, but the
//! collector can just as well be registered on any application's own
//! registry:
//!
//! ```no_run
//! use herakles_proc_cpu_exporter::collector::CpuSamplerCollector;
//! use prometheus::Registry;
//!
//! # fn main() -> Result<(), prometheus::Error> {
//! let registry = Registry::new();
//! CpuSamplerCollector::for_current_process()?.register(&registry)?;
//!
//! // Every gather() re-samples the process's threads and refreshes both
//! // instruments.
//! let families = registry.gather();
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod sampler;
