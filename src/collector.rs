//! Prometheus binding for the thread CPU sampler.
//!
//! [`CpuSamplerCollector`] owns the two CPU instruments and implements
//! `prometheus::core::Collector`, so every `Registry::gather()` — one
//! collection cycle of the scrape pipeline — drives a fresh sampling pass
//! and refreshes both instruments before their families are returned.

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{CounterVec, GaugeVec, IntCounter, Opts, Registry};
use tracing::warn;

use crate::sampler::{platform_thread_stats, sample, ThreadStats};

/// Cumulative CPU time counter, labeled by `state` (`user`/`system`).
pub const CPU_TIME_METRIC: &str = "system_cpu_time_seconds_total";
/// Instantaneous CPU utilization gauge, labeled by `state` (`user`).
pub const CPU_UTILIZATION_METRIC: &str = "system_cpu_utilization_percent";
/// Internal exporter telemetry: sampling cycles lost to enumeration failure.
pub const SAMPLE_FAILURES_METRIC: &str = "herakles_proc_cpu_sample_failures_total";

const STATE_LABEL: &str = "state";
const STATE_USER: &str = "user";
const STATE_SYSTEM: &str = "system";

/// Collector publishing per-process CPU time and utilization.
///
/// The instruments are created once and live as long as the collector; the
/// registry owns the collector after [`register`](Self::register), so they
/// are process-wide for the registry's lifetime.
///
/// Counter semantics: each collection cycle adds the *entire* accumulated
/// user/system CPU time of the process to `system_cpu_time_seconds_total`,
/// not the delta since the previous cycle. The exported series therefore
/// grows by the full accumulated total on every scrape, which overstates
/// consumption across cycles. Downstream consumers needing wall-clock CPU
/// seconds should rely on the utilization gauge until this contract is
/// revisited.
pub struct CpuSamplerCollector {
    stats: Box<dyn ThreadStats>,
    cpu_time: CounterVec,
    utilization: GaugeVec,
    sample_failures: IntCounter,
}

impl CpuSamplerCollector {
    /// Creates the collector and its instruments around the given thread
    /// statistics source.
    pub fn new(stats: Box<dyn ThreadStats>) -> Result<Self, prometheus::Error> {
        let cpu_time = CounterVec::new(
            Opts::new(
                CPU_TIME_METRIC,
                "Accumulated CPU time of the process's threads in seconds",
            ),
            &[STATE_LABEL],
        )?;
        let utilization = GaugeVec::new(
            Opts::new(
                CPU_UTILIZATION_METRIC,
                "CPU utilization summed over the process's non-idle threads in percent",
            ),
            &[STATE_LABEL],
        )?;
        let sample_failures = IntCounter::new(
            SAMPLE_FAILURES_METRIC,
            "Sampling cycles that failed to enumerate the process's threads",
        )?;

        Ok(Self {
            stats,
            cpu_time,
            utilization,
            sample_failures,
        })
    }

    /// Creates the collector around the thread statistics source for the
    /// current target OS.
    pub fn for_current_process() -> Result<Self, prometheus::Error> {
        Self::new(Box::new(platform_thread_stats()))
    }

    /// One-time registration with the scrape pipeline's registry.
    ///
    /// Registering a second collector with the same instrument identities is
    /// a caller error and surfaces as `prometheus::Error::AlreadyReg`.
    pub fn register(self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self))
    }
}

impl Collector for CpuSamplerCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.cpu_time
            .desc()
            .into_iter()
            .chain(self.utilization.desc())
            .chain(self.sample_failures.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let snapshot = sample(self.stats.as_ref());

        if snapshot.is_failure() {
            // Skip both instruments this cycle rather than recording the
            // sentinel's negative components.
            warn!("thread enumeration failed, skipping CPU instruments for this cycle");
            self.sample_failures.inc();
        } else {
            self.utilization
                .with_label_values(&[STATE_USER])
                .set(snapshot.usage_percent);
            self.cpu_time
                .with_label_values(&[STATE_SYSTEM])
                .inc_by(snapshot.system_seconds);
            self.cpu_time
                .with_label_values(&[STATE_USER])
                .inc_by(snapshot.user_seconds);
        }

        let mut families = self.cpu_time.collect();
        families.extend(self.utilization.collect());
        families.extend(self.sample_failures.collect());
        families
    }
}
