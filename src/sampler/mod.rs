//! Per-process thread CPU sampling.
//!
//! This module enumerates the schedulable units (threads) of the running
//! process, reads each unit's accumulated scheduling statistics from the
//! kernel, and reduces them into a single [`CpuSnapshot`].
//!
//! The kernel interface differs per operating system, so the enumeration and
//! per-thread reads sit behind the [`ThreadStats`] trait with one
//! implementation per target. [`sample`] drives a full measurement against
//! any implementation and is what the Prometheus collector calls on each
//! collection cycle.

use thiserror::Error;
use tracing::debug;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
mod unsupported;

#[cfg(target_os = "linux")]
pub use linux::ProcfsThreadStats as PlatformThreadStats;
#[cfg(target_os = "macos")]
pub use macos::MachThreadStats as PlatformThreadStats;
#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub use unsupported::UnsupportedThreadStats as PlatformThreadStats;

/// Returns the thread statistics source for the current target OS.
///
/// On targets without a backend the returned source fails every enumeration,
/// so sampling degrades to [`CpuSnapshot::ENUMERATION_FAILED`] instead of
/// refusing to build.
pub fn platform_thread_stats() -> PlatformThreadStats {
    PlatformThreadStats::new()
}

/// Opaque identifier for one schedulable unit owned by the process.
///
/// On Linux this is a kernel thread id, on macOS a Mach thread port name.
/// Handles are only meaningful to the [`ThreadStats`] implementation that
/// produced them, and only until that enumeration is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThreadHandle(pub u64);

/// Accumulated scheduling statistics for one thread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThreadSample {
    /// Whether the kernel marks this unit as idle. Idle units are excluded
    /// from aggregation.
    pub idle: bool,
    /// Accumulated time executing in user mode, in seconds.
    pub user_seconds: f64,
    /// Accumulated time executing in kernel mode, in seconds.
    pub system_seconds: f64,
    /// Scheduler usage figure for this unit, in percent of one core.
    pub usage_percent: f64,
}

/// Aggregate CPU snapshot for the whole process.
///
/// Sums over all non-idle threads observed in one sampling call. The
/// per-unit usage percentages are summed as-is, so `usage_percent` exceeds
/// 100 when multiple cores are busy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuSnapshot {
    pub system_seconds: f64,
    pub user_seconds: f64,
    pub usage_percent: f64,
}

impl CpuSnapshot {
    /// Sentinel returned when the kernel could not enumerate the process's
    /// threads at all. Real aggregates are sums of non-negative values and
    /// can never collide with it.
    pub const ENUMERATION_FAILED: CpuSnapshot = CpuSnapshot {
        system_seconds: -1.0,
        user_seconds: -1.0,
        usage_percent: -1.0,
    };

    /// Whether this snapshot is the enumeration-failure sentinel.
    ///
    /// Callers must check this before treating the fields as measurements;
    /// negative components never occur otherwise.
    pub fn is_failure(&self) -> bool {
        *self == Self::ENUMERATION_FAILED
    }
}

/// Failures surfaced by a [`ThreadStats`] implementation.
#[derive(Debug, Error)]
pub enum ThreadStatsError {
    /// The kernel could not list the process's threads. Fatal for the
    /// current sampling call, which returns the sentinel snapshot.
    #[error("thread enumeration failed: {0}")]
    Enumerate(String),
    /// The kernel could not read one thread's statistics. Non-fatal: the
    /// unit is skipped and sampling continues with the remaining threads.
    #[error("thread stat read failed: {0}")]
    Read(String),
}

/// Kernel thread accounting capability, one implementation per target OS.
///
/// `Send + Sync` is part of the contract: the Prometheus collection cycle
/// may drive sampling from any thread, and concurrent calls must each work
/// on their own enumeration without shared mutable state.
pub trait ThreadStats: Send + Sync {
    /// Lists handles for every schedulable unit currently owned by the
    /// process.
    fn enumerate(&self) -> Result<Vec<ThreadHandle>, ThreadStatsError>;

    /// Reads accumulated scheduling statistics for one unit.
    fn read(&self, handle: ThreadHandle) -> Result<ThreadSample, ThreadStatsError>;

    /// Releases kernel resources backing one enumeration.
    ///
    /// Invoked exactly once per successful [`enumerate`](Self::enumerate),
    /// after the last `read` against its handles. The default is a no-op for
    /// sources whose handle lists are plain data.
    fn release(&self, handles: &[ThreadHandle]) {
        let _ = handles;
    }
}

/// Scoped owner of one enumeration's handles. Dropping it releases them,
/// which covers every exit path out of [`sample`], including an unwind from
/// a reader call.
struct ThreadList<'a> {
    stats: &'a dyn ThreadStats,
    handles: Vec<ThreadHandle>,
}

impl Drop for ThreadList<'_> {
    fn drop(&mut self) {
        self.stats.release(&self.handles);
    }
}

/// Reduces thread samples into one snapshot.
///
/// Idle units contribute nothing; ordering is irrelevant. An empty input
/// yields the all-zero snapshot, which is a valid measurement distinct from
/// [`CpuSnapshot::ENUMERATION_FAILED`].
pub fn aggregate<I>(samples: I) -> CpuSnapshot
where
    I: IntoIterator<Item = ThreadSample>,
{
    let mut snapshot = CpuSnapshot {
        system_seconds: 0.0,
        user_seconds: 0.0,
        usage_percent: 0.0,
    };

    for sample in samples {
        if sample.idle {
            continue;
        }
        snapshot.user_seconds += sample.user_seconds;
        snapshot.system_seconds += sample.system_seconds;
        snapshot.usage_percent += sample.usage_percent;
    }

    snapshot
}

/// Takes one CPU measurement of the running process.
///
/// Enumerates the process's threads, reads each one's statistics and
/// aggregates the results. Threads whose read fails are skipped; if the
/// enumeration itself fails the sentinel snapshot is returned and nothing
/// needs releasing. Each call re-measures from scratch: there is no caching
/// and no retry.
pub fn sample(stats: &dyn ThreadStats) -> CpuSnapshot {
    let handles = match stats.enumerate() {
        Ok(handles) => handles,
        Err(e) => {
            debug!("{}", e);
            return CpuSnapshot::ENUMERATION_FAILED;
        }
    };

    let list = ThreadList { stats, handles };

    let samples = list.handles.iter().filter_map(|&handle| match stats.read(handle) {
        Ok(sample) => Some(sample),
        Err(e) => {
            debug!("skipping thread {}: {}", handle.0, e);
            None
        }
    });

    aggregate(samples)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn active(user: f64, system: f64, usage: f64) -> ThreadSample {
        ThreadSample {
            idle: false,
            user_seconds: user,
            system_seconds: system,
            usage_percent: usage,
        }
    }

    fn idle(user: f64, system: f64, usage: f64) -> ThreadSample {
        ThreadSample {
            idle: true,
            ..active(user, system, usage)
        }
    }

    /// Test double: per-handle read outcomes plus a release counter.
    #[derive(Default)]
    struct FakeThreadStats {
        enumerate_fails: bool,
        reads: Vec<Option<ThreadSample>>,
        panic_on: Option<u64>,
        releases: AtomicUsize,
    }

    impl ThreadStats for FakeThreadStats {
        fn enumerate(&self) -> Result<Vec<ThreadHandle>, ThreadStatsError> {
            if self.enumerate_fails {
                return Err(ThreadStatsError::Enumerate("injected failure".into()));
            }
            Ok((0..self.reads.len() as u64).map(ThreadHandle).collect())
        }

        fn read(&self, handle: ThreadHandle) -> Result<ThreadSample, ThreadStatsError> {
            if self.panic_on == Some(handle.0) {
                panic!("injected reader panic");
            }
            self.reads[handle.0 as usize]
                .ok_or_else(|| ThreadStatsError::Read("injected failure".into()))
        }

        fn release(&self, _handles: &[ThreadHandle]) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn aggregate_excludes_idle_units() {
        let snapshot = aggregate([idle(10.0, 10.0, 100.0), active(1.0, 0.5, 50.0)]);
        assert_eq!(snapshot.system_seconds, 0.5);
        assert_eq!(snapshot.user_seconds, 1.0);
        assert_eq!(snapshot.usage_percent, 50.0);
    }

    #[test]
    fn aggregate_of_nothing_is_zero_not_sentinel() {
        let snapshot = aggregate([]);
        assert_eq!(snapshot.system_seconds, 0.0);
        assert_eq!(snapshot.user_seconds, 0.0);
        assert_eq!(snapshot.usage_percent, 0.0);
        assert!(!snapshot.is_failure());
    }

    #[test]
    fn aggregate_of_only_idle_units_is_zero() {
        let snapshot = aggregate([idle(3.0, 2.0, 40.0), idle(1.0, 1.0, 10.0)]);
        assert_eq!(snapshot, aggregate([]));
    }

    #[test]
    fn sentinel_only_matches_itself() {
        assert!(CpuSnapshot::ENUMERATION_FAILED.is_failure());
        assert!(!aggregate([active(0.0, 0.0, 0.0)]).is_failure());
        // One negative component is not the sentinel.
        let near_miss = CpuSnapshot {
            system_seconds: -1.0,
            user_seconds: 0.0,
            usage_percent: 0.0,
        };
        assert!(!near_miss.is_failure());
    }

    #[test]
    fn enumeration_failure_yields_sentinel_without_release() {
        let fake = FakeThreadStats {
            enumerate_fails: true,
            ..Default::default()
        };
        let snapshot = sample(&fake);
        assert!(snapshot.is_failure());
        assert_eq!(fake.releases.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn successful_sample_releases_exactly_once() {
        let fake = FakeThreadStats {
            reads: vec![Some(active(1.0, 1.0, 10.0)), Some(active(2.0, 0.0, 20.0))],
            ..Default::default()
        };
        let snapshot = sample(&fake);
        assert!(!snapshot.is_failure());
        assert_eq!(fake.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_read_still_releases_exactly_once() {
        let fake = FakeThreadStats {
            reads: vec![Some(active(1.0, 1.0, 10.0)), None],
            ..Default::default()
        };
        sample(&fake);
        assert_eq!(fake.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_read_still_releases() {
        let fake = FakeThreadStats {
            reads: vec![Some(active(1.0, 1.0, 10.0)), Some(active(2.0, 0.0, 20.0))],
            panic_on: Some(1),
            ..Default::default()
        };
        let result = catch_unwind(AssertUnwindSafe(|| sample(&fake)));
        assert!(result.is_err());
        assert_eq!(fake.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_reads_are_skipped_not_fatal() {
        let fake = FakeThreadStats {
            reads: vec![
                Some(active(1.0, 0.5, 10.0)),
                None,
                Some(active(2.0, 1.5, 30.0)),
            ],
            ..Default::default()
        };
        let snapshot = sample(&fake);
        assert!(!snapshot.is_failure());
        assert_eq!(snapshot.user_seconds, 3.0);
        assert_eq!(snapshot.system_seconds, 2.0);
        assert_eq!(snapshot.usage_percent, 40.0);
    }

    #[test]
    fn sample_aggregates_non_idle_units() {
        let fake = FakeThreadStats {
            reads: vec![
                Some(idle(99.0, 99.0, 100.0)),
                Some(active(2.0, 1.0, 20.0)),
                Some(active(3.0, 0.0, 30.0)),
            ],
            ..Default::default()
        };
        let snapshot = sample(&fake);
        assert_eq!(snapshot.system_seconds, 1.0);
        assert_eq!(snapshot.user_seconds, 5.0);
        assert_eq!(snapshot.usage_percent, 50.0);
    }

    #[test]
    fn empty_enumeration_yields_zero_snapshot() {
        let fake = FakeThreadStats::default();
        let snapshot = sample(&fake);
        assert_eq!(snapshot, aggregate([]));
        assert_eq!(fake.releases.load(Ordering::SeqCst), 1);
    }
}
