//! Linux thread statistics from the /proc filesystem.
//!
//! Threads of the running process appear as numeric entries under
//! `/proc/self/task`; each entry's `stat` file carries the accumulated
//! scheduling counters in the format described by proc(5).

use std::fs;

use super::{ThreadHandle, ThreadSample, ThreadStats, ThreadStatsError};

/// Thread statistics source backed by `/proc/self/task`.
///
/// Handles are kernel thread ids. The enumeration holds no kernel resource
/// beyond the directory scan itself, so the trait's no-op `release` default
/// applies.
pub struct ProcfsThreadStats {
    /// Seconds per clock tick, from `sysconf(_SC_CLK_TCK)`.
    tick_seconds: f64,
}

impl ProcfsThreadStats {
    pub fn new() -> Self {
        let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
        // 100 Hz is the value on effectively every Linux configuration;
        // only used if sysconf itself errors out.
        let ticks = if ticks > 0 { ticks as f64 } else { 100.0 };
        Self {
            tick_seconds: 1.0 / ticks,
        }
    }
}

impl Default for ProcfsThreadStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadStats for ProcfsThreadStats {
    fn enumerate(&self) -> Result<Vec<ThreadHandle>, ThreadStatsError> {
        let entries = fs::read_dir("/proc/self/task").map_err(|e| {
            ThreadStatsError::Enumerate(format!("reading /proc/self/task: {}", e))
        })?;

        let mut handles = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = match name.to_str() {
                Some(v) => v,
                None => continue,
            };
            if let Ok(tid) = name.parse::<u64>() {
                handles.push(ThreadHandle(tid));
            }
        }
        Ok(handles)
    }

    fn read(&self, handle: ThreadHandle) -> Result<ThreadSample, ThreadStatsError> {
        let path = format!("/proc/self/task/{}/stat", handle.0);
        let content = fs::read_to_string(&path)
            .map_err(|e| ThreadStatsError::Read(format!("{}: {}", path, e)))?;
        // Usage needs the wall-clock reference point; if it is unavailable
        // the time totals still stand and usage degrades to zero.
        let uptime = read_uptime().unwrap_or(0.0);
        parse_stat(&content, self.tick_seconds, uptime)
    }
}

/// Parses one `/proc/self/task/<tid>/stat` line.
///
/// The comm field may itself contain spaces and parentheses, so fields are
/// taken after the last `)`. Numbering follows proc(5): state is field 3,
/// utime/stime are fields 14/15, starttime is field 22.
fn parse_stat(
    content: &str,
    tick_seconds: f64,
    uptime_seconds: f64,
) -> Result<ThreadSample, ThreadStatsError> {
    let rest = content
        .rfind(')')
        .map(|i| &content[i + 1..])
        .ok_or_else(|| ThreadStatsError::Read("malformed stat line: no comm field".into()))?;

    let fields: Vec<&str> = rest.split_whitespace().collect();
    if fields.len() < 20 {
        return Err(ThreadStatsError::Read(format!(
            "malformed stat line: {} fields after comm, expected at least 20",
            fields.len()
        )));
    }

    let state = fields[0];
    let utime: u64 = fields[11]
        .parse()
        .map_err(|e| ThreadStatsError::Read(format!("parsing utime: {}", e)))?;
    let stime: u64 = fields[12]
        .parse()
        .map_err(|e| ThreadStatsError::Read(format!("parsing stime: {}", e)))?;
    let starttime: u64 = fields[19]
        .parse()
        .map_err(|e| ThreadStatsError::Read(format!("parsing starttime: {}", e)))?;

    let user_seconds = utime as f64 * tick_seconds;
    let system_seconds = stime as f64 * tick_seconds;

    // The kernel keeps no instantaneous per-thread usage figure, so report
    // the lifetime average over the thread's elapsed wall-clock time. This
    // is the same figure ps(1) prints as %CPU and needs no state between
    // calls.
    let elapsed = uptime_seconds - starttime as f64 * tick_seconds;
    let usage_percent = if elapsed > 0.0 {
        (user_seconds + system_seconds) / elapsed * 100.0
    } else {
        0.0
    };

    Ok(ThreadSample {
        idle: state == "I",
        user_seconds,
        system_seconds,
        usage_percent,
    })
}

/// Reads seconds since boot from /proc/uptime.
fn read_uptime() -> Option<f64> {
    let content = fs::read_to_string("/proc/uptime").ok()?;
    content.split_whitespace().next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::sample;

    const TICK: f64 = 1.0 / 100.0;

    /// Builds a stat line with the given comm, state, utime, stime and
    /// starttime; the remaining fields carry fixed filler values.
    fn stat_line(comm: &str, state: &str, utime: u64, stime: u64, starttime: u64) -> String {
        format!(
            "4242 ({comm}) {state} 1 4242 4242 0 -1 4194304 150 0 0 0 {utime} {stime} 0 0 20 0 8 0 {starttime} 190000000 600 18446744073709551615"
        )
    }

    #[test]
    fn parses_running_thread() {
        let line = stat_line("worker", "S", 250, 50, 1000);
        let sample = parse_stat(&line, TICK, 110.0).unwrap();
        assert!(!sample.idle);
        assert!((sample.user_seconds - 2.5).abs() < 1e-9);
        assert!((sample.system_seconds - 0.5).abs() < 1e-9);
        // 3 CPU-seconds over 100 elapsed seconds.
        assert!((sample.usage_percent - 3.0).abs() < 1e-9);
    }

    #[test]
    fn parses_comm_with_spaces_and_parens() {
        let line = stat_line("tokio-runtime (w)", "R", 100, 0, 0);
        let sample = parse_stat(&line, TICK, 50.0).unwrap();
        assert!((sample.user_seconds - 1.0).abs() < 1e-9);
        assert!((sample.usage_percent - 2.0).abs() < 1e-9);
    }

    #[test]
    fn maps_idle_state() {
        let line = stat_line("idle-worker", "I", 0, 0, 0);
        let sample = parse_stat(&line, TICK, 50.0).unwrap();
        assert!(sample.idle);
    }

    #[test]
    fn usage_is_zero_without_wall_clock_reference() {
        let line = stat_line("worker", "S", 250, 50, 1000);
        let sample = parse_stat(&line, TICK, 0.0).unwrap();
        assert_eq!(sample.usage_percent, 0.0);
        assert!((sample.user_seconds - 2.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(parse_stat("4242 no-comm-field S 1", TICK, 10.0).is_err());
        assert!(parse_stat("4242 (short) S 1 2 3", TICK, 10.0).is_err());
    }

    #[test]
    fn enumerates_the_current_process() {
        let stats = ProcfsThreadStats::new();
        let handles = stats.enumerate().unwrap();
        assert!(!handles.is_empty());
    }

    #[test]
    fn live_sample_is_a_real_measurement() {
        let stats = ProcfsThreadStats::new();
        let snapshot = sample(&stats);
        assert!(!snapshot.is_failure());
        assert!(snapshot.user_seconds >= 0.0);
        assert!(snapshot.system_seconds >= 0.0);
        assert!(snapshot.usage_percent >= 0.0);
    }
}
