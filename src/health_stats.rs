//! Internal exporter statistics for the /health endpoint.
//!
//! Tracks scrape counts and durations since startup and renders them as the
//! plain-text table served by `/health`.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    fn snapshot(&self) -> (f64, f64, f64, f64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min)
        } else {
            (0.0, 0.0, 0.0, 0.0)
        }
    }
}

/// Exporter-internal statistics shared across handlers.
pub struct HealthStats {
    started: Instant,
    scrape_duration_seconds: Stat,
    total_scrapes: AtomicU64,
    http_requests: AtomicU64,
}

impl HealthStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            scrape_duration_seconds: Stat::default(),
            total_scrapes: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
        }
    }

    pub fn record_scrape(&self, duration_seconds: f64) {
        self.scrape_duration_seconds.add_sample(duration_seconds);
        self.total_scrapes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let (sd_cur, sd_avg, sd_max, sd_min) = self.scrape_duration_seconds.snapshot();
        let scrapes = self.total_scrapes.load(Ordering::Relaxed);
        let requests = self.http_requests.load(Ordering::Relaxed);

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "scrape duration (s)",
            format!("{:.3}", sd_cur),
            format!("{:.3}", sd_avg),
            format!("{:.3}", sd_max),
            format!("{:.3}", sd_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "number of served scrapes: {}", scrapes).ok();
        writeln!(out, "number of http requests:  {}", requests).ok();
        writeln!(out, "uptime (s):               {}", self.get_uptime_seconds()).ok();

        out
    }
}

impl Default for HealthStats {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_stat_tracks_extremes_and_average() {
        let mut stat = RunningStat::default();
        stat.add(2.0);
        stat.add(6.0);
        stat.add(4.0);
        assert_eq!(stat.min, 2.0);
        assert_eq!(stat.max, 6.0);
        assert_eq!(stat.last, 4.0);
        assert_eq!(stat.avg(), 4.0);
    }

    #[test]
    fn table_reflects_recorded_scrapes() {
        let stats = HealthStats::new();
        stats.record_scrape(0.005);
        stats.record_scrape(0.015);
        let table = stats.render_table();
        assert!(table.contains("number of served scrapes: 2"));
        assert!(table.contains("scrape duration (s)"));
    }
}
