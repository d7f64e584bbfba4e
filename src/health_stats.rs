//! Health statistics for the exporter.
//!
//! Tracks sampling outcomes, sensor read latency and scrape traffic for the
//! plain-text `/health` endpoint. These numbers are not exported to Prometheus.

use std::collections::VecDeque;
use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
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

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// Returns (last, avg, max, min, count).
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// Thread-safe window of recent scrape timestamps.
pub struct RequestTimestamps {
    inner: Mutex<VecDeque<Instant>>,
}

impl Default for RequestTimestamps {
    fn default() -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(64)),
        }
    }
}

impl RequestTimestamps {
    pub fn record(&self) {
        if let Ok(mut guard) = self.inner.lock() {
            let now = Instant::now();
            guard.push_back(now);
            // Keep only the last 10 minutes
            while guard
                .front()
                .is_some_and(|&t| now.duration_since(t) > Duration::from_secs(600))
            {
                guard.pop_front();
            }
        }
    }

    pub fn count_last_minute(&self) -> u64 {
        if let Ok(guard) = self.inner.lock() {
            let now = Instant::now();
            guard
                .iter()
                .filter(|&&t| now.duration_since(t) <= Duration::from_secs(60))
                .count() as u64
        } else {
            0
        }
    }
}

/// Sampling and scrape statistics of the exporter.
pub struct HealthStats {
    // Sampling
    pub rounds_total: AtomicU64,
    pub read_successes: AtomicU64,
    pub read_failures: AtomicU64,
    pub consecutive_failures: AtomicU64,
    pub read_duration_seconds: Stat,
    pub retries: Stat,

    // HTTP
    pub scrape_timestamps: RequestTimestamps,
    pub scrapes_total: AtomicU64,
    pub scrape_duration_ms: Stat,

    pub start_time: Instant,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            rounds_total: AtomicU64::new(0),
            read_successes: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            read_duration_seconds: Stat::default(),
            retries: Stat::default(),
            scrape_timestamps: RequestTimestamps::default(),
            scrapes_total: AtomicU64::new(0),
            scrape_duration_ms: Stat::default(),
            start_time: Instant::now(),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_read_success(&self, retries: u32, duration: Duration) {
        self.rounds_total.fetch_add(1, Ordering::Relaxed);
        self.read_successes.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.retries.add_sample(retries as f64);
        self.read_duration_seconds
            .add_sample(duration.as_secs_f64());
    }

    pub fn record_read_failure(&self, duration: Duration) {
        self.rounds_total.fetch_add(1, Ordering::Relaxed);
        self.read_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.read_duration_seconds
            .add_sample(duration.as_secs_f64());
    }

    pub fn record_scrape(&self, duration_ms: f64) {
        self.scrapes_total.fetch_add(1, Ordering::Relaxed);
        self.scrape_timestamps.record();
        self.scrape_duration_ms.add_sample(duration_ms);
    }

    pub fn get_read_success_rate(&self) -> f64 {
        let success = self.read_successes.load(Ordering::Relaxed);
        let failure = self.read_failures.load(Ordering::Relaxed);
        let total = success + failure;
        if total == 0 {
            100.0
        } else {
            (success as f64 / total as f64) * 100.0
        }
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let (rd_cur, rd_avg, rd_max, rd_min, _) = self.read_duration_seconds.snapshot();
        let (rt_cur, rt_avg, rt_max, rt_min, _) = self.retries.snapshot();
        let (sd_cur, sd_avg, sd_max, sd_min, _) = self.scrape_duration_ms.snapshot();

        let rounds = self.rounds_total.load(Ordering::Relaxed);
        let failures = self.read_failures.load(Ordering::Relaxed);
        let consecutive = self.consecutive_failures.load(Ordering::Relaxed);
        let success_rate = self.get_read_success_rate();
        let scrapes = self.scrapes_total.load(Ordering::Relaxed);
        let scrapes_last_minute = self.scrape_timestamps.count_last_minute();

        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(out, "HEALTH ENDPOINT - EXPORTER INTERNAL STATS").ok();
        writeln!(out, "==========================================").ok();
        writeln!(out).ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "SENSOR SAMPLING").ok();
        writeln!(out, "---------------").ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "read_duration (s)",
            format!("{:.3}", rd_cur),
            format!("{:.3}", rd_avg),
            format!("{:.3}", rd_max),
            format!("{:.3}", rd_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "retries",
            format!("{:.0}", rt_cur),
            format!("{:.1}", rt_avg),
            format!("{:.0}", rt_max),
            format!("{:.0}", rt_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "{:left$} : {}", "sampling_rounds", rounds, left = left_col).ok();
        writeln!(out, "{:left$} : {}", "failed_rounds", failures, left = left_col).ok();
        writeln!(
            out,
            "{:left$} : {}",
            "consecutive_failures",
            consecutive,
            left = left_col
        )
        .ok();
        writeln!(
            out,
            "{:left$} : {:.1}",
            "read_success_rate (%)",
            success_rate,
            left = left_col
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "HTTP SERVER").ok();
        writeln!(out, "-----------").ok();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "scrape_duration (ms)",
            format!("{:.3}", sd_cur),
            format!("{:.3}", sd_avg),
            format!("{:.3}", sd_max),
            format!("{:.3}", sd_min),
            left = left_col,
            col = col_w
        )
        .ok();

        writeln!(out).ok();
        writeln!(out, "{:left$} : {}", "scrapes_total", scrapes, left = left_col).ok();
        writeln!(
            out,
            "{:left$} : {}",
            "scrapes_last_minute",
            scrapes_last_minute,
            left = left_col
        )
        .ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stat_tracks_min_max_avg() {
        let mut stat = RunningStat::default();
        stat.add(2.0);
        stat.add(4.0);
        stat.add(0.0);
        assert_eq!(stat.min, 0.0);
        assert_eq!(stat.max, 4.0);
        assert_eq!(stat.last, 0.0);
        assert_eq!(stat.avg(), 2.0);
    }

    #[test]
    fn test_success_rate_defaults_to_100() {
        let stats = HealthStats::new();
        assert_eq!(stats.get_read_success_rate(), 100.0);
    }

    #[test]
    fn test_consecutive_failures_reset_on_success() {
        let stats = HealthStats::new();
        stats.record_read_failure(Duration::from_millis(5));
        stats.record_read_failure(Duration::from_millis(5));
        assert_eq!(stats.consecutive_failures.load(Ordering::Relaxed), 2);

        stats.record_read_success(1, Duration::from_millis(5));
        assert_eq!(stats.consecutive_failures.load(Ordering::Relaxed), 0);
        assert_eq!(stats.rounds_total.load(Ordering::Relaxed), 3);
        assert!((stats.get_read_success_rate() - 33.333).abs() < 0.01);
    }

    #[test]
    fn test_render_table_contains_sections() {
        let stats = HealthStats::new();
        stats.record_read_success(2, Duration::from_millis(12));
        stats.record_scrape(0.4);
        let table = stats.render_table();
        assert!(table.contains("SENSOR SAMPLING"));
        assert!(table.contains("HTTP SERVER"));
        assert!(table.contains("scrapes_total"));
    }
}
