//! Per-stage error counters and performance rings.
//!
//! One `StageStats` is owned by the active stage driver and threaded by
//! reference into the retry policy and batch processor. The rings are
//! reporting-only (speed, ETA, memory) and hold a bounded number of samples
//! so a multi-hour run cannot grow them without limit.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Last N per-batch speed and wall-clock samples kept for reporting.
pub const PERF_RING: usize = 50;
/// Last N memory samples kept.
pub const MEMORY_RING: usize = 100;
/// Speed is averaged over this many recent batches.
const SPEED_WINDOW: usize = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorCounters {
    pub rate_limit: u64,
    pub network: u64,
    pub auth: u64,
    pub parsing: u64,
    pub file_system: u64,
}

impl ErrorCounters {
    pub fn record(&mut self, kind: ErrorKind) {
        match kind {
            ErrorKind::RateLimited => self.rate_limit += 1,
            ErrorKind::Network => self.network += 1,
            ErrorKind::Auth => self.auth += 1,
            ErrorKind::Unexpected => self.parsing += 1,
            ErrorKind::FileSystem => self.file_system += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.rate_limit + self.network + self.auth + self.parsing + self.file_system
    }
}

#[derive(Debug)]
pub struct StageStats {
    pub errors: ErrorCounters,
    /// Seconds spent sleeping in backoff, cumulative across attempts.
    pub total_wait_time: f64,
    started: Instant,
    speeds: Vec<f64>,
    batch_times: Vec<f64>,
    memory_samples: Vec<f64>,
}

impl Default for StageStats {
    fn default() -> Self {
        Self::new()
    }
}

impl StageStats {
    pub fn new() -> Self {
        Self {
            errors: ErrorCounters::default(),
            total_wait_time: 0.0,
            started: Instant::now(),
            speeds: Vec::new(),
            batch_times: Vec::new(),
            memory_samples: Vec::new(),
        }
    }

    /// Restore counters persisted in a progress record when resuming.
    pub fn restore(&mut self, errors: ErrorCounters, total_wait_time: f64) {
        self.errors = errors;
        self.total_wait_time = total_wait_time;
    }

    pub fn log_batch(&mut self, batch_size: usize, elapsed: Duration) {
        let secs = elapsed.as_secs_f64();
        let speed = if secs > 0.0 {
            batch_size as f64 / (secs / 60.0)
        } else {
            0.0
        };
        push_capped(&mut self.speeds, speed, PERF_RING);
        push_capped(&mut self.batch_times, secs, PERF_RING);
    }

    pub fn sample_memory(&mut self) {
        if let Some(mb) = resident_memory_mb() {
            push_capped(&mut self.memory_samples, mb, MEMORY_RING);
        }
    }

    /// Items per minute, averaged over the most recent batches.
    pub fn processing_speed(&self) -> f64 {
        let window = self.speeds.len().min(SPEED_WINDOW);
        if window == 0 {
            return 0.0;
        }
        let recent = &self.speeds[self.speeds.len() - window..];
        recent.iter().sum::<f64>() / window as f64
    }

    pub fn eta(&self, remaining_items: usize) -> String {
        let speed = self.processing_speed();
        if speed <= 0.0 {
            return "unknown".to_string();
        }
        let minutes = remaining_items as f64 / speed;
        if minutes < 60.0 {
            format!("{minutes:.1} minutes")
        } else {
            format!("{:.1} hours", minutes / 60.0)
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn batches_recorded(&self) -> usize {
        self.batch_times.len()
    }

    pub fn average_batch_time(&self) -> f64 {
        if self.batch_times.is_empty() {
            return 0.0;
        }
        self.batch_times.iter().sum::<f64>() / self.batch_times.len() as f64
    }

    pub fn memory_mb(&self) -> f64 {
        self.memory_samples.last().copied().unwrap_or(0.0)
    }

    pub fn performance_report(&self) -> String {
        if self.batch_times.is_empty() {
            return "no performance data recorded".to_string();
        }
        format!(
            "batches={} avg_batch_time={:.2}s speed={:.1} items/min rate_limit_hits={} total_wait={:.1}s",
            self.batches_recorded(),
            self.average_batch_time(),
            self.processing_speed(),
            self.errors.rate_limit,
            self.total_wait_time,
        )
    }
}

fn push_capped(ring: &mut Vec<f64>, value: f64, cap: usize) {
    ring.push(value);
    if ring.len() > cap {
        let excess = ring.len() - cap;
        ring.drain(..excess);
    }
}

/// Resident set size in MB, where the platform exposes it cheaply.
#[cfg(target_os = "linux")]
pub fn resident_memory_mb() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let kb: f64 = status
        .lines()
        .find(|l| l.starts_with("VmRSS:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()?;
    Some(kb / 1024.0)
}

#[cfg(target_os = "macos")]
pub fn resident_memory_mb() -> Option<f64> {
    let pid = std::process::id();
    let out = std::process::Command::new("ps")
        .args(["-o", "rss=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    let kb: f64 = String::from_utf8_lossy(&out.stdout).trim().parse().ok()?;
    Some(kb / 1024.0)
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
pub fn resident_memory_mb() -> Option<f64> {
    None
}
