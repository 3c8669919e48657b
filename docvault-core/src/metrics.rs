//! Per-invocation metrics: wall-clock duration and resident memory delta.

use std::time::Instant;

use serde::Serialize;
use tracing::debug;

/// Environment variable the serverless runtime uses for the configured memory size.
pub const ALLOCATED_MEMORY_ENV: &str = "AWS_LAMBDA_FUNCTION_MEMORY_SIZE";

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Source of the process's current memory footprint in bytes.
pub trait MemoryProbe: Send + Sync {
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads `VmRSS` from `/proc/self/status`. Reports `None` on platforms
/// without procfs.
///
/// Resident set size stands in for heap usage: it also counts stack, mapped
/// code and pages the allocator has not yet returned, so the reported delta is
/// an approximation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatusProbe;

impl MemoryProbe for ProcStatusProbe {
    fn resident_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

/// `VmRSS` in bytes. The kernel reports it in kB regardless of page size.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    match fields.next() {
        Some("kB") | None => Some(value * 1024),
        Some(_) => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationMetrics {
    pub processing_time_ms: u64,
    #[serde(rename = "memoryUsedMB")]
    pub memory_used_mb: f64,
    #[serde(rename = "allocatedMemoryMB")]
    pub allocated_memory_mb: u64,
}

/// Started at the beginning of an invocation, finished at the end.
pub struct MetricsRecorder<'a> {
    probe: &'a dyn MemoryProbe,
    started: Instant,
    baseline: Option<u64>,
}

impl<'a> MetricsRecorder<'a> {
    pub fn start(probe: &'a dyn MemoryProbe) -> Self {
        Self {
            probe,
            started: Instant::now(),
            baseline: probe.resident_bytes(),
        }
    }

    pub fn finish(self) -> InvocationMetrics {
        let processing_time_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let delta = match (self.baseline, self.probe.resident_bytes()) {
            (Some(before), Some(after)) => after.saturating_sub(before),
            _ => 0,
        };
        let metrics = InvocationMetrics {
            processing_time_ms,
            memory_used_mb: round2(delta as f64 / BYTES_PER_MB),
            allocated_memory_mb: allocated_memory_mb(),
        };
        debug!(?metrics, "Recorded invocation metrics");
        metrics
    }
}

/// Configured memory of the execution environment, 0 when unknown.
pub fn allocated_memory_mb() -> u64 {
    std::env::var(ALLOCATED_MEMORY_ENV)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct SteppingProbe(AtomicU64);

    impl MemoryProbe for SteppingProbe {
        fn resident_bytes(&self) -> Option<u64> {
            Some(self.0.fetch_add(3 * 1024 * 1024 + 512 * 1024, Ordering::SeqCst))
        }
    }

    struct NoProbe;

    impl MemoryProbe for NoProbe {
        fn resident_bytes(&self) -> Option<u64> {
            None
        }
    }

    #[test]
    fn memory_delta_is_reported_in_megabytes() {
        let probe = SteppingProbe(AtomicU64::new(10 * 1024 * 1024));
        let metrics = MetricsRecorder::start(&probe).finish();
        assert_eq!(metrics.memory_used_mb, 3.5);
    }

    #[test]
    fn vm_rss_is_read_in_kilobytes() {
        let status = "Name:\tdocvault\nVmPeak:\t  20480 kB\nVmRSS:\t   6144 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(6144 * 1024));
        assert_eq!(parse_vm_rss("Name:\tdocvault\n"), None);
        assert_eq!(parse_vm_rss("VmRSS:\tmany kB\n"), None);
    }

    #[test]
    fn missing_probe_reports_zero() {
        let metrics = MetricsRecorder::start(&NoProbe).finish();
        assert_eq!(metrics.memory_used_mb, 0.0);
    }

    #[test]
    fn serializes_with_envelope_field_names() {
        let metrics = InvocationMetrics {
            processing_time_ms: 12,
            memory_used_mb: 1.25,
            allocated_memory_mb: 512,
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["processingTimeMs"], 12);
        assert_eq!(json["memoryUsedMB"], 1.25);
        assert_eq!(json["allocatedMemoryMB"], 512);
    }
}
