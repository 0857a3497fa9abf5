//! Diagnostics probe (spec §4.10): detects a stalled scan and writes a
//! slow-scan event (plus an optional artifact) to `diag_dir`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cancellation::CancellationToken;

#[derive(Debug, Clone, Serialize)]
pub struct SlowScanEvent {
    pub stalled_secs: f64,
    pub last_progress_count: u64,
}

pub struct DiagnosticsProbe<F: Fn() -> u64> {
    threshold: Duration,
    diag_dir: Option<PathBuf>,
    progress_count: F,
}

impl<F: Fn() -> u64> DiagnosticsProbe<F> {
    pub fn new(threshold_secs: u64, diag_dir: Option<PathBuf>, progress_count: F) -> Option<Self> {
        if threshold_secs == 0 {
            return None;
        }
        Some(Self {
            threshold: Duration::from_secs(threshold_secs),
            diag_dir,
            progress_count,
        })
    }

    /// Runs the tick loop on the calling thread until `token` cancels.
    /// Ticks at `min(threshold/2, 2s)` (spec §4.10).
    pub fn run(&self, token: &CancellationToken) {
        let tick_interval = (self.threshold / 2).min(Duration::from_secs(2));
        let mut last_count = (self.progress_count)();
        let mut last_progress_at = Instant::now();
        let mut last_dump_at: Option<Instant> = None;

        while !token.is_cancelled() {
            std::thread::sleep(tick_interval);
            if token.is_cancelled() {
                break;
            }
            let count = (self.progress_count)();
            if count != last_count {
                last_count = count;
                last_progress_at = Instant::now();
                continue;
            }
            let stalled = last_progress_at.elapsed();
            if stalled >= self.threshold
                && (last_dump_at.is_none() || last_dump_at.unwrap().elapsed() >= self.threshold)
            {
                self.dump_event(stalled, count);
                last_dump_at = Some(Instant::now());
            }
        }
    }

    fn dump_event(&self, stalled: Duration, count: u64) {
        let event = SlowScanEvent {
            stalled_secs: stalled.as_secs_f64(),
            last_progress_count: count,
        };
        tracing::warn!(stalled_secs = event.stalled_secs, "scan appears stalled");
        if let Some(dir) = &self.diag_dir {
            if let Ok(json) = serde_json::to_vec(&event) {
                let path = dir.join(format!("slow-scan-{}.json", now_suffix()));
                let _ = std::fs::create_dir_all(dir);
                let _ = std::fs::write(path, json);
            }
        }
    }
}

fn now_suffix() -> u128 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    #[test]
    fn zero_threshold_disables_probe() {
        let probe = DiagnosticsProbe::new(0, None, || 0);
        assert!(probe.is_none());
    }

    #[test]
    fn probe_detects_stall_and_writes_event() {
        let dir = tempfile::tempdir().unwrap();
        let counter = Arc::new(AtomicU64::new(0));
        let c2 = counter.clone();
        let probe = DiagnosticsProbe::new(1, Some(dir.path().to_path_buf()), move || c2.load(Ordering::Relaxed))
            .unwrap();
        let token = CancellationToken::new();
        let token2 = token.clone();
        let handle = std::thread::spawn(move || probe.run(&token2));
        std::thread::sleep(Duration::from_millis(1200));
        token.cancel();
        handle.join().unwrap();
        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert!(!entries.is_empty());
    }
}
