//! Progress counters and the optional pre-count pass (spec §4.9).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};

use crate::collaborators::ProgressBar;
use crate::path_guard::PathMatcher;

/// Lock-free counters the renderer reads from a single consumer thread,
/// never per-file, to keep worker hot paths contention-free.
#[derive(Debug, Default)]
pub struct ProgressCounters {
    pub total: AtomicU64,
    pub processed: AtomicU64,
}

impl ProgressCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn advance(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

/// A single progress tick, sent by workers to the renderer thread.
pub struct ProgressTick;

/// Drains ticks on a dedicated thread and forwards them to a
/// `ProgressBar` implementation, so the renderer never contends with
/// per-file work.
pub fn spawn_progress_consumer(
    rx: Receiver<ProgressTick>,
    mut bar: Box<dyn ProgressBar>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        while rx.recv().is_ok() {
            bar.advance(1);
        }
        bar.close();
    })
}

pub fn send_tick(tx: &Sender<ProgressTick>) {
    let _ = tx.send(ProgressTick);
}

/// Pre-count pass: walks the same roots with the same filter to produce
/// `total_files`, used when `skip_count=false` (spec §4.9).
pub fn pre_count(roots: &[std::path::PathBuf], matcher: &PathMatcher, follow_symlinks: bool) -> u64 {
    let mut count = 0u64;
    for root in roots {
        let mut builder = ignore::WalkBuilder::new(root);
        builder.follow_links(follow_symlinks).standard_filters(false);
        for entry in builder.build().flatten() {
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
                && matcher.matches(entry.path())
            {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic_and_lock_free() {
        let counters = ProgressCounters::new();
        counters.set_total(10);
        for _ in 0..5 {
            counters.advance();
        }
        assert_eq!(counters.processed(), 5);
        assert_eq!(counters.total(), 10);
    }

    #[test]
    fn pre_count_matches_filtered_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("b.log"), b"x").unwrap();
        let matcher = PathMatcher::new(&["*.txt".to_string()], &[], &[], &[]);
        let count = pre_count(&[dir.path().to_path_buf()], &matcher, false);
        assert_eq!(count, 1);
    }
}
