//! Traversal producer (spec §4.6): an iterative DFS over an explicit
//! stack so cancellation is checked between every pop, no recursion.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use crossbeam_channel::Sender;

use safnari_core::{CachedFileInfo, FileTask};

use crate::cancellation::CancellationToken;
use crate::io_limiter::IoLimiter;
use crate::path_guard::{PathGuard, PathMatcher};

pub struct WalkerParams {
    pub roots: Vec<PathBuf>,
    pub follow_symlinks: bool,
    pub max_file_size: u64,
    pub delta_cutoff: Option<DateTime<Utc>>,
}

/// Runs traversal on the calling thread, sending one `FileTask` per
/// eligible file. Returns once every root is exhausted or the token is
/// cancelled.
pub fn run_walker(
    params: &WalkerParams,
    guard: &PathGuard,
    matcher: &PathMatcher,
    tx: &Sender<FileTask>,
    io_limiter: &IoLimiter,
    token: &CancellationToken,
) {
    let mut stack: Vec<PathBuf> = params.roots.clone();

    while let Some(dir) = stack.pop() {
        if token.is_cancelled() {
            return;
        }

        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "cannot list directory, skipping");
                continue;
            }
        };

        for entry in entries.flatten() {
            if token.is_cancelled() {
                return;
            }
            let path = entry.path();

            let symlink_meta = match std::fs::symlink_metadata(&path) {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot stat entry, skipping");
                    continue;
                }
            };
            let is_symlink = symlink_meta.file_type().is_symlink();

            if is_symlink && !params.follow_symlinks {
                if symlink_meta.is_dir() {
                    continue;
                }
                if !matcher.matches(&path) {
                    continue;
                }
                dispatch_file(&path, &symlink_meta, true, params, tx, io_limiter);
                continue;
            }

            let meta = if is_symlink {
                match std::fs::metadata(&path) {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "cannot resolve symlink, skipping");
                        continue;
                    }
                }
            } else {
                symlink_meta
            };

            if meta.is_dir() {
                if is_symlink && !guard.contains(&path) {
                    tracing::warn!(path = %path.display(), "symlinked directory escapes scan roots, skipping");
                    continue;
                }
                if matcher.matches(&path) {
                    stack.push(path);
                }
                continue;
            }

            if !matcher.matches(&path) {
                continue;
            }
            dispatch_file(&path, &meta, is_symlink, params, tx, io_limiter);
        }
    }
}

fn dispatch_file(
    path: &std::path::Path,
    meta: &std::fs::Metadata,
    is_symlink: bool,
    params: &WalkerParams,
    tx: &Sender<FileTask>,
    io_limiter: &IoLimiter,
) {
    let size = meta.len();
    if size > params.max_file_size {
        return;
    }
    let mod_time_unix = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    if let Some(cutoff) = params.delta_cutoff {
        if mod_time_unix < cutoff.timestamp() {
            return;
        }
    }

    let task = FileTask {
        absolute_path: path.to_path_buf(),
        cached_file_info: CachedFileInfo {
            size,
            mod_time_unix,
            is_symlink,
        },
    };
    if tx.send(task).is_err() {
        return;
    }
    io_limiter.acquire();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn walks_nested_files_and_respects_matcher() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("a.txt"), b"x").unwrap();
        std::fs::write(dir.path().join("sub").join("b.txt"), b"y").unwrap();
        std::fs::write(dir.path().join("c.log"), b"z").unwrap();

        let guard = PathGuard::new([dir.path()]).unwrap();
        let matcher = PathMatcher::new(&["*.txt".to_string()], &[], &[], &[]);
        let (tx, rx) = crossbeam_channel::unbounded();
        let token = CancellationToken::new();
        let limiter = IoLimiter::new(100_000);
        let params = WalkerParams {
            roots: vec![dir.path().to_path_buf()],
            follow_symlinks: false,
            max_file_size: 1024,
            delta_cutoff: None,
        };

        run_walker(&params, &guard, &matcher, &tx, &limiter, &token);
        drop(tx);

        let received: Vec<_> = rx.iter().collect();
        assert_eq!(received.len(), 2);
    }

    #[test]
    fn skips_files_over_max_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), vec![0u8; 100]).unwrap();

        let guard = PathGuard::new([dir.path()]).unwrap();
        let matcher = PathMatcher::new(&[], &[], &[], &[]);
        let (tx, rx) = crossbeam_channel::unbounded();
        let token = CancellationToken::new();
        let limiter = IoLimiter::new(100_000);
        let params = WalkerParams {
            roots: vec![dir.path().to_path_buf()],
            follow_symlinks: false,
            max_file_size: 10,
            delta_cutoff: None,
        };

        run_walker(&params, &guard, &matcher, &tx, &limiter, &token);
        drop(tx);
        assert!(rx.iter().next().is_none());
    }

    #[test]
    fn cancellation_stops_traversal_early() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..50 {
            std::fs::write(dir.path().join(format!("f{i}.txt")), b"x").unwrap();
        }
        let guard = PathGuard::new([dir.path()]).unwrap();
        let matcher = PathMatcher::new(&[], &[], &[], &[]);
        let (tx, rx) = crossbeam_channel::unbounded();
        let token = CancellationToken::new();
        token.cancel();
        let limiter = IoLimiter::new(100_000);
        let params = WalkerParams {
            roots: vec![dir.path().to_path_buf()],
            follow_symlinks: false,
            max_file_size: 1024,
            delta_cutoff: None,
        };

        run_walker(&params, &guard, &matcher, &tx, &limiter, &token);
        drop(tx);
        let count = AtomicUsize::new(0);
        for _ in rx.iter() {
            count.fetch_add(1, Ordering::Relaxed);
        }
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }
}
