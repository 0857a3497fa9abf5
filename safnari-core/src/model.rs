//! The evidence data model (spec §3): `FileTask`, `FileRecord`, `Metrics`,
//! `AutoTuneState`. `Pattern`/`Match` live in `safnari-scan` next to the
//! matcher that produces them; `Config` lives in `config.rs`.

use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::collections::FxHashMap;

/// Cheap, `stat`-derived facts the walker has already paid for, carried
/// alongside a task so workers don't re-stat.
#[derive(Debug, Clone, Copy, Default)]
pub struct CachedFileInfo {
    pub size: u64,
    pub mod_time_unix: i64,
    pub is_symlink: bool,
}

/// Produced by the walker, consumed exactly once by a worker.
#[derive(Debug, Clone)]
pub struct FileTask {
    pub absolute_path: PathBuf,
    pub cached_file_info: CachedFileInfo,
}

/// The immutable per-file evidence record. `path` is the only required
/// field; everything else is omitted from the NDJSON payload when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileRecord {
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attributes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(skip_serializing_if = "FxHashMap::is_empty", default)]
    pub hashes: FxHashMap<String, String>,
    #[serde(skip_serializing_if = "FxHashMap::is_empty", default)]
    pub fuzzy_hashes: FxHashMap<String, String>,
    #[serde(skip_serializing_if = "FxHashMap::is_empty", default)]
    pub metadata: FxHashMap<String, serde_json::Value>,
    #[serde(skip_serializing_if = "FxHashMap::is_empty", default)]
    pub xattrs: FxHashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub alternate_data_streams: Vec<String>,
    #[serde(skip_serializing_if = "FxHashMap::is_empty", default)]
    pub sensitive_data: FxHashMap<String, Vec<String>>,
    #[serde(skip_serializing_if = "FxHashMap::is_empty", default)]
    pub sensitive_data_match_counts: FxHashMap<String, usize>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub sensitive_data_truncated: bool,
    #[serde(skip_serializing_if = "FxHashMap::is_empty", default)]
    pub search_hits: FxHashMap<String, usize>,
}

impl FileRecord {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Write gate (spec §4.5): emit unless `scan_files` is false and every
    /// signal field is empty.
    pub fn has_signal(&self) -> bool {
        !self.sensitive_data.is_empty()
            || !self.search_hits.is_empty()
            || !self.fuzzy_hashes.is_empty()
            || !self.xattrs.is_empty()
            || self.acl.is_some()
            || !self.alternate_data_streams.is_empty()
    }
}

/// Monotonic, lock-free scan counters (spec §3, §4.8, §5). Reads/writes
/// never take the writer's mutex.
#[derive(Debug, Default)]
pub struct Metrics {
    pub start_time: AtomicI64,
    pub end_time: AtomicI64,
    pub total_files: AtomicU64,
    pub files_scanned: AtomicU64,
    pub files_processed: AtomicU64,
    pub total_processes: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        let m = Self::default();
        m.start_time.store(Utc::now().timestamp(), Ordering::Relaxed);
        m
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            start_time: ts_to_rfc3339(self.start_time.load(Ordering::Relaxed)),
            end_time: ts_to_rfc3339(self.end_time.load(Ordering::Relaxed)),
            total_files: self.total_files.load(Ordering::Relaxed),
            files_scanned: self.files_scanned.load(Ordering::Relaxed),
            files_processed: self.files_processed.load(Ordering::Relaxed),
            total_processes: self.total_processes.load(Ordering::Relaxed),
        }
    }

    pub fn mark_end(&self) {
        self.end_time.store(Utc::now().timestamp(), Ordering::Relaxed);
    }
}

fn ts_to_rfc3339(unix: i64) -> Option<DateTime<Utc>> {
    if unix == 0 {
        None
    } else {
        DateTime::from_timestamp(unix, 0)
    }
}

/// A point-in-time view of `Metrics`, suitable for the final `metrics`
/// NDJSON record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_files: u64,
    pub files_scanned: u64,
    pub files_processed: u64,
    pub total_processes: u64,
}

/// EWMA + PID state the adaptive controller carries between ticks (spec
/// §3, §4.7). Deliberately plain data: `safnari_scan::controller` treats
/// the transition as a pure function of this state plus fresh signals.
#[derive(Debug, Clone)]
pub struct AutoTuneState {
    pub cpu_ewma: f64,
    pub run_queue_ratio_ewma: f64,
    pub sched_latency_ewma: f64,
    pub heap_live_ewma: f64,
    pub throughput_ewma: f64,
    pub queue_wait_ewma: f64,

    pub pid_integral: f64,
    pub pid_previous_error: f64,

    pub concurrency: usize,
    pub io_limit: u32,
    pub max_io_limit: u32,

    pub last_processed: u64,
}

impl AutoTuneState {
    pub fn new(initial_concurrency: usize, initial_io_limit: u32, max_io_limit: u32) -> Self {
        Self {
            cpu_ewma: 0.0,
            run_queue_ratio_ewma: 0.0,
            sched_latency_ewma: 0.0,
            heap_live_ewma: 0.0,
            throughput_ewma: 0.0,
            queue_wait_ewma: 0.0,
            pid_integral: 0.0,
            pid_previous_error: 0.0,
            concurrency: initial_concurrency,
            io_limit: initial_io_limit,
            max_io_limit,
            last_processed: 0,
        }
    }
}

/// One line of the NDJSON evidence stream (spec §4.8, §6): `record_type`
/// and `schema_version` travel alongside the payload so the writer never
/// has to special-case a variant to frame it.
#[derive(Debug, Clone)]
pub enum OutputRecord {
    SystemInfo(serde_json::Value),
    Process(serde_json::Value),
    File(FileRecord),
    Metrics(MetricsSnapshot),
}

pub const SCHEMA_VERSION: &str = "1";

impl OutputRecord {
    pub fn record_type(&self) -> &'static str {
        match self {
            Self::SystemInfo(_) => "system_info",
            Self::Process(_) => "process",
            Self::File(_) => "file",
            Self::Metrics(_) => "metrics",
        }
    }

    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::SystemInfo(v) | Self::Process(v) => v.clone(),
            Self::File(r) => serde_json::to_value(r).unwrap_or(serde_json::Value::Null),
            Self::Metrics(m) => serde_json::to_value(m).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_record_omits_empty_optionals() {
        let rec = FileRecord::new("/a.txt");
        let json = serde_json::to_value(&rec).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj.get("path").unwrap(), "/a.txt");
    }

    #[test]
    fn file_record_has_signal() {
        let mut rec = FileRecord::new("/a.txt");
        assert!(!rec.has_signal());
        rec.search_hits.insert("needle".into(), 1);
        assert!(rec.has_signal());
    }

    #[test]
    fn metrics_counters_are_monotonic() {
        let m = Metrics::new();
        m.files_scanned.fetch_add(1, Ordering::Relaxed);
        m.files_processed.fetch_add(1, Ordering::Relaxed);
        let snap = m.snapshot();
        assert_eq!(snap.files_scanned, 1);
        assert_eq!(snap.files_processed, 1);
        assert!(snap.files_processed <= snap.files_scanned);
    }
}
