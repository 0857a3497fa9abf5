//! Resolved configuration (spec §3): defaults ← file ← flags, with the
//! two hidden "did the user set this" flags the adaptive controller must
//! respect.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerfProfile {
    Adaptive,
    Ultra,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitiveEngine {
    Auto,
    Deterministic,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitiveLongtail {
    Off,
    Sampled,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentReadMode {
    Auto,
    Stream,
    Mmap,
}

/// Prefilter gate aggressiveness (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensitiveGateMode {
    Off,
    Safe,
    Aggressive,
}

/// Coarse scheduling preset (GLOSSARY: "Nice level").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NiceLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    Mask,
    Hash,
    None,
}

/// A user-supplied regex pattern (spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomPattern {
    pub name: String,
    pub regex: String,
}

/// The fully resolved configuration the scanner runs with.
#[derive(Debug, Clone)]
pub struct Config {
    // What to do
    pub scan_files: bool,
    pub scan_sensitive: bool,
    pub scan_processes: bool,
    pub collect_system_info: bool,

    // Roots & traversal
    pub roots: Vec<PathBuf>,
    pub follow_symlinks: bool,
    pub max_file_size: u64,
    pub all_drives: bool,

    // Path filter (spec §4.9)
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub include_regexes: Vec<String>,
    pub exclude_regexes: Vec<String>,

    // Delta scan (spec §6)
    pub delta_scan: bool,
    pub delta_scan_sidecar_path: PathBuf,

    // Concurrency / performance
    pub concurrency_level: usize,
    pub concurrency_set: bool,
    pub max_io_per_second: u32,
    pub max_io_set: bool,
    pub perf_profile: PerfProfile,
    pub nice_level: NiceLevel,
    pub auto_tune_interval_secs: u64,

    // Content reading (spec §4.4)
    pub content_read_mode: ContentReadMode,
    pub mmap_min_size: usize,
    pub stream_chunk_size: usize,
    pub stream_overlap_bytes: usize,

    // Pattern catalog & sensitive scanning (spec §4.1–§4.3)
    pub include_data_types: Vec<String>,
    pub exclude_data_types: Vec<String>,
    pub custom_patterns: Vec<CustomPattern>,
    pub sensitive_engine: SensitiveEngine,
    pub sensitive_longtail: SensitiveLongtail,
    pub sensitive_gate_mode: SensitiveGateMode,
    pub max_matches_per_type: usize,
    pub max_matches_total: usize,
    pub redaction: RedactionMode,
    pub search_terms: Vec<String>,

    // Module toggles (spec §4.5)
    pub xattrs_enabled: bool,
    pub xattr_max_value_size: usize,
    pub acl_enabled: bool,
    pub ads_enabled: bool,
    pub hash_algorithms: Vec<String>,
    pub metadata_max_bytes: usize,
    pub fuzzy_enabled: bool,
    pub fuzzy_algorithms: Vec<String>,
    pub fuzzy_min_size: u64,
    pub fuzzy_max_size: u64,

    // Output (spec §4.8, §6)
    pub output_path: Option<PathBuf>,
    pub max_output_file_size: u64,

    // Progress & diagnostics (spec §4.9, §4.10)
    pub skip_count: bool,
    pub diag_slow_scan_threshold_secs: u64,
    pub diag_dir: Option<PathBuf>,
    pub diag_goroutine_leak: bool,

    // External/telemetry (named interfaces only, spec §6)
    pub otel_endpoint: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_files: true,
            scan_sensitive: false,
            scan_processes: false,
            collect_system_info: false,

            roots: Vec::new(),
            follow_symlinks: false,
            max_file_size: 50 * 1024 * 1024,
            all_drives: false,

            include_globs: Vec::new(),
            exclude_globs: Vec::new(),
            include_regexes: Vec::new(),
            exclude_regexes: Vec::new(),

            delta_scan: false,
            delta_scan_sidecar_path: PathBuf::from(".safnari_last_scan"),

            concurrency_level: num_cpus_fallback(),
            concurrency_set: false,
            max_io_per_second: 1000,
            max_io_set: false,
            perf_profile: PerfProfile::Adaptive,
            nice_level: NiceLevel::Medium,
            auto_tune_interval_secs: 5,

            content_read_mode: ContentReadMode::Auto,
            mmap_min_size: 131_072,
            stream_chunk_size: 262_144,
            stream_overlap_bytes: 512,

            include_data_types: Vec::new(),
            exclude_data_types: Vec::new(),
            custom_patterns: Vec::new(),
            sensitive_engine: SensitiveEngine::Auto,
            sensitive_longtail: SensitiveLongtail::Off,
            sensitive_gate_mode: SensitiveGateMode::Safe,
            max_matches_per_type: 50,
            max_matches_total: 500,
            redaction: RedactionMode::None,
            search_terms: Vec::new(),

            xattrs_enabled: false,
            xattr_max_value_size: 4096,
            acl_enabled: false,
            ads_enabled: false,
            hash_algorithms: Vec::new(),
            metadata_max_bytes: 65_536,
            fuzzy_enabled: false,
            fuzzy_algorithms: Vec::new(),
            fuzzy_min_size: 512,
            fuzzy_max_size: 10 * 1024 * 1024,

            output_path: None,
            max_output_file_size: 0,

            skip_count: false,
            diag_slow_scan_threshold_secs: 0,
            diag_dir: None,
            diag_goroutine_leak: false,

            otel_endpoint: None,
        }
    }
}

fn num_cpus_fallback() -> usize {
    num_cpus::get().max(1)
}

/// The overlay shape shared by the config file and the CLI flag layer:
/// every field optional, `None` meaning "leave the prior layer's value".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverlay {
    pub scan_files: Option<bool>,
    pub scan_sensitive: Option<bool>,
    pub scan_processes: Option<bool>,
    pub collect_system_info: Option<bool>,
    pub roots: Option<Vec<PathBuf>>,
    pub follow_symlinks: Option<bool>,
    pub max_file_size: Option<u64>,
    pub all_drives: Option<bool>,
    pub include_globs: Option<Vec<String>>,
    pub exclude_globs: Option<Vec<String>>,
    pub include_regexes: Option<Vec<String>>,
    pub exclude_regexes: Option<Vec<String>>,
    pub delta_scan: Option<bool>,
    pub delta_scan_sidecar_path: Option<PathBuf>,
    pub concurrency_level: Option<usize>,
    pub max_io_per_second: Option<u32>,
    pub perf_profile: Option<PerfProfile>,
    pub nice_level: Option<NiceLevel>,
    pub auto_tune_interval_secs: Option<u64>,
    pub content_read_mode: Option<ContentReadMode>,
    pub mmap_min_size: Option<usize>,
    pub stream_chunk_size: Option<usize>,
    pub stream_overlap_bytes: Option<usize>,
    pub include_data_types: Option<Vec<String>>,
    pub exclude_data_types: Option<Vec<String>>,
    pub custom_patterns: Option<Vec<CustomPattern>>,
    pub sensitive_engine: Option<SensitiveEngine>,
    pub sensitive_longtail: Option<SensitiveLongtail>,
    pub sensitive_gate_mode: Option<SensitiveGateMode>,
    pub max_matches_per_type: Option<usize>,
    pub max_matches_total: Option<usize>,
    pub redaction: Option<RedactionMode>,
    pub search_terms: Option<Vec<String>>,
    pub xattrs_enabled: Option<bool>,
    pub xattr_max_value_size: Option<usize>,
    pub acl_enabled: Option<bool>,
    pub ads_enabled: Option<bool>,
    pub hash_algorithms: Option<Vec<String>>,
    pub metadata_max_bytes: Option<usize>,
    pub fuzzy_enabled: Option<bool>,
    pub fuzzy_algorithms: Option<Vec<String>>,
    pub fuzzy_min_size: Option<u64>,
    pub fuzzy_max_size: Option<u64>,
    pub output_path: Option<PathBuf>,
    pub max_output_file_size: Option<u64>,
    pub skip_count: Option<bool>,
    pub diag_slow_scan_threshold_secs: Option<u64>,
    pub diag_dir: Option<PathBuf>,
    pub diag_goroutine_leak: Option<bool>,
    pub otel_endpoint: Option<String>,
}

macro_rules! overlay_field {
    ($cfg:expr, $overlay:expr, $field:ident) => {
        if let Some(v) = $overlay.$field.clone() {
            $cfg.$field = v;
        }
    };
}

impl Config {
    /// Apply a file or flag overlay. `concurrency_set`/`max_io_set` are
    /// updated independently by the caller, since only the flag layer's
    /// explicitness matters for autotune (spec §3).
    pub fn apply_overlay(&mut self, overlay: &ConfigOverlay) {
        overlay_field!(self, overlay, scan_files);
        overlay_field!(self, overlay, scan_sensitive);
        overlay_field!(self, overlay, scan_processes);
        overlay_field!(self, overlay, collect_system_info);
        overlay_field!(self, overlay, roots);
        overlay_field!(self, overlay, follow_symlinks);
        overlay_field!(self, overlay, max_file_size);
        overlay_field!(self, overlay, all_drives);
        overlay_field!(self, overlay, include_globs);
        overlay_field!(self, overlay, exclude_globs);
        overlay_field!(self, overlay, include_regexes);
        overlay_field!(self, overlay, exclude_regexes);
        overlay_field!(self, overlay, delta_scan);
        overlay_field!(self, overlay, delta_scan_sidecar_path);
        if let Some(v) = overlay.concurrency_level {
            self.concurrency_level = v;
            self.concurrency_set = true;
        }
        if let Some(v) = overlay.max_io_per_second {
            self.max_io_per_second = v;
            self.max_io_set = true;
        }
        overlay_field!(self, overlay, perf_profile);
        overlay_field!(self, overlay, nice_level);
        overlay_field!(self, overlay, auto_tune_interval_secs);
        overlay_field!(self, overlay, content_read_mode);
        overlay_field!(self, overlay, mmap_min_size);
        overlay_field!(self, overlay, stream_chunk_size);
        overlay_field!(self, overlay, stream_overlap_bytes);
        overlay_field!(self, overlay, include_data_types);
        overlay_field!(self, overlay, exclude_data_types);
        overlay_field!(self, overlay, custom_patterns);
        overlay_field!(self, overlay, sensitive_engine);
        overlay_field!(self, overlay, sensitive_longtail);
        overlay_field!(self, overlay, sensitive_gate_mode);
        overlay_field!(self, overlay, max_matches_per_type);
        overlay_field!(self, overlay, max_matches_total);
        overlay_field!(self, overlay, redaction);
        overlay_field!(self, overlay, search_terms);
        overlay_field!(self, overlay, xattrs_enabled);
        overlay_field!(self, overlay, xattr_max_value_size);
        overlay_field!(self, overlay, acl_enabled);
        overlay_field!(self, overlay, ads_enabled);
        overlay_field!(self, overlay, hash_algorithms);
        overlay_field!(self, overlay, metadata_max_bytes);
        overlay_field!(self, overlay, fuzzy_enabled);
        overlay_field!(self, overlay, fuzzy_algorithms);
        overlay_field!(self, overlay, fuzzy_min_size);
        overlay_field!(self, overlay, fuzzy_max_size);
        if overlay.output_path.is_some() {
            self.output_path = overlay.output_path.clone();
        }
        overlay_field!(self, overlay, max_output_file_size);
        overlay_field!(self, overlay, skip_count);
        overlay_field!(self, overlay, diag_slow_scan_threshold_secs);
        if overlay.diag_dir.is_some() {
            self.diag_dir = overlay.diag_dir.clone();
        }
        overlay_field!(self, overlay, diag_goroutine_leak);
        if overlay.otel_endpoint.is_some() {
            self.otel_endpoint = overlay.otel_endpoint.clone();
        }
    }

    /// Load `defaults ← file ← flags` per spec §3.
    pub fn load(
        file_path: Option<&std::path::Path>,
        flags: &ConfigOverlay,
    ) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if let Some(path) = file_path {
            if path.exists() {
                let text = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                let overlay: ConfigOverlay =
                    toml::from_str(&text).map_err(|e| ConfigError::FileParse {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                cfg.apply_overlay(&overlay);
            }
        }
        cfg.apply_overlay(flags);
        cfg.normalize();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Clamp/derive fields that have a canonical form but no hard
    /// rejection. Idempotent: `normalize(normalize(cfg)) == normalize(cfg)`.
    pub fn normalize(&mut self) {
        if self.concurrency_level == 0 {
            self.concurrency_level = 1;
        }
        if self.stream_chunk_size == 0 {
            self.stream_chunk_size = 262_144;
        }
        if self.stream_overlap_bytes >= self.stream_chunk_size {
            self.stream_overlap_bytes = self.stream_chunk_size.saturating_sub(1);
        }
        if self.mmap_min_size == 0 {
            self.mmap_min_size = 131_072;
        }
        if self.hash_algorithms.is_empty() && self.scan_files {
            self.hash_algorithms = vec!["sha256".to_string()];
        }
        self.max_file_size = self.max_file_size.min(10 * 1024 * 1024).max(1);
    }

    /// Reject invalid configuration outright (spec §7, kind: Configuration).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.scan_files
            || self.scan_sensitive
            || self.scan_processes
            || self.collect_system_info)
        {
            return Err(ConfigError::NoScanTargetEnabled);
        }
        if self.concurrency_level < 1 {
            return Err(ConfigError::InvalidConcurrency(self.concurrency_level));
        }
        if self.stream_overlap_bytes >= self.stream_chunk_size {
            return Err(ConfigError::OverlapNotLessThanChunk {
                overlap: self.stream_overlap_bytes,
                chunk_size: self.stream_chunk_size,
            });
        }
        if let Some(endpoint) = &self.otel_endpoint {
            if !endpoint.contains("://") {
                return Err(ConfigError::OtelEndpointMissingScheme(endpoint.clone()));
            }
        }
        if self.roots.is_empty() && !self.all_drives {
            return Err(ConfigError::NoRoots);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fail_validation_without_roots() {
        let cfg = Config::default();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoRoots)));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut cfg = Config::default();
        cfg.roots.push(PathBuf::from("."));
        cfg.stream_overlap_bytes = cfg.stream_chunk_size; // invalid, gets clamped
        cfg.normalize();
        let once = format!("{:?}", cfg);
        cfg.normalize();
        let twice = format!("{:?}", cfg);
        assert_eq!(once, twice);
        assert!(cfg.stream_overlap_bytes < cfg.stream_chunk_size);
    }

    #[test]
    fn concurrency_and_io_set_flags_track_explicit_overlay() {
        let mut cfg = Config::default();
        assert!(!cfg.concurrency_set);
        let overlay = ConfigOverlay {
            concurrency_level: Some(4),
            ..Default::default()
        };
        cfg.apply_overlay(&overlay);
        assert!(cfg.concurrency_set);
        assert_eq!(cfg.concurrency_level, 4);
        assert!(!cfg.max_io_set);
    }

    #[test]
    fn otel_endpoint_requires_scheme() {
        let mut cfg = Config::default();
        cfg.roots.push(PathBuf::from("."));
        cfg.otel_endpoint = Some("localhost:4317".to_string());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::OtelEndpointMissingScheme(_))
        ));
        cfg.otel_endpoint = Some("grpc://localhost:4317".to_string());
        assert!(cfg.validate().is_ok());
    }
}
