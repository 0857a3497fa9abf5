//! Flag surface (spec §3, §6): one `clap` flag per resolved config key,
//! `--config` override, `-v`/`-q` verbosity, and the progress toggles.
//! Every flag is optional; absence means "inherit from file or default"
//! (spec §3's `defaults ← file ← flags` precedence).

use std::path::PathBuf;

use clap::Parser;
use safnari_core::{
    ConfigOverlay, ContentReadMode, NiceLevel, PerfProfile, RedactionMode, SensitiveEngine,
    SensitiveGateMode, SensitiveLongtail,
};

#[derive(Debug, Parser)]
#[command(name = "safnari", version, about = "Host-local security scanner")]
pub struct Cli {
    /// Path to a TOML config file. Defaults to `./safnari.toml` if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all but warnings and errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Directories to scan. Repeatable.
    #[arg(long = "root")]
    pub roots: Vec<PathBuf>,

    #[arg(long)]
    pub scan_files: Option<bool>,
    #[arg(long)]
    pub scan_sensitive: Option<bool>,
    #[arg(long)]
    pub scan_processes: Option<bool>,
    #[arg(long)]
    pub collect_system_info: Option<bool>,

    #[arg(long)]
    pub follow_symlinks: Option<bool>,
    #[arg(long)]
    pub max_file_size: Option<u64>,
    #[arg(long)]
    pub all_drives: Option<bool>,

    #[arg(long = "include")]
    pub include_globs: Vec<String>,
    #[arg(long = "exclude")]
    pub exclude_globs: Vec<String>,

    #[arg(long)]
    pub delta_scan: Option<bool>,
    #[arg(long)]
    pub delta_scan_sidecar_path: Option<PathBuf>,

    #[arg(long)]
    pub concurrency_level: Option<usize>,
    #[arg(long)]
    pub max_io_per_second: Option<u32>,
    #[arg(long, value_enum)]
    pub perf_profile: Option<PerfProfileArg>,
    #[arg(long, value_enum)]
    pub nice_level: Option<NiceLevelArg>,

    #[arg(long, value_enum)]
    pub content_read_mode: Option<ContentReadModeArg>,

    #[arg(long = "data-type")]
    pub include_data_types: Vec<String>,
    #[arg(long = "exclude-data-type")]
    pub exclude_data_types: Vec<String>,
    #[arg(long, value_enum)]
    pub sensitive_engine: Option<SensitiveEngineArg>,
    #[arg(long, value_enum)]
    pub sensitive_longtail: Option<SensitiveLongtailArg>,
    #[arg(long, value_enum)]
    pub sensitive_gate_mode: Option<SensitiveGateModeArg>,
    #[arg(long, value_enum)]
    pub redaction: Option<RedactionModeArg>,
    #[arg(long = "search")]
    pub search_terms: Vec<String>,

    #[arg(long)]
    pub xattrs_enabled: Option<bool>,
    #[arg(long)]
    pub acl_enabled: Option<bool>,
    #[arg(long)]
    pub ads_enabled: Option<bool>,
    #[arg(long = "hash")]
    pub hash_algorithms: Vec<String>,
    #[arg(long)]
    pub fuzzy_enabled: Option<bool>,

    /// Output NDJSON path. Defaults to an auto-generated timestamped
    /// filename in the current directory (spec §6).
    #[arg(short = 'o', long)]
    pub output_path: Option<PathBuf>,
    #[arg(long)]
    pub max_output_file_size: Option<u64>,

    /// Skip the pre-count pass; progress renders as an indeterminate
    /// spinner instead of a percentage (spec §4.9).
    #[arg(long)]
    pub count_only: bool,
    #[arg(long)]
    pub no_progress: bool,

    #[arg(long)]
    pub diag_slow_scan_threshold_secs: Option<u64>,
    #[arg(long)]
    pub diag_dir: Option<PathBuf>,

    #[arg(long)]
    pub otel_endpoint: Option<String>,
}

macro_rules! value_enum_arg {
    ($name:ident, $target:ty, { $($variant:ident => $value:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, clap::ValueEnum)]
        pub enum $name {
            $($variant),+
        }

        impl From<$name> for $target {
            fn from(v: $name) -> Self {
                match v {
                    $($name::$variant => $value),+
                }
            }
        }
    };
}

value_enum_arg!(PerfProfileArg, PerfProfile, { Adaptive => PerfProfile::Adaptive, Ultra => PerfProfile::Ultra });
value_enum_arg!(NiceLevelArg, NiceLevel, { Low => NiceLevel::Low, Medium => NiceLevel::Medium, High => NiceLevel::High });
value_enum_arg!(ContentReadModeArg, ContentReadMode, { Auto => ContentReadMode::Auto, Stream => ContentReadMode::Stream, Mmap => ContentReadMode::Mmap });
value_enum_arg!(SensitiveEngineArg, SensitiveEngine, { Auto => SensitiveEngine::Auto, Deterministic => SensitiveEngine::Deterministic, Hybrid => SensitiveEngine::Hybrid });
value_enum_arg!(SensitiveLongtailArg, SensitiveLongtail, { Off => SensitiveLongtail::Off, Sampled => SensitiveLongtail::Sampled, Full => SensitiveLongtail::Full });
value_enum_arg!(SensitiveGateModeArg, SensitiveGateMode, { Off => SensitiveGateMode::Off, Safe => SensitiveGateMode::Safe, Aggressive => SensitiveGateMode::Aggressive });
value_enum_arg!(RedactionModeArg, RedactionMode, { Mask => RedactionMode::Mask, Hash => RedactionMode::Hash, None => RedactionMode::None });

impl Cli {
    /// Resolved log verbosity: `-q` wins over any `-v` count.
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }

    /// Builds the flag-layer overlay. Empty `Vec` fields are omitted
    /// (`None`) rather than applied as an explicit empty override, so an
    /// unset repeatable flag doesn't clobber the config file's value.
    pub fn to_overlay(&self) -> ConfigOverlay {
        ConfigOverlay {
            scan_files: self.scan_files,
            scan_sensitive: self.scan_sensitive,
            scan_processes: self.scan_processes,
            collect_system_info: self.collect_system_info,
            roots: non_empty(&self.roots),
            follow_symlinks: self.follow_symlinks,
            max_file_size: self.max_file_size,
            all_drives: self.all_drives,
            include_globs: non_empty(&self.include_globs),
            exclude_globs: non_empty(&self.exclude_globs),
            include_regexes: None,
            exclude_regexes: None,
            delta_scan: self.delta_scan,
            delta_scan_sidecar_path: self.delta_scan_sidecar_path.clone(),
            concurrency_level: self.concurrency_level,
            max_io_per_second: self.max_io_per_second,
            perf_profile: self.perf_profile.map(Into::into),
            nice_level: self.nice_level.map(Into::into),
            auto_tune_interval_secs: None,
            content_read_mode: self.content_read_mode.map(Into::into),
            mmap_min_size: None,
            stream_chunk_size: None,
            stream_overlap_bytes: None,
            include_data_types: non_empty(&self.include_data_types),
            exclude_data_types: non_empty(&self.exclude_data_types),
            custom_patterns: None,
            sensitive_engine: self.sensitive_engine.map(Into::into),
            sensitive_longtail: self.sensitive_longtail.map(Into::into),
            sensitive_gate_mode: self.sensitive_gate_mode.map(Into::into),
            max_matches_per_type: None,
            max_matches_total: None,
            redaction: self.redaction.map(Into::into),
            search_terms: non_empty(&self.search_terms),
            xattrs_enabled: self.xattrs_enabled,
            xattr_max_value_size: None,
            acl_enabled: self.acl_enabled,
            ads_enabled: self.ads_enabled,
            hash_algorithms: non_empty(&self.hash_algorithms),
            metadata_max_bytes: None,
            fuzzy_enabled: self.fuzzy_enabled,
            fuzzy_algorithms: None,
            fuzzy_min_size: None,
            fuzzy_max_size: None,
            output_path: self.output_path.clone(),
            max_output_file_size: self.max_output_file_size,
            skip_count: if self.count_only { Some(true) } else { None },
            diag_slow_scan_threshold_secs: self.diag_slow_scan_threshold_secs,
            diag_dir: self.diag_dir.clone(),
            diag_goroutine_leak: None,
            otel_endpoint: self.otel_endpoint.clone(),
        }
    }
}

fn non_empty<T: Clone>(v: &[T]) -> Option<Vec<T>> {
    if v.is_empty() {
        None
    } else {
        Some(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn unset_repeatable_flags_do_not_override() {
        let cli = Cli::parse_from(["safnari", "--root", "/tmp"]);
        let overlay = cli.to_overlay();
        assert_eq!(overlay.roots, Some(vec![PathBuf::from("/tmp")]));
        assert!(overlay.search_terms.is_none());
        assert!(overlay.include_globs.is_none());
    }

    #[test]
    fn quiet_overrides_verbose_count() {
        let cli = Cli::parse_from(["safnari", "-vvv", "-q"]);
        assert_eq!(cli.verbosity(), 0);
    }

    #[test]
    fn count_only_sets_skip_count() {
        let cli = Cli::parse_from(["safnari", "--count-only"]);
        assert_eq!(cli.to_overlay().skip_count, Some(true));
    }
}
