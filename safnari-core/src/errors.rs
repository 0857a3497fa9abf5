//! Error kinds shared across the workspace, plus the machine-readable
//! error-code trait every kind implements.

/// A stable, machine-readable code for an error variant.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}

/// Configuration errors — rejected at startup (spec §7, kind: Configuration).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no scan target enabled: at least one of scan_files, scan_sensitive, scan_processes, collect_system_info must be true")]
    NoScanTargetEnabled,

    #[error("concurrency_level must be >= 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("stream_overlap_bytes ({overlap}) must be < stream_chunk_size ({chunk_size})")]
    OverlapNotLessThanChunk { overlap: usize, chunk_size: usize },

    #[error("otel_endpoint {0:?} has no scheme")]
    OtelEndpointMissingScheme(String),

    #[error("perf_profile {0:?} is not one of adaptive, ultra")]
    InvalidPerfProfile(String),

    #[error("sensitive_engine {0:?} is not one of auto, deterministic, hybrid")]
    InvalidSensitiveEngine(String),

    #[error("sensitive_longtail {0:?} is not one of off, sampled, full")]
    InvalidSensitiveLongtail(String),

    #[error("content_read_mode {0:?} is not one of auto, stream, mmap")]
    InvalidContentReadMode(String),

    #[error("no scan roots configured")]
    NoRoots,

    #[error("failed to read config file {path}: {message}")]
    FileRead { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    FileParse { path: String, message: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NoScanTargetEnabled => "CONFIG_NO_SCAN_TARGET",
            Self::InvalidConcurrency(_) => "CONFIG_INVALID_CONCURRENCY",
            Self::OverlapNotLessThanChunk { .. } => "CONFIG_OVERLAP_NOT_LESS_THAN_CHUNK",
            Self::OtelEndpointMissingScheme(_) => "CONFIG_OTEL_ENDPOINT_NO_SCHEME",
            Self::InvalidPerfProfile(_) => "CONFIG_INVALID_PERF_PROFILE",
            Self::InvalidSensitiveEngine(_) => "CONFIG_INVALID_SENSITIVE_ENGINE",
            Self::InvalidSensitiveLongtail(_) => "CONFIG_INVALID_SENSITIVE_LONGTAIL",
            Self::InvalidContentReadMode(_) => "CONFIG_INVALID_CONTENT_READ_MODE",
            Self::NoRoots => "CONFIG_NO_ROOTS",
            Self::FileRead { .. } => "CONFIG_FILE_READ",
            Self::FileParse { .. } => "CONFIG_FILE_PARSE",
        }
    }
}
