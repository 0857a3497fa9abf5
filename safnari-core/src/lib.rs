//! Foundation crate for the Safnari scanner.
//!
//! Defines configuration, error types, the evidence data model, hashmap
//! aliases, and logging setup. Every other crate in the workspace depends
//! on this one.

#![allow(dead_code)]

pub mod collections;
pub mod config;
pub mod errors;
pub mod logging;
pub mod model;

pub use collections::{FxHashMap, FxHashSet};
pub use config::{
    Config, ConfigOverlay, ContentReadMode, CustomPattern, NiceLevel, PerfProfile, RedactionMode,
    SensitiveEngine, SensitiveGateMode, SensitiveLongtail,
};
pub use errors::{ConfigError, ErrorCode};
pub use model::{
    AutoTuneState, CachedFileInfo, FileRecord, FileTask, Metrics, MetricsSnapshot, OutputRecord,
    SCHEMA_VERSION,
};
