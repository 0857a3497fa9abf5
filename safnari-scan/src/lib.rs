//! Scan pipeline, content-matching engine, and adaptive controller (the
//! three core subsystems).

#![allow(dead_code)]

pub mod cancellation;
pub mod collaborators;
pub mod collector;
pub mod content_reader;
pub mod controller;
pub mod diagnostics;
pub mod io_limiter;
pub mod patterns;
pub mod path_guard;
pub mod pool;
pub mod progress;
pub mod scan;
pub mod walker;

pub use cancellation::CancellationToken;
pub use pool::{CollaboratorSet, RecordSink};
pub use scan::{run_scan, ScanCollaborators, ScanError, ScanOutcome};
