//! NDJSON evidence writer (spec §4.8): a dedicated writer thread,
//! size-based rotation, and a durability policy tuned for throughput
//! over per-record fsync cost.

#![allow(dead_code)]

pub mod writer;

pub use writer::{default_output_path, OutputWriter, WriterStats};
