//! Dedicated writer thread for the NDJSON evidence stream (spec §4.8).
//! Mirrors the workspace's usual write-behind pattern: a bounded channel
//! feeds a single thread that owns the file handle and buffer, so workers
//! never contend on file I/O.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;

use safnari_core::{OutputRecord, SCHEMA_VERSION};
use safnari_scan::CancellationToken;

const CHANNEL_BOUND: usize = 4096;
const BUFFER_CAPACITY: usize = 1024 * 1024;
const FLUSH_EVERY_N: u32 = 64;
const FLUSH_INTERVAL: Duration = Duration::from_millis(500);
const RECV_POLL_INTERVAL: Duration = Duration::from_millis(200);

enum WriterCommand {
    Write(OutputRecord),
    Shutdown,
}

#[derive(Debug, Default, Clone)]
pub struct WriterStats {
    pub lines_written: u64,
    pub rotations: u64,
    pub fatal_error: Option<String>,
}

/// Owns the output file handle and buffer exclusively; everything else
/// reaches it through `send`.
pub struct OutputWriter {
    tx: Sender<WriterCommand>,
    handle: Option<JoinHandle<WriterStats>>,
}

impl OutputWriter {
    pub fn spawn(path: PathBuf, max_output_file_size: u64, token: CancellationToken) -> std::io::Result<Self> {
        let file = open_output_file(&path)?;
        let (tx, rx) = bounded(CHANNEL_BOUND);

        let handle = thread::Builder::new()
            .name("safnari-writer".to_string())
            .spawn(move || writer_loop(file, path, max_output_file_size, rx, token))
            .expect("failed to spawn safnari-writer thread");

        Ok(Self {
            tx,
            handle: Some(handle),
        })
    }

    /// Enqueues a record. Silently dropped if the writer has already
    /// shut down (spec §7, kind: Write — failures here never propagate).
    pub fn send(&self, record: OutputRecord) {
        let _ = self.tx.send(WriterCommand::Write(record));
    }

    /// Signals shutdown and blocks until the writer thread has flushed,
    /// synced, and closed the file.
    pub fn shutdown(mut self) -> WriterStats {
        let _ = self.tx.send(WriterCommand::Shutdown);
        self.handle.take().map(|h| h.join().unwrap_or_default()).unwrap_or_default()
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(WriterCommand::Shutdown);
    }
}

fn writer_loop(
    file: File,
    mut path: PathBuf,
    max_output_file_size: u64,
    rx: Receiver<WriterCommand>,
    token: CancellationToken,
) -> WriterStats {
    let mut out = BufWriter::with_capacity(BUFFER_CAPACITY, file);
    let mut bytes_written: u64 = 0;
    let mut rotation_index: u32 = 0;
    let mut lines_since_flush: u32 = 0;
    let mut last_flush = Instant::now();
    let mut first_write = true;
    let mut stats = WriterStats::default();

    loop {
        match rx.recv_timeout(RECV_POLL_INTERVAL) {
            Ok(WriterCommand::Write(record)) => {
                let Some(line) = format_line(&record) else {
                    tracing::warn!(record_type = record.record_type(), "failed to marshal record, dropping");
                    continue;
                };
                if let Err(e) = out.write_all(&line) {
                    tracing::warn!(error = %e, "failed to write record, dropping");
                    continue;
                }
                bytes_written += line.len() as u64;
                lines_since_flush += 1;
                stats.lines_written += 1;

                if first_write || lines_since_flush >= FLUSH_EVERY_N || last_flush.elapsed() > FLUSH_INTERVAL {
                    let _ = out.flush();
                    first_write = false;
                    lines_since_flush = 0;
                    last_flush = Instant::now();
                }

                if max_output_file_size > 0 && bytes_written >= max_output_file_size {
                    match rotate(&mut out, &path, &mut rotation_index) {
                        Ok(new_path) => {
                            path = new_path;
                            bytes_written = 0;
                            stats.rotations += 1;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "output rotation failed, aborting scan");
                            stats.fatal_error = Some(e.to_string());
                            token.cancel();
                            break;
                        }
                    }
                }
            }
            Ok(WriterCommand::Shutdown) => break,
            Err(RecvTimeoutError::Timeout) => {
                if lines_since_flush > 0 && last_flush.elapsed() > FLUSH_INTERVAL {
                    let _ = out.flush();
                    lines_since_flush = 0;
                    last_flush = Instant::now();
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let _ = out.flush();
    let _ = out.get_ref().sync_all();
    stats
}

#[derive(Serialize)]
struct Line {
    record_type: &'static str,
    schema_version: &'static str,
    payload: serde_json::Value,
}

fn format_line(record: &OutputRecord) -> Option<Vec<u8>> {
    let line = Line {
        record_type: record.record_type(),
        schema_version: SCHEMA_VERSION,
        payload: record.payload(),
    };
    let mut bytes = serde_json::to_vec(&line).ok()?;
    bytes.push(b'\n');
    Some(bytes)
}

fn rotate(out: &mut BufWriter<File>, path: &Path, rotation_index: &mut u32) -> std::io::Result<PathBuf> {
    out.flush()?;
    out.get_ref().sync_all()?;
    *rotation_index += 1;
    let next_path = rotated_path(path, *rotation_index);
    let next_file = open_output_file(&next_path)?;
    *out = BufWriter::with_capacity(BUFFER_CAPACITY, next_file);
    Ok(next_path)
}

fn rotated_path(path: &Path, index: u32) -> PathBuf {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("safnari");
    match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => path.with_file_name(format!("{stem}.{index}.{ext}")),
        None => path.with_file_name(format!("{stem}.{index}")),
    }
}

#[cfg(unix)]
fn open_output_file(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_output_file(path: &Path) -> std::io::Result<File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Default evidence path: `safnari-YYYYMMDD-HHMMSS-<unix>.ndjson` (spec §6).
pub fn default_output_path() -> PathBuf {
    let now = Utc::now();
    PathBuf::from(format!(
        "safnari-{}-{}.ndjson",
        now.format("%Y%m%d-%H%M%S"),
        now.timestamp()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use safnari_core::FileRecord;

    #[test]
    fn writes_ndjson_lines_with_record_type_and_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ndjson");
        let token = CancellationToken::new();
        let writer = OutputWriter::spawn(path.clone(), 0, token).unwrap();

        writer.send(OutputRecord::File(FileRecord::new("/a/b.txt")));
        let stats = writer.shutdown();

        assert_eq!(stats.lines_written, 1);
        let content = std::fs::read_to_string(&path).unwrap();
        let line = content.lines().next().unwrap();
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["record_type"], "file");
        assert_eq!(value["payload"]["path"], "/a/b.txt");
    }

    #[test]
    fn rotates_when_max_size_reached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ndjson");
        let token = CancellationToken::new();
        let writer = OutputWriter::spawn(path.clone(), 60, token).unwrap();

        for i in 0..5 {
            writer.send(OutputRecord::File(FileRecord::new(format!("/a/{i}.txt"))));
        }
        let stats = writer.shutdown();

        assert_eq!(stats.lines_written, 5);
        assert!(stats.rotations >= 1);
        assert!(dir.path().join("out.1.ndjson").exists());

        let mut total_lines = 0;
        for entry in std::fs::read_dir(dir.path()).unwrap() {
            let entry = entry.unwrap();
            total_lines += std::fs::read_to_string(entry.path()).unwrap().lines().count();
        }
        assert_eq!(total_lines, 5);
    }
}
