//! `fuzzy` module (spec §4.5): context-triggered piecewise hashing for
//! configured algorithms, bounded by `fuzzy_min_size`/`fuzzy_max_size`.
//!
//! No fuzzy-hashing crate appears anywhere in the reference corpus, so
//! this implements a minimal, dependency-free content-defined-chunking
//! digest directly: a rolling sum selects chunk boundaries, each chunk is
//! hashed, and the chunk hashes are joined into one digest string. It
//! trades exact ssdeep compatibility for portability.

use sha2::{Digest, Sha256};

use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::content_reader::ReaderParams;
use crate::patterns::Catalog;

const ROLLING_WINDOW: usize = 7;
const BOUNDARY_MASK: u32 = 0x1FFF; // ~1/8192 chance per byte, small blocks

pub struct FuzzyModule;

impl Module for FuzzyModule {
    fn id(&self) -> &'static str {
        "fuzzy"
    }

    fn enabled(&self, cfg: &Config) -> bool {
        cfg.fuzzy_enabled && !cfg.fuzzy_algorithms.is_empty()
    }

    fn collect(
        &self,
        ctx: &mut FileContext,
        cfg: &Config,
        _collaborators: &Collaborators,
        _catalog: &Catalog,
        task: &FileTask,
        record: &mut FileRecord,
    ) {
        let size = task.cached_file_info.size;
        if size < cfg.fuzzy_min_size || size > cfg.fuzzy_max_size {
            return;
        }
        let content = ctx.content(ReaderParams {
            max_size: cfg.fuzzy_max_size.min(10 * 1024 * 1024),
            mode: cfg.content_read_mode,
            mmap_min_size: cfg.mmap_min_size as u64,
            chunk_size: cfg.stream_chunk_size,
            overlap: cfg.stream_overlap_bytes,
        });
        if content.is_empty() {
            return;
        }
        for algo in &cfg.fuzzy_algorithms {
            record
                .fuzzy_hashes
                .insert(algo.clone(), piecewise_digest(content));
        }
    }
}

fn piecewise_digest(content: &[u8]) -> String {
    let mut boundaries = Vec::new();
    let mut window_sum: u32 = 0;
    let mut window: Vec<u8> = Vec::with_capacity(ROLLING_WINDOW);
    let mut start = 0usize;

    for (i, &byte) in content.iter().enumerate() {
        window.push(byte);
        window_sum = window_sum.wrapping_add(byte as u32);
        if window.len() > ROLLING_WINDOW {
            let evicted = window.remove(0);
            window_sum = window_sum.wrapping_sub(evicted as u32);
        }
        if window.len() == ROLLING_WINDOW && window_sum & BOUNDARY_MASK == BOUNDARY_MASK {
            boundaries.push((start, i + 1));
            start = i + 1;
        }
    }
    if start < content.len() {
        boundaries.push((start, content.len()));
    }
    if boundaries.is_empty() {
        boundaries.push((0, content.len()));
    }

    let mut digest = String::new();
    for (lo, hi) in boundaries {
        let mut hasher = Sha256::new();
        hasher.update(&content[lo..hi]);
        let hash = hasher.finalize();
        digest.push_str(&format!("{:02x}", hash[0]));
        digest.push(':');
    }
    digest.pop();
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_deterministic() {
        let content = b"the quick brown fox jumps over the lazy dog".repeat(50);
        let a = piecewise_digest(&content);
        let b = piecewise_digest(&content);
        assert_eq!(a, b);
    }

    #[test]
    fn similar_content_yields_similar_digest_prefix() {
        let base = "a".repeat(500) + "unique-tail-content-here";
        let mut modified = base.clone();
        modified.push_str("-extra");
        let da = piecewise_digest(base.as_bytes());
        let db = piecewise_digest(modified.as_bytes());
        let common_chunks = da.split(':').zip(db.split(':')).take_while(|(a, b)| a == b).count();
        assert!(common_chunks > 0);
    }
}
