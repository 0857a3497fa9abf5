//! `search` module (spec §4.5): literal search term counting, either
//! streamed or over already-cached content bytes.

use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::content_reader::{self, ReaderParams};
use crate::patterns::{search_counter, Catalog};

pub struct SearchModule;

impl Module for SearchModule {
    fn id(&self) -> &'static str {
        "search"
    }

    fn enabled(&self, cfg: &Config) -> bool {
        !cfg.search_terms.is_empty()
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
        let params = ReaderParams {
            max_size: cfg.max_file_size,
            mode: cfg.content_read_mode,
            mmap_min_size: cfg.mmap_min_size as u64,
            chunk_size: cfg.stream_chunk_size,
            overlap: cfg.stream_overlap_bytes,
        };

        let hits = if !ctx.has_cached_content() && matches!(cfg.content_read_mode, safnari_core::ContentReadMode::Stream) {
            stream_count(&task.absolute_path, params, &cfg.search_terms)
        } else {
            search_counter::count(ctx.content(params), &cfg.search_terms)
        };

        if !hits.is_empty() {
            record.search_hits = hits
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .collect();
        }
    }
}

fn stream_count(
    path: &std::path::Path,
    params: ReaderParams,
    terms: &[String],
) -> safnari_core::FxHashMap<String, usize> {
    match content_reader::read_content(path, params) {
        Ok(bytes) => search_counter::count(&bytes, terms),
        Err(_) => safnari_core::FxHashMap::default(),
    }
}
