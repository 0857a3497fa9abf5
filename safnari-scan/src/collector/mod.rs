//! File collector: the fixed, ordered module pipeline (spec §4.5).
//!
//! Order is significant: earlier modules populate fields later ones read
//! (MIME before metadata; content-dependent modules share the
//! `FileContext` cache). Order: `base → xattrs → acl → ads → mime →
//! hashes → metadata → fuzzy → sensitive → search`.

pub mod acl;
pub mod ads;
pub mod base;
pub mod fuzzy;
pub mod hashes;
pub mod metadata;
pub mod mime;
pub mod search;
pub mod sensitive;
pub mod xattrs;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use safnari_core::{Config, FileRecord, FileTask};

use crate::collaborators::{
    AclReader, AdsReader, Hasher, MetadataExtractor, MimeProbe, PlatformFileId, PlatformTimes,
    XattrReader,
};
use crate::content_reader::{self, ReaderParams};
use crate::patterns::Catalog;

/// Per-task state, owned by exactly one worker. Memoizes MIME and
/// content bytes so later modules share a single read (spec §9, "Lazy
/// memoized context").
pub struct FileContext {
    pub path: PathBuf,
    mime: Option<String>,
    content: Option<Vec<u8>>,
}

impl FileContext {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            mime: None,
            content: None,
        }
    }

    pub fn mime(&mut self, probe: &dyn MimeProbe) -> &str {
        if self.mime.is_none() {
            let detected = probe.probe(&self.path).unwrap_or_else(|_| "unknown".to_string());
            self.mime = Some(detected);
        }
        self.mime.as_deref().unwrap()
    }

    pub fn content(&mut self, params: ReaderParams) -> &[u8] {
        if self.content.is_none() {
            let bytes = content_reader::read_content(&self.path, params).unwrap_or_default();
            self.content = Some(bytes);
        }
        self.content.as_deref().unwrap()
    }

    pub fn has_cached_content(&self) -> bool {
        self.content.is_some()
    }
}

/// Collaborator handles a module may need; bundled so the pipeline
/// doesn't thread a dozen parameters through every `collect` call.
pub struct Collaborators<'a> {
    pub mime_probe: &'a dyn MimeProbe,
    pub hasher: &'a dyn Hasher,
    pub metadata_extractor: &'a dyn MetadataExtractor,
    pub xattr_reader: &'a dyn XattrReader,
    pub acl_reader: &'a dyn AclReader,
    pub ads_reader: &'a dyn AdsReader,
    pub platform_times: &'a dyn PlatformTimes,
    pub platform_file_id: &'a dyn PlatformFileId,
}

/// The narrow contract every pipeline stage implements (spec §9,
/// "Module pipeline over inheritance").
pub trait Module: Send + Sync {
    fn id(&self) -> &'static str;
    fn enabled(&self, cfg: &Config) -> bool;
    fn collect(
        &self,
        ctx: &mut FileContext,
        cfg: &Config,
        collaborators: &Collaborators,
        catalog: &Catalog,
        task: &FileTask,
        record: &mut FileRecord,
    );
}

/// Builds the fixed module order. Rebuilt once per scan and reused
/// across every worker to avoid per-file allocation.
pub fn build_pipeline() -> Vec<Box<dyn Module>> {
    vec![
        Box::new(base::BaseModule),
        Box::new(xattrs::XattrsModule),
        Box::new(acl::AclModule),
        Box::new(ads::AdsModule),
        Box::new(mime::MimeModule),
        Box::new(hashes::HashesModule),
        Box::new(metadata::MetadataModule),
        Box::new(fuzzy::FuzzyModule),
        Box::new(sensitive::SensitiveModule),
        Box::new(search::SearchModule),
    ]
}

/// Runs every enabled module in order. A panicking module is caught
/// (spec §9) and logged at debug as a collection failure; the record
/// keeps whichever fields earlier modules already populated (spec §7,
/// kind: Collection).
pub fn run_pipeline(
    pipeline: &[Box<dyn Module>],
    ctx: &mut FileContext,
    cfg: &Config,
    collaborators: &Collaborators,
    catalog: &Catalog,
    task: &FileTask,
    record: &mut FileRecord,
) {
    for module in pipeline {
        if !module.enabled(cfg) {
            continue;
        }
        let result = catch_unwind(AssertUnwindSafe(|| {
            module.collect(ctx, cfg, collaborators, catalog, task, record);
        }));
        if let Err(_panic) = result {
            tracing::debug!(
                module = module.id(),
                path = %task.absolute_path.display(),
                "collector module failed"
            );
        }
    }
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
