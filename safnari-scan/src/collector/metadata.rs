//! `metadata` module (spec §4.5): format-specific metadata bounded by
//! `metadata_max_bytes`. Parsers for PDF/DOCX/EXIF are out of scope; the
//! collaborator is free to report nothing.

use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::patterns::Catalog;

pub struct MetadataModule;

impl Module for MetadataModule {
    fn id(&self) -> &'static str {
        "metadata"
    }

    fn enabled(&self, _cfg: &Config) -> bool {
        true
    }

    fn collect(
        &self,
        ctx: &mut FileContext,
        cfg: &Config,
        collaborators: &Collaborators,
        _catalog: &Catalog,
        task: &FileTask,
        record: &mut FileRecord,
    ) {
        let mime = ctx.mime(collaborators.mime_probe).to_string();
        if let Ok(meta) =
            collaborators
                .metadata_extractor
                .extract(&task.absolute_path, &mime, cfg.metadata_max_bytes)
        {
            if !meta.is_empty() {
                record.metadata = meta;
            }
        }
    }
}
