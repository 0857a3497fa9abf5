//! `mime` module (spec §4.5): signature-based detection, memoized on
//! `FileContext` for later modules.

use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::patterns::Catalog;

pub struct MimeModule;

impl Module for MimeModule {
    fn id(&self) -> &'static str {
        "mime"
    }

    fn enabled(&self, _cfg: &Config) -> bool {
        true
    }

    fn collect(
        &self,
        ctx: &mut FileContext,
        _cfg: &Config,
        collaborators: &Collaborators,
        _catalog: &Catalog,
        _task: &FileTask,
        record: &mut FileRecord,
    ) {
        record.mime_type = Some(ctx.mime(collaborators.mime_probe).to_string());
    }
}
