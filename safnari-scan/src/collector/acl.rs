//! `acl` module (spec §4.5): opaque platform ACL text, when available.

use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::patterns::Catalog;

pub struct AclModule;

impl Module for AclModule {
    fn id(&self) -> &'static str {
        "acl"
    }

    fn enabled(&self, cfg: &Config) -> bool {
        cfg.acl_enabled
    }

    fn collect(
        &self,
        _ctx: &mut FileContext,
        _cfg: &Config,
        collaborators: &Collaborators,
        _catalog: &Catalog,
        task: &FileTask,
        record: &mut FileRecord,
    ) {
        record.acl = collaborators.acl_reader.read(&task.absolute_path);
    }
}
