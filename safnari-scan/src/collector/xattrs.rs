//! `xattrs` module (spec §4.5): enumerate names, base64-encode values,
//! drop the map entirely when empty.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::patterns::Catalog;

pub struct XattrsModule;

impl Module for XattrsModule {
    fn id(&self) -> &'static str {
        "xattrs"
    }

    fn enabled(&self, cfg: &Config) -> bool {
        cfg.xattrs_enabled
    }

    fn collect(
        &self,
        _ctx: &mut FileContext,
        cfg: &Config,
        collaborators: &Collaborators,
        _catalog: &Catalog,
        task: &FileTask,
        record: &mut FileRecord,
    ) {
        if let Some(raw) = collaborators
            .xattr_reader
            .read(&task.absolute_path, cfg.xattr_max_value_size)
        {
            if !raw.is_empty() {
                record.xattrs = raw
                    .into_iter()
                    .map(|(name, value)| (name, BASE64.encode(value)))
                    .collect();
            }
        }
    }
}
