//! `ads` module (spec §4.5): Windows alternate data stream names; the
//! default data stream is filtered by the collaborator implementation.

use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::patterns::Catalog;

pub struct AdsModule;

impl Module for AdsModule {
    fn id(&self) -> &'static str {
        "ads"
    }

    fn enabled(&self, cfg: &Config) -> bool {
        cfg.ads_enabled
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
        let streams = collaborators.ads_reader.read(&task.absolute_path);
        if !streams.is_empty() {
            record.alternate_data_streams = streams;
        }
    }
}
