//! `hashes` module (spec §4.5): multi-algorithm hashing by one streamed
//! read.

use safnari_core::{Config, FileRecord, FileTask};

use super::{Collaborators, FileContext, Module};
use crate::patterns::Catalog;

pub struct HashesModule;

impl Module for HashesModule {
    fn id(&self) -> &'static str {
        "hashes"
    }

    fn enabled(&self, cfg: &Config) -> bool {
        !cfg.hash_algorithms.is_empty()
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
        if let Ok(hashes) = collaborators
            .hasher
            .hash(&task.absolute_path, &cfg.hash_algorithms)
        {
            record.hashes = hashes.into_iter().collect();
        }
    }
}
