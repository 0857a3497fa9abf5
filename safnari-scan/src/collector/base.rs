//! `base` module (spec §4.5): identity, timestamps, attributes,
//! permissions, owner, file id.

use safnari_core::{Config, FileRecord, FileTask};

use super::{is_hidden, Collaborators, FileContext, Module};
use crate::patterns::Catalog;

pub struct BaseModule;

impl Module for BaseModule {
    fn id(&self) -> &'static str {
        "base"
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
        task: &FileTask,
        record: &mut FileRecord,
    ) {
        let path = &task.absolute_path;
        record.name = path.file_name().map(|n| n.to_string_lossy().to_string());
        record.size = Some(task.cached_file_info.size);

        if let Ok(times) = collaborators.platform_times.times(path) {
            record.creation_time = times.creation;
            record.access_time = times.access;
            record.change_time = times.change;
        }
        record.mod_time = chrono::DateTime::from_timestamp(task.cached_file_info.mod_time_unix, 0);

        let mut attributes = Vec::new();
        if task.cached_file_info.is_symlink {
            attributes.push("symlink".to_string());
        }
        if is_hidden(path) {
            attributes.push("hidden".to_string());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Ok(meta) = std::fs::symlink_metadata(path) {
                let mode = meta.permissions().mode();
                record.permissions = Some(format!("{:o}", mode & 0o777));
                if mode & 0o200 == 0 {
                    attributes.push("read-only".to_string());
                }
                record.owner = Some(format!("uid={}", owner_uid(&meta)));
            }
        }
        #[cfg(not(unix))]
        {
            if let Ok(meta) = std::fs::symlink_metadata(path) {
                if meta.permissions().readonly() {
                    attributes.push("read-only".to_string());
                }
            }
        }

        record.attributes = attributes;
        record.file_id = collaborators.platform_file_id.file_id(path);
        let _ = ctx;
    }
}

#[cfg(unix)]
fn owner_uid(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::MetadataExt;
    meta.uid()
}
