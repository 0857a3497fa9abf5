//! Fixed-size worker pool (spec §4.6): each worker drains the walker's
//! task channel, runs the module pipeline once per file, and forwards
//! the resulting record to the caller-supplied sink.
//!
//! The sink is a plain closure rather than a concrete writer type so this
//! crate never depends on `safnari-output` (the dependency runs the
//! other way: the writer needs `CancellationToken` from here).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

use safnari_core::{Config, FileRecord, FileTask, Metrics, OutputRecord};

use crate::cancellation::CancellationToken;
use crate::collaborators::{
    AclReader, AdsReader, Hasher, MetadataExtractor, MimeProbe, PlatformFileId, PlatformTimes,
    XattrReader,
};
use crate::collector::{build_pipeline, run_pipeline, Collaborators, FileContext, Module};
use crate::patterns::Catalog;
use crate::progress::{send_tick, ProgressTick};

/// Owned collaborator instances, bundled once per scan so every worker
/// can borrow from the same set without locking (spec §9).
pub struct CollaboratorSet {
    pub mime_probe: Box<dyn MimeProbe>,
    pub hasher: Box<dyn Hasher>,
    pub metadata_extractor: Box<dyn MetadataExtractor>,
    pub xattr_reader: Box<dyn XattrReader>,
    pub acl_reader: Box<dyn AclReader>,
    pub ads_reader: Box<dyn AdsReader>,
    pub platform_times: Box<dyn PlatformTimes>,
    pub platform_file_id: Box<dyn PlatformFileId>,
}

impl CollaboratorSet {
    pub fn borrow(&self) -> Collaborators<'_> {
        Collaborators {
            mime_probe: self.mime_probe.as_ref(),
            hasher: self.hasher.as_ref(),
            metadata_extractor: self.metadata_extractor.as_ref(),
            xattr_reader: self.xattr_reader.as_ref(),
            acl_reader: self.acl_reader.as_ref(),
            ads_reader: self.ads_reader.as_ref(),
            platform_times: self.platform_times.as_ref(),
            platform_file_id: self.platform_file_id.as_ref(),
        }
    }
}

pub type RecordSink = Arc<dyn Fn(OutputRecord) + Send + Sync>;

/// Spawns `n` worker threads sharing the given collaborators, catalog,
/// and channels. Returns their join handles; the caller joins them after
/// the walker has finished sending and the channel has drained.
/// Worker threads above `active_limit` back off instead of picking up
/// new tasks, so the adaptive controller can shrink effective
/// concurrency without tearing threads down (spec §4.7).
const THROTTLE_BACKOFF: Duration = Duration::from_millis(50);

#[allow(clippy::too_many_arguments)]
pub fn spawn_workers(
    n: usize,
    cfg: Arc<Config>,
    catalog: Arc<Catalog>,
    collaborators: Arc<CollaboratorSet>,
    rx: Receiver<FileTask>,
    progress_tx: Sender<ProgressTick>,
    record_sink: RecordSink,
    metrics: Arc<Metrics>,
    active_limit: Arc<AtomicUsize>,
    token: CancellationToken,
) -> Vec<std::thread::JoinHandle<()>> {
    (0..n)
        .map(|i| {
            let cfg = cfg.clone();
            let catalog = catalog.clone();
            let collaborators = collaborators.clone();
            let rx = rx.clone();
            let progress_tx = progress_tx.clone();
            let record_sink = record_sink.clone();
            let metrics = metrics.clone();
            let active_limit = active_limit.clone();
            let token = token.clone();
            std::thread::Builder::new()
                .name(format!("safnari-worker-{i}"))
                .spawn(move || {
                    run_worker(
                        i,
                        &cfg,
                        &catalog,
                        &collaborators,
                        &rx,
                        &progress_tx,
                        &record_sink,
                        &metrics,
                        &active_limit,
                        &token,
                    )
                })
                .expect("failed to spawn worker thread")
        })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn run_worker(
    worker_index: usize,
    cfg: &Config,
    catalog: &Catalog,
    collaborators: &CollaboratorSet,
    rx: &Receiver<FileTask>,
    progress_tx: &Sender<ProgressTick>,
    record_sink: &RecordSink,
    metrics: &Metrics,
    active_limit: &AtomicUsize,
    token: &CancellationToken,
) {
    let pipeline = build_pipeline();
    let borrowed = collaborators.borrow();

    loop {
        if token.is_cancelled() {
            return;
        }
        if worker_index >= active_limit.load(Ordering::Relaxed) {
            std::thread::sleep(THROTTLE_BACKOFF);
            continue;
        }

        let task = match rx.recv_timeout(THROTTLE_BACKOFF) {
            Ok(task) => task,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        };

        let mut ctx = FileContext::new(task.absolute_path.clone());
        let mut record = FileRecord::new(task.absolute_path.to_string_lossy().to_string());

        run_pipeline(&pipeline, &mut ctx, cfg, &borrowed, catalog, &task, &mut record);

        metrics.files_scanned.fetch_add(1, Ordering::Relaxed);

        if cfg.scan_files || record.has_signal() {
            metrics.files_processed.fetch_add(1, Ordering::Relaxed);
            record_sink(OutputRecord::File(record));
        }

        send_tick(progress_tx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{
        NoopAclReader, NoopAdsReader, NoopMetadataExtractor, NoopXattrReader, SignatureMimeProbe,
        StdPlatformTimes, UnixFileId,
    };
    use crate::patterns::Catalog;
    use crossbeam_channel::unbounded;
    use safnari_core::CachedFileInfo;
    use std::sync::Mutex;

    fn noop_collaborators() -> CollaboratorSet {
        CollaboratorSet {
            mime_probe: Box::new(SignatureMimeProbe),
            hasher: Box::new(crate::collaborators::MultiHasher),
            metadata_extractor: Box::new(NoopMetadataExtractor),
            xattr_reader: Box::new(NoopXattrReader),
            acl_reader: Box::new(NoopAclReader),
            ads_reader: Box::new(NoopAdsReader),
            platform_times: Box::new(StdPlatformTimes),
            platform_file_id: Box::new(UnixFileId),
        }
    }

    #[test]
    fn worker_processes_tasks_and_forwards_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();

        let mut cfg = Config::default();
        cfg.roots.push(dir.path().to_path_buf());
        cfg.hash_algorithms = vec!["sha256".to_string()];

        let catalog = Arc::new(Catalog::build(&[], &[], &[]));
        let collaborators = Arc::new(noop_collaborators());
        let (task_tx, task_rx) = unbounded();
        let (progress_tx, progress_rx) = unbounded();
        let received = Arc::new(Mutex::new(Vec::new()));
        let received2 = received.clone();
        let sink: RecordSink = Arc::new(move |rec| received2.lock().unwrap().push(rec));
        let metrics = Arc::new(Metrics::new());
        let active_limit = Arc::new(std::sync::atomic::AtomicUsize::new(1));
        let token = CancellationToken::new();

        task_tx
            .send(FileTask {
                absolute_path: path.clone(),
                cached_file_info: CachedFileInfo::default(),
            })
            .unwrap();
        drop(task_tx);

        run_worker(
            0,
            &cfg,
            &catalog,
            &collaborators,
            &task_rx,
            &progress_tx,
            &sink,
            &metrics,
            &active_limit,
            &token,
        );

        drop(progress_tx);
        assert_eq!(progress_rx.iter().count(), 1);
        assert_eq!(received.lock().unwrap().len(), 1);
        assert_eq!(metrics.files_scanned.load(Ordering::Relaxed), 1);
    }
}
