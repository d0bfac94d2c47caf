use std::fs;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Instant;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::{ProgressEvent, ProgressSink};
use crate::catalog::ProductFileClient;
use crate::classify::classify;
use crate::domain::DownloadTask;
use crate::error::FetchError;
use crate::fs_util::{PART_SUFFIX, remove_stale_parts, temp_file_in};

#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    // Returns whether the token was already cancelled.
    pub fn cancel(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DownloadPlan {
    pub queued: Vec<DownloadTask>,
    pub already_present: usize,
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadReport {
    pub attempted: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub already_present: usize,
    pub rejected: usize,
    pub cancelled: usize,
    pub bytes: u64,
    pub interrupted: bool,
}

enum TaskOutcome {
    Downloaded { filename: String, bytes: u64 },
    Failed { filename: String, error: FetchError },
    Rejected { filename: String },
    Cancelled { filename: String },
}

// Fails every write once the token is cancelled, so a transfer in flight
// stops at its next chunk and its temp file is dropped.
struct CancellableWriter<'w, W: Write> {
    inner: &'w mut W,
    cancel: &'w CancelToken,
}

impl<W: Write> Write for CancellableWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::other("download interrupted"));
        }
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

pub struct Downloader<'a, F: ProductFileClient> {
    client: &'a F,
    base_dir: Utf8PathBuf,
    max_workers: usize,
    cancel: CancelToken,
}

impl<'a, F: ProductFileClient> Downloader<'a, F> {
    pub fn new(client: &'a F, base_dir: &Utf8Path, max_workers: usize) -> Result<Self, FetchError> {
        if max_workers == 0 {
            return Err(FetchError::InvalidWorkerCount(max_workers));
        }
        Ok(Self {
            client,
            base_dir: base_dir.to_owned(),
            max_workers,
            cancel: CancelToken::default(),
        })
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn plan(&self, urls: &[String]) -> DownloadPlan {
        let mut plan = DownloadPlan::default();
        for url in urls {
            let task = DownloadTask::from_url(url);
            let dir = match classify(&task.filename) {
                Ok(dir) => dir.under(&self.base_dir),
                Err(err) => {
                    warn!(url = %task.url, error = %err, "skipping unclassifiable file");
                    plan.rejected += 1;
                    continue;
                }
            };
            let removed = remove_stale_parts(&dir, &task.filename);
            if removed > 0 {
                debug!(%dir, filename = %task.filename, removed, "removed partial downloads");
            }
            let target = dir.join(&task.filename);
            if target.as_std_path().exists() {
                debug!(%target, "already downloaded");
                plan.already_present += 1;
                continue;
            }
            plan.queued.push(task);
        }
        plan
    }

    pub fn download(&self, urls: &[String], sink: &dyn ProgressSink) -> DownloadReport {
        let plan = self.plan(urls);
        let mut report = DownloadReport {
            already_present: plan.already_present,
            rejected: plan.rejected,
            ..DownloadReport::default()
        };
        let queued = plan.queued;
        if queued.is_empty() {
            return report;
        }

        let total = queued.len();
        let workers = self.max_workers.min(total);
        debug!(total, workers, "starting downloads");
        let next = AtomicUsize::new(0);
        let start = Instant::now();
        let (tx, rx) = mpsc::channel();
        let mut done = 0usize;

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let queued = &queued;
                scope.spawn(move || {
                    loop {
                        if self.cancel.is_cancelled() {
                            break;
                        }
                        let index = next.fetch_add(1, Ordering::Relaxed);
                        let Some(task) = queued.get(index) else {
                            break;
                        };
                        if tx.send(self.run_task(task)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            for outcome in rx {
                done += 1;
                let filename = match outcome {
                    TaskOutcome::Downloaded { filename, bytes } => {
                        report.attempted += 1;
                        report.downloaded += 1;
                        report.bytes += bytes;
                        filename
                    }
                    TaskOutcome::Failed { filename, error } => {
                        warn!(%filename, %error, "download failed");
                        report.attempted += 1;
                        report.failed += 1;
                        filename
                    }
                    TaskOutcome::Rejected { filename } => {
                        report.rejected += 1;
                        filename
                    }
                    TaskOutcome::Cancelled { filename } => {
                        debug!(%filename, "download abandoned");
                        report.attempted += 1;
                        report.cancelled += 1;
                        filename
                    }
                };
                sink.event(ProgressEvent {
                    message: format!("Downloading files {done}/{total} {filename}"),
                    elapsed: Some(start.elapsed()),
                });
            }
        });

        if self.cancel.is_cancelled() {
            report.interrupted = true;
            report.cancelled += total - done;
            info!(
                downloaded = report.downloaded,
                cancelled = report.cancelled,
                "downloads stopped by interrupt"
            );
        }
        report
    }

    fn run_task(&self, task: &DownloadTask) -> TaskOutcome {
        let dir = match classify(&task.filename) {
            Ok(dir) => dir.under(&self.base_dir),
            Err(err) => {
                warn!(url = %task.url, error = %err, "skipping unclassifiable file");
                return TaskOutcome::Rejected {
                    filename: task.filename.clone(),
                };
            }
        };
        match self.transfer(task, &dir) {
            Ok(bytes) => TaskOutcome::Downloaded {
                filename: task.filename.clone(),
                bytes,
            },
            Err(_) if self.cancel.is_cancelled() => TaskOutcome::Cancelled {
                filename: task.filename.clone(),
            },
            Err(error) => TaskOutcome::Failed {
                filename: task.filename.clone(),
                error,
            },
        }
    }

    // The body lands in a temp file next to the target and is renamed only
    // once complete, so an existing target is always a whole file.
    fn transfer(&self, task: &DownloadTask, dir: &Utf8Path) -> Result<u64, FetchError> {
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("create {dir}: {err}")))?;
        let mut temp = temp_file_in(dir, &format!(".{}", task.filename), PART_SUFFIX)?;
        let bytes = self.client.fetch(
            &task.url,
            &mut CancellableWriter {
                inner: &mut temp,
                cancel: &self.cancel,
            },
        )?;
        let target = dir.join(&task.filename);
        temp.persist(target.as_std_path())
            .map_err(|err| FetchError::Filesystem(format!("persist {target}: {err}")))?;
        debug!(%target, bytes, "downloaded");
        Ok(bytes)
    }
}
