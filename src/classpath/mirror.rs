//! Asynchronous mirroring of resolved libraries into a project's
//! deployment folder
//!
//! Jobs are keyed by project: two jobs for the same project never run at
//! the same time, and a job that is still waiting when a newer one is
//! scheduled for the same project is skipped. A project is forgotten again
//! once its last job has finished.

use crate::types::SdkError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Accepts copy requests without blocking the caller.
pub trait MirrorScheduler: Send + Sync {
    fn schedule(&self, project: &str, dest: &Path, files: Vec<PathBuf>);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MirrorOutcome {
    Copied(usize),
    Superseded,
}

#[derive(Default)]
struct ProjectQueue {
    running: AsyncMutex<()>,
    latest: AtomicU64,
}

type Queues = Arc<Mutex<HashMap<String, Arc<ProjectQueue>>>>;

pub struct MirrorJobs {
    runtime: Handle,
    queues: Queues,
}

impl MirrorJobs {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Jobs on the runtime the caller is running in, if any.
    pub fn current() -> Option<Self> {
        Handle::try_current().ok().map(Self::new)
    }

    pub fn spawn(
        &self,
        project: &str,
        dest: PathBuf,
        files: Vec<PathBuf>,
    ) -> JoinHandle<Result<MirrorOutcome, SdkError>> {
        let (queue, generation) = self.enqueue(project);
        let queues = Arc::clone(&self.queues);
        let project = project.to_string();

        self.runtime.spawn(async move {
            let outcome = {
                let _running = queue.running.lock().await;

                if queue.latest.load(Ordering::SeqCst) != generation {
                    debug!("Mirror job {} for {} superseded", generation, project);
                    Ok(MirrorOutcome::Superseded)
                } else {
                    copy_files(&dest, &files).await.map(|copied| {
                        info!("Mirrored {} file(s) for {} into {}", copied, project, dest.display());
                        MirrorOutcome::Copied(copied)
                    })
                }
            };

            forget_if_idle(&queues, &project, &queue, generation);
            outcome
        })
    }

    fn enqueue(&self, project: &str) -> (Arc<ProjectQueue>, u64) {
        let mut queues = self.queues.lock().unwrap_or_else(|e| e.into_inner());
        let queue = Arc::clone(queues.entry(project.to_string()).or_default());
        let generation = queue.latest.fetch_add(1, Ordering::SeqCst) + 1;
        (queue, generation)
    }
}

/// Drop the project's queue unless a newer job has been scheduled on it.
fn forget_if_idle(queues: &Queues, project: &str, queue: &Arc<ProjectQueue>, generation: u64) {
    let mut queues = queues.lock().unwrap_or_else(|e| e.into_inner());
    let current = queues.get(project).is_some_and(|q| Arc::ptr_eq(q, queue));
    if current && queue.latest.load(Ordering::SeqCst) == generation {
        queues.remove(project);
    }
}

impl MirrorScheduler for MirrorJobs {
    fn schedule(&self, project: &str, dest: &Path, files: Vec<PathBuf>) {
        let job = self.spawn(project, dest.to_path_buf(), files);
        let project = project.to_string();

        self.runtime.spawn(async move {
            match job.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Failed to mirror libraries for {}: {}", project, e),
                Err(e) => warn!("Mirror job for {} did not complete: {}", project, e),
            }
        });
    }
}

async fn copy_files(dest: &Path, files: &[PathBuf]) -> Result<usize, SdkError> {
    tokio::fs::create_dir_all(dest).await?;

    let mut copied = 0;
    for file in files {
        let Some(file_name) = file.file_name() else {
            continue;
        };
        if !tokio::fs::metadata(file).await.map(|m| m.is_file()).unwrap_or(false) {
            warn!("Not mirroring {}: not a file", file.display());
            continue;
        }

        tokio::fs::copy(file, dest.join(file_name)).await?;
        copied += 1;
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Vec<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jar");
        let b = dir.path().join("b.jar");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        (dir, vec![a, b])
    }

    #[tokio::test]
    async fn test_copies_files() {
        let (dir, files) = fixture();
        let dest = dir.path().join("war/WEB-INF/lib");
        let jobs = MirrorJobs::current().unwrap();

        let outcome = jobs.spawn("app", dest.clone(), files).await.unwrap().unwrap();
        assert_eq!(outcome, MirrorOutcome::Copied(2));
        assert_eq!(fs::read(dest.join("b.jar")).unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_skips_missing_files() {
        let (dir, mut files) = fixture();
        files.push(dir.path().join("missing.jar"));
        let jobs = MirrorJobs::current().unwrap();

        let outcome = jobs
            .spawn("app", dir.path().join("out"), files)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, MirrorOutcome::Copied(2));
    }

    #[tokio::test]
    async fn test_newer_job_supersedes_waiting_one() {
        let (dir, files) = fixture();
        let jobs = MirrorJobs::current().unwrap();

        // current-thread runtime: neither job runs before both are queued
        let first = jobs.spawn("app", dir.path().join("first"), files.clone());
        let second = jobs.spawn("app", dir.path().join("second"), files.clone());
        let other = jobs.spawn("other", dir.path().join("other"), files);

        assert_eq!(first.await.unwrap().unwrap(), MirrorOutcome::Superseded);
        assert_eq!(second.await.unwrap().unwrap(), MirrorOutcome::Copied(2));
        assert_eq!(other.await.unwrap().unwrap(), MirrorOutcome::Copied(2));
        assert!(!dir.path().join("first").exists());
    }

    #[tokio::test]
    async fn test_finished_projects_are_forgotten() {
        let (dir, files) = fixture();
        let jobs = MirrorJobs::current().unwrap();

        let first = jobs.spawn("app", dir.path().join("first"), files.clone());
        let second = jobs.spawn("app", dir.path().join("second"), files.clone());
        assert_eq!(jobs.queues.lock().unwrap().len(), 1);

        assert_eq!(first.await.unwrap().unwrap(), MirrorOutcome::Superseded);
        assert_eq!(second.await.unwrap().unwrap(), MirrorOutcome::Copied(2));
        assert!(jobs.queues.lock().unwrap().is_empty());

        // a later job starts a fresh queue
        let third = jobs.spawn("app", dir.path().join("third"), files);
        assert_eq!(third.await.unwrap().unwrap(), MirrorOutcome::Copied(2));
        assert!(jobs.queues.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_copies_in_background() {
        let (dir, files) = fixture();
        let dest = dir.path().join("war/WEB-INF/lib");
        let jobs = MirrorJobs::current().unwrap();

        jobs.schedule("app", &dest, files);
        assert!(!dest.join("a.jar").exists());

        // the queue entry goes away once the job is done
        for _ in 0..200 {
            if jobs.queues.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(fs::read(dest.join("a.jar")).unwrap(), b"a");
        assert_eq!(fs::read(dest.join("b.jar")).unwrap(), b"b");
    }
}
