//! Bug-report ingestion pipeline: classify, resolve, download, publish,
//! attach, clean up.
//!
//! One [`Pipeline::handle`] call is one run: it owns the files it downloads
//! and deletes them on every exit path. Runs share nothing but read-only
//! configuration and the media-group buffer, so any number may execute
//! concurrently.

mod classify;
mod download;
mod resolve;

pub use classify::{classify, Classification, ClassifyError, ProjectRouting, TRIGGER_MARKER};
pub use download::{DownloadOutcome, DownloadedFile, Downloader};
pub use resolve::{primary_attachment, resolve};

use crate::channels::{ChannelHandle, FileHost, InboundMessage};
use crate::history::GroupHistory;
use crate::tracker::{IssueHandle, IssueRequest, Tracker};
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Terminal state of one pipeline run.
#[derive(Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Message did not qualify; nothing was created, no notice sent.
    Skipped,
    /// Topic had no project mapping; reporter notified, nothing created.
    Unrouted,
    /// Issue creation failed; reporter notified, downloads cleaned up.
    PublishFailed,
    /// Issue created. Attachment counts are per-file outcomes: uploads that
    /// failed or downloads rejected for size never retract the creation.
    Published {
        issue: IssueHandle,
        attached: usize,
        failed: usize,
        rejected: usize,
    },
}

/// The ingestion pipeline and its collaborators, constructed once at startup
/// from read-only configuration.
pub struct Pipeline {
    host: Arc<dyn FileHost>,
    tracker: Arc<dyn Tracker>,
    notices: Arc<dyn ChannelHandle>,
    history: Arc<GroupHistory>,
    downloader: Downloader,
    routing: ProjectRouting,
    temp_root: PathBuf,
    /// How long a grouped submission waits for siblings to arrive before
    /// resolving whatever is buffered. Best-effort by design.
    group_settle: Duration,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        host: Arc<dyn FileHost>,
        tracker: Arc<dyn Tracker>,
        notices: Arc<dyn ChannelHandle>,
        history: Arc<GroupHistory>,
        downloader: Downloader,
        routing: ProjectRouting,
        temp_root: PathBuf,
        group_settle: Duration,
    ) -> Self {
        Self {
            host,
            tracker,
            notices,
            history,
            downloader,
            routing,
            temp_root,
            group_settle,
        }
    }

    /// Run the pipeline for one inbound message:
    /// classify → resolve → download → publish → attach → cleanup.
    pub async fn handle(&self, message: InboundMessage) -> RunOutcome {
        let classification = match classify(&message, &self.routing) {
            Ok(Some(c)) => c,
            Ok(None) => {
                log::debug!(
                    "message {} in {} does not qualify",
                    message.message_id,
                    message.conversation_id
                );
                return RunOutcome::Skipped;
            }
            Err(ClassifyError::UnmappedTopic { topic }) => {
                log::error!(
                    "no project mapping for topic {:?} (conversation {})",
                    topic,
                    message.conversation_id
                );
                self.notify(
                    &message.conversation_id,
                    &format!(
                        "Topic \"{}\" is not mapped to a tracker project; the report was not filed.",
                        topic
                    ),
                )
                .await;
                return RunOutcome::Unrouted;
            }
        };

        let siblings = match message.media_group_id {
            Some(ref group_id) => {
                tokio::time::sleep(self.group_settle).await;
                self.history.siblings(group_id, message.message_id).await
            }
            None => Vec::new(),
        };
        let references = resolve(&message, &siblings);

        let run_dir = self.temp_root.join(format!("run-{}", Uuid::new_v4()));
        let outcomes = join_all(
            references
                .iter()
                .map(|r| self.downloader.download(self.host.as_ref(), &run_dir, r)),
        )
        .await;

        let mut files: Vec<DownloadedFile> = Vec::new();
        let mut rejected = 0usize;
        for outcome in outcomes {
            match outcome {
                DownloadOutcome::Downloaded(file) => files.push(file),
                DownloadOutcome::SizeExceeded { reference, size } => {
                    rejected += 1;
                    log::warn!(
                        "attachment {} rejected for size (declared {:?}, limit {})",
                        reference.file_id,
                        size,
                        self.downloader.max_bytes()
                    );
                    self.notify(
                        &message.conversation_id,
                        &size_notice(self.downloader.max_bytes()),
                    )
                    .await;
                }
                DownloadOutcome::Failed { reference, error } => {
                    log::warn!("download of {} failed: {}", reference.file_id, error);
                }
            }
        }

        let request = IssueRequest {
            project_key: classification.project_key,
            title: classification.title,
            description: classification.description,
        };
        let issue = match self.tracker.create_issue(&request).await {
            Ok(issue) => issue,
            Err(e) => {
                log::error!(
                    "issue creation failed for conversation {}: {}",
                    message.conversation_id,
                    e
                );
                self.notify(
                    &message.conversation_id,
                    "Failed to create the issue in the tracker.",
                )
                .await;
                cleanup_run_dir(&run_dir).await;
                return RunOutcome::PublishFailed;
            }
        };
        log::info!(
            "issue {} (id {}) created for conversation {}",
            issue.key,
            issue.id,
            message.conversation_id
        );
        self.notify(
            &message.conversation_id,
            &format!(
                "Issue created successfully!\nissue key = {}, issue id = {}",
                issue.key, issue.id
            ),
        )
        .await;

        let mut attached = 0usize;
        let mut failed = 0usize;
        let issue_ref = &issue;
        let attempts = join_all(files.iter().map(|file| async move {
            let file_name = file
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(file.reference.file_id.as_str());
            self.tracker
                .attach_file(issue_ref, &file.path, file_name)
                .await
                .map_err(|e| (file, e))
        }))
        .await;
        for attempt in attempts {
            match attempt {
                Ok(()) => attached += 1,
                Err((file, e)) => {
                    failed += 1;
                    log::warn!(
                        "attaching {} to issue {} failed: {}",
                        file.path.display(),
                        issue.key,
                        e
                    );
                }
            }
        }

        cleanup_run_dir(&run_dir).await;
        RunOutcome::Published {
            issue,
            attached,
            failed,
            rejected,
        }
    }

    async fn notify(&self, conversation_id: &str, text: &str) {
        if let Err(e) = self.notices.send_message(conversation_id, text).await {
            log::warn!("sending notice to {} failed: {}", conversation_id, e);
        }
    }
}

fn size_notice(max_bytes: u64) -> String {
    format!(
        "The file is larger than {} MB. Please reduce the file size.",
        max_bytes / 1_000_000
    )
}

/// Delete a run's scratch directory. Safe to call repeatedly and when the
/// directory was never created.
pub async fn cleanup_run_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => log::debug!("cleared run directory {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("clearing run directory {} failed: {}", dir.display(), e),
    }
}
