//! Bounded downloader: fetch a remote file into the run's scratch directory,
//! enforcing the configured size limit.

use crate::channels::{AttachmentRef, FileHost};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// A file accepted by the downloader. Invariant: `size` never exceeds the
/// configured maximum; oversized remotes are reported, not materialized.
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub size: u64,
    pub reference: AttachmentRef,
}

/// Per-reference download result. Rejections and failures are contained to
/// their reference; they never abort sibling downloads.
#[derive(Debug)]
pub enum DownloadOutcome {
    Downloaded(DownloadedFile),
    /// Remote content exceeds the size limit. `size` is the declared length
    /// when the host announced one; None when the stream was cut off mid-fetch.
    SizeExceeded {
        reference: AttachmentRef,
        size: Option<u64>,
    },
    Failed {
        reference: AttachmentRef,
        error: String,
    },
}

/// Downloads remote files into run-scoped directories, never accepting more
/// than `max_bytes` per file.
pub struct Downloader {
    client: reqwest::Client,
    max_bytes: u64,
}

impl Downloader {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(DOWNLOAD_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Resolve `reference` through `host`, fetch it, and write it under
    /// `run_dir` named after the remote file's basename.
    pub async fn download(
        &self,
        host: &dyn FileHost,
        run_dir: &Path,
        reference: &AttachmentRef,
    ) -> DownloadOutcome {
        let failed = |error: String| DownloadOutcome::Failed {
            reference: reference.clone(),
            error,
        };

        let remote = match host.resolve_file(&reference.file_id).await {
            Ok(remote) => remote,
            Err(e) => return failed(e),
        };

        let res = match self.client.get(&remote.url).send().await {
            Ok(res) => res,
            Err(e) => return failed(e.to_string()),
        };
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return failed(format!("fetch failed: {} {}", status, body));
        }

        if let Some(declared) = res.content_length() {
            if declared > self.max_bytes {
                return DownloadOutcome::SizeExceeded {
                    reference: reference.clone(),
                    size: Some(declared),
                };
            }
        }

        let mut bytes: Vec<u8> = Vec::new();
        let mut stream = res.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return failed(e.to_string()),
            };
            if bytes.len() as u64 + chunk.len() as u64 > self.max_bytes {
                return DownloadOutcome::SizeExceeded {
                    reference: reference.clone(),
                    size: None,
                };
            }
            bytes.extend_from_slice(&chunk);
        }

        let file_name = local_file_name(&remote.remote_path, reference);
        if let Err(e) = tokio::fs::create_dir_all(run_dir).await {
            return failed(format!("creating {}: {}", run_dir.display(), e));
        }
        let path = run_dir.join(&file_name);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            return failed(format!("writing {}: {}", path.display(), e));
        }

        log::debug!(
            "downloaded {} ({} bytes) to {}",
            reference.file_id,
            bytes.len(),
            path.display()
        );
        DownloadOutcome::Downloaded(DownloadedFile {
            path,
            size: bytes.len() as u64,
            reference: reference.clone(),
        })
    }
}

/// Local name for a fetched file: the remote path's basename, falling back to
/// the declared file name, then the opaque file id.
fn local_file_name(remote_path: &str, reference: &AttachmentRef) -> String {
    remote_path
        .rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| reference.file_name.clone())
        .unwrap_or_else(|| reference.file_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::AttachmentKind;

    fn reference(file_id: &str, file_name: Option<&str>) -> AttachmentRef {
        AttachmentRef {
            file_id: file_id.to_string(),
            kind: AttachmentKind::Document,
            file_name: file_name.map(str::to_string),
        }
    }

    #[test]
    fn local_name_prefers_remote_basename() {
        let r = reference("abc", Some("declared.bin"));
        assert_eq!(local_file_name("documents/file_7.png", &r), "file_7.png");
    }

    #[test]
    fn local_name_falls_back_to_declared_then_id() {
        let r = reference("abc", Some("declared.bin"));
        assert_eq!(local_file_name("", &r), "declared.bin");
        let r = reference("abc", None);
        assert_eq!(local_file_name("", &r), "abc");
    }
}
