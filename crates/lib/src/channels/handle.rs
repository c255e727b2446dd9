//! Channel collaborator contracts: notice sending and remote-file resolution.

use async_trait::async_trait;

/// Handle to a running channel connector (stop, send notice).
#[async_trait]
pub trait ChannelHandle: Send + Sync {
    /// Channel id (e.g. "telegram").
    fn id(&self) -> &str;
    /// Stop the channel connector.
    fn stop(&self);
    /// Send a text notice to a conversation (e.g. Telegram chat_id).
    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String>;
}

/// A resolved remote file: where to fetch it and its path on the platform's file host.
/// The remote path's basename names the local copy.
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub url: String,
    pub remote_path: String,
}

/// Remote-file resolution offered by a channel: opaque file id to fetchable URL.
#[async_trait]
pub trait FileHost: Send + Sync {
    async fn resolve_file(&self, file_id: &str) -> Result<RemoteFile, String>;
}
