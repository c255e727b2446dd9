//! Telegram channel: long-poll getUpdates, sendMessage notices, and getFile
//! resolution via Bot API.

use crate::channels::handle::{ChannelHandle, FileHost, RemoteFile};
use crate::channels::inbound::{AttachmentKind, AttachmentRef, InboundMessage};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const LONG_POLL_TIMEOUT: u64 = 30;
/// Request timeout for Bot API calls. Must exceed the long-poll timeout so
/// getUpdates is not cut off client-side.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_TIMEOUT + 15);

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    ok: bool,
    #[serde(default)]
    result: Vec<TelegramUpdate>,
}

/// Telegram update payload (getUpdates result item or webhook POST body).
#[derive(Debug, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub media_group_id: Option<String>,
    /// Photo resolution variants, smallest to largest.
    #[serde(default)]
    pub photo: Option<Vec<TelegramPhotoSize>>,
    #[serde(default)]
    pub document: Option<TelegramDocument>,
    #[serde(default)]
    pub video: Option<TelegramVideo>,
    #[serde(default)]
    pub reply_to_message: Option<TelegramReply>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramPhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: i64,
    #[serde(default)]
    pub height: i64,
}

#[derive(Debug, Deserialize)]
pub struct TelegramDocument {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TelegramVideo {
    pub file_id: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

/// Reply context, reduced to what topic routing needs: a reply into a forum
/// topic carries the topic-creation service message.
#[derive(Debug, Deserialize)]
pub struct TelegramReply {
    #[serde(default)]
    pub forum_topic_created: Option<ForumTopicCreated>,
}

#[derive(Debug, Deserialize)]
pub struct ForumTopicCreated {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct GetFileResponse {
    ok: bool,
    #[serde(default)]
    result: Option<TelegramFile>,
}

#[derive(Debug, Deserialize)]
struct TelegramFile {
    #[serde(default)]
    file_path: Option<String>,
}

/// Telegram channel connector: long-polls for updates, sends notices via
/// sendMessage, and resolves file ids to download URLs via getFile.
pub struct TelegramChannel {
    id: String,
    token: Option<String>,
    running: AtomicBool,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: Option<String>) -> Self {
        Self {
            id: "telegram".to_string(),
            token,
            running: AtomicBool::new(false),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start the getUpdates long-poll loop and forward messages to the pipeline. Returns a handle to await on shutdown.
    pub fn start_inbound(
        self: Arc<Self>,
        inbound_tx: mpsc::Sender<InboundMessage>,
    ) -> JoinHandle<()> {
        self.running.store(true, Ordering::SeqCst);
        log::info!("telegram channel: starting getUpdates long-poll loop");
        tokio::spawn(async move {
            run_get_updates_loop(self, inbound_tx).await;
        })
    }

    /// Call Telegram getUpdates (long poll). Returns (updates, next_offset).
    async fn get_updates(
        &self,
        offset: Option<i64>,
    ) -> Result<(Vec<TelegramUpdate>, Option<i64>), String> {
        let token = self.token.as_ref().ok_or("telegram bot token not configured")?;
        let url = format!(
            "{}/bot{}/getUpdates?timeout={}",
            TELEGRAM_API_BASE, token, LONG_POLL_TIMEOUT
        );
        let url = if let Some(off) = offset {
            format!("{}&offset={}", url, off)
        } else {
            url
        };
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("getUpdates failed: {} {}", status, body));
        }
        let data: GetUpdatesResponse = res.json().await.map_err(|e| e.to_string())?;
        if !data.ok {
            return Err("getUpdates returned ok: false".to_string());
        }
        let next_offset = data
            .result
            .iter()
            .map(|u| u.update_id)
            .max()
            .map(|id| id + 1);
        Ok((data.result, next_offset))
    }

    /// Set webhook URL (and optional secret). When set, Telegram POSTs updates to the URL instead of getUpdates.
    pub async fn set_webhook(&self, url: &str, secret: Option<&str>) -> Result<(), String> {
        let token = self
            .token
            .as_ref()
            .ok_or("telegram bot token not configured")?;
        let api_url = format!("{}/bot{}/setWebhook", TELEGRAM_API_BASE, token);
        let mut body = serde_json::json!({ "url": url });
        if let Some(s) = secret {
            body["secret_token"] = serde_json::Value::String(s.to_string());
        }
        let res = self
            .client
            .post(&api_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("setWebhook failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Remove webhook so the bot can use getUpdates again.
    pub async fn delete_webhook(&self) -> Result<(), String> {
        let token = self
            .token
            .as_ref()
            .ok_or("telegram bot token not configured")?;
        let url = format!("{}/bot{}/deleteWebhook", TELEGRAM_API_BASE, token);
        let res = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("deleteWebhook failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Send a text message to a chat via sendMessage API.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), String> {
        let token = self
            .token
            .as_ref()
            .ok_or("telegram bot token not configured")?;
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, token);
        let body = serde_json::json!({ "chat_id": chat_id, "text": text });
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("sendMessage failed: {} {}", status, body));
        }
        Ok(())
    }

    /// Resolve a file id to its download URL via getFile.
    pub async fn get_file(&self, file_id: &str) -> Result<RemoteFile, String> {
        let token = self
            .token
            .as_ref()
            .ok_or("telegram bot token not configured")?;
        let url = format!(
            "{}/bot{}/getFile?file_id={}",
            TELEGRAM_API_BASE, token, file_id
        );
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("getFile failed: {} {}", status, body));
        }
        let data: GetFileResponse = res.json().await.map_err(|e| e.to_string())?;
        if !data.ok {
            return Err("getFile returned ok: false".to_string());
        }
        let file_path = data
            .result
            .and_then(|f| f.file_path)
            .ok_or_else(|| format!("getFile returned no file_path for {}", file_id))?;
        Ok(RemoteFile {
            url: format!("{}/file/bot{}/{}", TELEGRAM_API_BASE, token, file_path),
            remote_path: file_path,
        })
    }
}

/// Convert a Telegram message to the platform-neutral inbound form.
/// Returns None for messages the pipeline has no use for (no text, caption, or media).
pub fn to_inbound(msg: &TelegramMessage) -> Option<InboundMessage> {
    let photo_variants: Vec<AttachmentRef> = msg
        .photo
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|p| AttachmentRef {
            file_id: p.file_id.clone(),
            kind: AttachmentKind::Photo,
            file_name: None,
        })
        .collect();
    let document = msg.document.as_ref().map(|d| AttachmentRef {
        file_id: d.file_id.clone(),
        kind: AttachmentKind::Document,
        file_name: d.file_name.clone(),
    });
    let video = msg.video.as_ref().map(|v| AttachmentRef {
        file_id: v.file_id.clone(),
        kind: AttachmentKind::Video,
        file_name: v.file_name.clone(),
    });

    let has_media = !photo_variants.is_empty() || document.is_some() || video.is_some();
    if msg.text.is_none() && msg.caption.is_none() && !has_media {
        return None;
    }

    Some(InboundMessage {
        channel_id: "telegram".to_string(),
        conversation_id: msg.chat.id.to_string(),
        message_id: msg.message_id,
        text: msg.text.clone(),
        caption: msg.caption.clone(),
        media_group_id: msg.media_group_id.clone(),
        photo_variants,
        document,
        video,
        topic: msg
            .reply_to_message
            .as_ref()
            .and_then(|r| r.forum_topic_created.as_ref())
            .map(|t| t.name.clone()),
    })
}

async fn run_get_updates_loop(
    channel: Arc<TelegramChannel>,
    inbound_tx: mpsc::Sender<InboundMessage>,
) {
    let mut offset: Option<i64> = None;
    while channel.running() {
        match channel.get_updates(offset).await {
            Ok((updates, next)) => {
                offset = next;
                for u in updates {
                    let Some(ref msg) = u.message else {
                        continue;
                    };
                    let Some(inbound) = to_inbound(msg) else {
                        continue;
                    };
                    if inbound_tx.send(inbound).await.is_err() {
                        log::debug!("telegram: inbound channel closed, stopping loop");
                        return;
                    }
                }
            }
            Err(e) => {
                log::debug!("telegram getUpdates error: {}", e);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    }
    log::info!("telegram channel: getUpdates loop stopped");
}

#[async_trait]
impl ChannelHandle for TelegramChannel {
    fn id(&self) -> &str {
        &self.id
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    async fn send_message(&self, conversation_id: &str, text: &str) -> Result<(), String> {
        TelegramChannel::send_message(self, conversation_id, text).await
    }
}

#[async_trait]
impl FileHost for TelegramChannel {
    async fn resolve_file(&self, file_id: &str) -> Result<RemoteFile, String> {
        self.get_file(file_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_from_photo_update_picks_all_fields() {
        let json = r##"{
            "update_id": 10,
            "message": {
                "message_id": 42,
                "chat": { "id": -100123 },
                "caption": "#bug broken image",
                "media_group_id": "g1",
                "photo": [
                    { "file_id": "small", "width": 90, "height": 60 },
                    { "file_id": "large", "width": 1280, "height": 853 }
                ]
            }
        }"##;
        let update: TelegramUpdate = serde_json::from_str(json).expect("parse update");
        let msg = update.message.expect("message");
        let inbound = to_inbound(&msg).expect("inbound");
        assert_eq!(inbound.conversation_id, "-100123");
        assert_eq!(inbound.message_id, 42);
        assert_eq!(inbound.caption.as_deref(), Some("#bug broken image"));
        assert_eq!(inbound.media_group_id.as_deref(), Some("g1"));
        assert_eq!(inbound.photo_variants.len(), 2);
        assert_eq!(inbound.photo_variants[1].file_id, "large");
        assert!(inbound.document.is_none());
        assert!(inbound.video.is_none());
    }

    #[test]
    fn inbound_topic_comes_from_forum_reply() {
        let json = r##"{
            "message_id": 7,
            "chat": { "id": 5 },
            "text": "#bug in the payments flow",
            "reply_to_message": { "forum_topic_created": { "name": "Payments" } }
        }"##;
        let msg: TelegramMessage = serde_json::from_str(json).expect("parse message");
        let inbound = to_inbound(&msg).expect("inbound");
        assert_eq!(inbound.topic.as_deref(), Some("Payments"));
    }

    #[test]
    fn inbound_skips_messages_without_text_or_media() {
        let json = r#"{ "message_id": 1, "chat": { "id": 5 } }"#;
        let msg: TelegramMessage = serde_json::from_str(json).expect("parse message");
        assert!(to_inbound(&msg).is_none());
    }

    #[test]
    fn inbound_document_keeps_declared_name() {
        let json = r##"{
            "message_id": 3,
            "chat": { "id": 9 },
            "caption": "#bug crash log attached",
            "document": { "file_id": "doc1", "file_name": "crash.log" }
        }"##;
        let msg: TelegramMessage = serde_json::from_str(json).expect("parse message");
        let inbound = to_inbound(&msg).expect("inbound");
        let doc = inbound.document.expect("document");
        assert_eq!(doc.kind, AttachmentKind::Document);
        assert_eq!(doc.file_name.as_deref(), Some("crash.log"));
    }
}
