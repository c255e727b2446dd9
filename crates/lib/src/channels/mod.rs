//! Communication channels (Telegram).
//!
//! Channel trait seams so the pipeline can send notices and resolve remote
//! files without knowing the platform. Inbound messages are sent to the
//! service processor for pipeline handling.

mod handle;
mod inbound;
mod telegram;

pub use handle::{ChannelHandle, FileHost, RemoteFile};
pub use inbound::{AttachmentKind, AttachmentRef, InboundMessage};
pub use telegram::{to_inbound, TelegramChannel, TelegramMessage, TelegramUpdate};
