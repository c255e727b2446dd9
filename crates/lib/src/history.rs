//! Media-group buffer: recently seen grouped messages, for sibling lookup.
//!
//! The platform does not guarantee that all members of a media group arrive
//! before the triggering message is processed, so lookups are best-effort:
//! callers get whatever siblings have been recorded at call time.

use crate::channels::InboundMessage;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// Default number of distinct media groups kept in the buffer.
pub const DEFAULT_MAX_GROUPS: usize = 64;

struct GroupBuffer {
    groups: HashMap<String, Vec<InboundMessage>>,
    /// Group ids in insertion order, oldest first; drives eviction.
    order: VecDeque<String>,
}

/// In-memory store of recent media-group messages, keyed by group id.
/// Shared across concurrent pipeline runs; bounded by evicting oldest groups.
pub struct GroupHistory {
    inner: RwLock<GroupBuffer>,
    max_groups: usize,
}

impl Default for GroupHistory {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_GROUPS)
    }
}

impl GroupHistory {
    pub fn new(max_groups: usize) -> Self {
        Self {
            inner: RwLock::new(GroupBuffer {
                groups: HashMap::new(),
                order: VecDeque::new(),
            }),
            max_groups: max_groups.max(1),
        }
    }

    /// Record a message under its media group. Messages without a group id are ignored.
    pub async fn record(&self, message: &InboundMessage) {
        let Some(ref group_id) = message.media_group_id else {
            return;
        };
        let mut g = self.inner.write().await;
        if !g.groups.contains_key(group_id) {
            g.order.push_back(group_id.clone());
            while g.order.len() > self.max_groups {
                if let Some(evicted) = g.order.pop_front() {
                    g.groups.remove(&evicted);
                }
            }
        }
        g.groups
            .entry(group_id.clone())
            .or_default()
            .push(message.clone());
    }

    /// Messages recorded for a group, excluding the given message id.
    /// Best-effort: may be a partial set (or empty) if siblings have not arrived yet.
    pub async fn siblings(&self, group_id: &str, exclude_message_id: i64) -> Vec<InboundMessage> {
        let g = self.inner.read().await;
        g.groups
            .get(group_id)
            .map(|msgs| {
                msgs.iter()
                    .filter(|m| m.message_id != exclude_message_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}
