//! Trigger classifier: decide whether a message is a bug report and derive
//! the issue title, description, and target project key.

use crate::channels::InboundMessage;
use std::collections::HashMap;

/// Marker that qualifies a message for processing (matched case-insensitively).
pub const TRIGGER_MARKER: &str = "#bug";

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("topic {topic:?} is not mapped to a project key")]
    UnmappedTopic { topic: String },
}

/// Topic-to-project routing table plus the fallback project key.
/// An unknown topic is a configuration error, never a silent fallback.
#[derive(Debug, Clone)]
pub struct ProjectRouting {
    pub default_project_key: String,
    pub topic_projects: HashMap<String, String>,
}

impl ProjectRouting {
    pub fn project_for(&self, topic: Option<&str>) -> Result<&str, ClassifyError> {
        match topic {
            Some(name) => self
                .topic_projects
                .get(name)
                .map(String::as_str)
                .ok_or_else(|| ClassifyError::UnmappedTopic {
                    topic: name.to_string(),
                }),
            None => Ok(&self.default_project_key),
        }
    }
}

/// Result of a positive classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// First line of the trigger text.
    pub title: String,
    /// Full trigger text, unmodified.
    pub description: String,
    pub project_key: String,
}

/// Classify a message: Ok(None) when it does not qualify, Ok(Some) with the
/// derived issue fields when it does. Pure function of its input.
pub fn classify(
    message: &InboundMessage,
    routing: &ProjectRouting,
) -> Result<Option<Classification>, ClassifyError> {
    let Some(text) = message.text.as_deref().or(message.caption.as_deref()) else {
        return Ok(None);
    };
    if !text.to_lowercase().contains(TRIGGER_MARKER) {
        return Ok(None);
    }
    let project_key = routing.project_for(message.topic.as_deref())?.to_string();
    let title = match text.find(|c| c == '\n' || c == '\r') {
        Some(i) => text[..i].to_string(),
        None => text.to_string(),
    };
    Ok(Some(Classification {
        title,
        description: text.to_string(),
        project_key,
    }))
}
