//! Canonical content records produced by the normalizer.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source category of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceCategory {
    SocialPost,
    ChatMessage,
    Note,
    /// Detection failed. Records in this category never reach later stages.
    Unknown,
}

impl SourceCategory {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::SocialPost => "social-post",
            Self::ChatMessage => "chat-message",
            Self::Note => "note",
            Self::Unknown => "unknown",
        }
    }

    /// Parse from label (case-insensitive, accepts `_` for `-`).
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "social-post" | "social" | "post" => Some(Self::SocialPost),
            "chat-message" | "chat" | "message" => Some(Self::ChatMessage),
            "note" => Some(Self::Note),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

impl std::str::FromStr for SourceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s).ok_or_else(|| {
            format!("unknown source category \"{s}\" (expected social-post, chat-message, or note)")
        })
    }
}

/// One normalized piece of content: a post, a chat message, or a note.
///
/// Immutable once built; later stages only read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique within the batch.
    pub id: String,
    pub text: String,
    /// `None` when the record carried no timestamp or an unparseable one.
    pub created_at: Option<DateTime<Utc>>,
    pub author_id: String,
    pub conversation_id: Option<String>,
    /// Id of the content item this one replies to.
    pub reply_to: Option<String>,
    pub source_type: SourceCategory,
}

impl ContentItem {
    /// Minimal constructor, mostly for tests and upstream callers that
    /// already hold canonical data.
    pub fn new(id: impl Into<String>, text: impl Into<String>, source_type: SourceCategory) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            created_at: None,
            author_id: String::new(),
            conversation_id: None,
            reply_to: None,
            source_type,
        }
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn with_author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = author_id.into();
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_reply_to(mut self, parent_id: impl Into<String>) -> Self {
        self.reply_to = Some(parent_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_roundtrip() {
        for cat in [
            SourceCategory::SocialPost,
            SourceCategory::ChatMessage,
            SourceCategory::Note,
            SourceCategory::Unknown,
        ] {
            assert_eq!(SourceCategory::from_label(cat.as_label()), Some(cat));
        }
        assert_eq!(SourceCategory::from_label("Chat_Message"), Some(SourceCategory::ChatMessage));
        assert_eq!(SourceCategory::from_label("fax"), None);
    }

    #[test]
    fn category_serializes_kebab_case() {
        let json = serde_json::to_string(&SourceCategory::SocialPost).unwrap();
        assert_eq!(json, "\"social-post\"");
    }

    #[test]
    fn builder_sets_optional_fields() {
        let item = ContentItem::new("m1", "hello there", SourceCategory::ChatMessage)
            .with_author("alice")
            .with_conversation("c1")
            .with_reply_to("m0");
        assert_eq!(item.author_id, "alice");
        assert_eq!(item.conversation_id.as_deref(), Some("c1"));
        assert_eq!(item.reply_to.as_deref(), Some("m0"));
        assert!(item.created_at.is_none());
    }
}
