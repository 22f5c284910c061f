//! Action items and their priority tiers.
//!
//! [`PRIORITY_KEYWORDS`] is the single source of truth for tier vocabularies
//! and [`Priority::rank`] the single numeric mapping. Nothing else in the
//! crate assigns or compares priorities by any other table.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::SourceCategory;

/// Priority tier of an action. Declaration order is rank order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Tiers in scan order.
    pub const ALL: [Priority; 4] = [Self::Urgent, Self::High, Self::Medium, Self::Low];

    /// Numeric rank, lower is more pressing: urgent=0, high=1, medium=2, low=3.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Urgent => 0,
            Self::High => 1,
            Self::Medium => 2,
            Self::Low => 3,
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    /// Parse from label (case-insensitive).
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "urgent" => Some(Self::Urgent),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }

    /// Keyword vocabulary for this tier from [`PRIORITY_KEYWORDS`].
    pub fn keywords(&self) -> &'static [&'static str] {
        PRIORITY_KEYWORDS
            .iter()
            .find(|(tier, _)| tier == self)
            .map(|(_, kws)| *kws)
            .unwrap_or(&[])
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Canonical tier vocabularies, in scan order. Keywords are lowercase and
/// matched as substrings of the lowercased text.
pub const PRIORITY_KEYWORDS: &[(Priority, &[&str])] = &[
    (
        Priority::Urgent,
        &["urgent", "asap", "immediately", "critical", "emergency", "right now"],
    ),
    (
        Priority::High,
        &["todo", "to-do", "important", "must", "need to", "deadline", "action item"],
    ),
    (
        Priority::Medium,
        &["should", "follow up", "remember to", "don't forget", "plan to", "next step"],
    ),
    (
        Priority::Low,
        &["maybe", "someday", "would be nice", "consider", "eventually", "when possible"],
    ),
];

/// Completion status. Moves only pending → complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Complete,
}

impl ActionStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Enrichment attached to an action, e.g. a generated purchase search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    /// Enrichment kind; currently always `"purchase"`.
    pub kind: String,
    /// The product noun that triggered the link.
    pub query: String,
    pub url: String,
}

/// An actionable statement extracted from one content item.
///
/// `status`, `completed_at` and `depends_on` are only changed through the
/// task flow manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    /// `<content id>#<ordinal>`.
    pub id: String,
    pub text: String,
    pub source_id: String,
    pub source_type: SourceCategory,
    /// Assigned by the topic classifier.
    pub topic: String,
    pub priority: Priority,
    status: ActionStatus,
    depends_on: BTreeSet<String>,
    pub created_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_metadata: Option<LinkMetadata>,
}

impl ActionItem {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        source_id: impl Into<String>,
        source_type: SourceCategory,
        priority: Priority,
        created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_id: source_id.into(),
            source_type,
            topic: String::new(),
            priority,
            status: ActionStatus::Pending,
            depends_on: BTreeSet::new(),
            created_at,
            completed_at: None,
            link_metadata: None,
        }
    }

    pub fn status(&self) -> ActionStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == ActionStatus::Pending
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn depends_on(&self) -> &BTreeSet<String> {
        &self.depends_on
    }

    /// Mark complete at `now`, clamped so it never precedes `created_at`.
    /// Returns `false` if the action was already complete.
    pub(crate) fn mark_complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == ActionStatus::Complete {
            return false;
        }
        let at = match self.created_at {
            Some(created) if created > now => created,
            _ => now,
        };
        self.status = ActionStatus::Complete;
        self.completed_at = Some(at);
        true
    }

    pub(crate) fn add_dependency(&mut self, blocker_id: impl Into<String>) {
        self.depends_on.insert(blocker_id.into());
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn ranks_follow_scan_order() {
        let ranks: Vec<u8> = Priority::ALL.iter().map(Priority::rank).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
        assert!(Priority::Urgent < Priority::Low);
    }

    #[test]
    fn every_tier_has_vocabulary() {
        for tier in Priority::ALL {
            assert!(!tier.keywords().is_empty(), "{tier} has no keywords");
        }
        assert_eq!(PRIORITY_KEYWORDS.len(), Priority::ALL.len());
    }

    #[test]
    fn label_roundtrip() {
        for tier in Priority::ALL {
            assert_eq!(Priority::from_label(tier.as_label()), Some(tier));
        }
        assert_eq!(Priority::from_label("URGENT"), Some(Priority::Urgent));
        assert_eq!(Priority::from_label("p1"), None);
    }

    #[test]
    fn completion_is_one_way_and_clamped() {
        let created = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let mut action = ActionItem::new(
            "n1#0",
            "Pay the invoice today",
            "n1",
            SourceCategory::Note,
            Priority::High,
            Some(created),
        );
        assert!(action.is_pending());
        assert!(action.mark_complete(now));
        assert_eq!(action.status(), ActionStatus::Complete);
        // Future-dated content: completion is clamped to created_at.
        assert_eq!(action.completed_at(), Some(created));
        assert!(!action.mark_complete(now));
    }

    #[test]
    fn serializes_lowercase_enums() {
        let action = ActionItem::new("a#0", "text here", "a", SourceCategory::Note, Priority::Medium, None);
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["priority"], "medium");
        assert_eq!(json["status"], "pending");
        assert!(json.get("link_metadata").is_none());
    }
}
