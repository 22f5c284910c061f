//! Conversation threading over normalized content.
//!
//! Items sharing a `conversation_id` form one thread. Items without one are
//! chained through `reply_to` links; a reply chain becomes a thread once its
//! root has at least one reply in the batch. Thread members are ordered by
//! `created_at` (missing timestamps first), ties by input order.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::content::ContentItem;

/// How a thread's members were grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadOrigin {
    /// Shared `conversation_id`.
    Conversation,
    /// `reply_to` links up to a common root.
    ReplyChain,
}

/// An ordered chain of related content items.
///
/// `id` is only unique together with `origin`: a conversation id may equal
/// the root content id of an unrelated reply chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationThread {
    /// The conversation id, or the root content id for reply chains.
    pub id: String,
    pub origin: ThreadOrigin,
    pub root_content_id: String,
    pub content_ids: Vec<String>,
    pub participants: BTreeSet<String>,
}

impl ConversationThread {
    pub fn len(&self) -> usize {
        self.content_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content_ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ThreadKey {
    Conversation(String),
    ReplyChain(String),
}

/// Walk `reply_to` links up to the earliest ancestor present in the batch.
fn reply_root(idx: usize, contents: &[ContentItem], index: &HashMap<&str, usize>) -> usize {
    let mut visited = HashSet::new();
    let mut current = idx;
    while let Some(parent) = contents[current]
        .reply_to
        .as_deref()
        .and_then(|p| index.get(p).copied())
    {
        if !visited.insert(current) {
            break; // Cycle protection.
        }
        current = parent;
    }
    current
}

/// Build all threads for one batch, in order of first appearance.
pub fn build_threads(contents: &[ContentItem]) -> Vec<ConversationThread> {
    let index: HashMap<&str, usize> = contents
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    // Group member indices by key, remembering first-appearance order.
    let mut order: Vec<ThreadKey> = Vec::new();
    let mut members: HashMap<ThreadKey, Vec<usize>> = HashMap::new();
    for (i, item) in contents.iter().enumerate() {
        let key = match &item.conversation_id {
            Some(cid) => ThreadKey::Conversation(cid.clone()),
            None => ThreadKey::ReplyChain(contents[reply_root(i, contents, &index)].id.clone()),
        };
        members
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(i);
    }

    let mut threads = Vec::new();
    for key in order {
        let mut idxs = members.remove(&key).unwrap_or_default();
        if matches!(key, ThreadKey::ReplyChain(_)) && idxs.len() < 2 {
            continue;
        }
        idxs.sort_by_key(|&i| contents[i].created_at);

        let in_thread: HashSet<&str> = idxs.iter().map(|&i| contents[i].id.as_str()).collect();
        let root_idx = match &key {
            ThreadKey::ReplyChain(root) => index[root.as_str()],
            ThreadKey::Conversation(_) => idxs
                .iter()
                .copied()
                .find(|&i| {
                    contents[i]
                        .reply_to
                        .as_deref()
                        .is_none_or(|p| !in_thread.contains(p))
                })
                .unwrap_or(idxs[0]),
        };

        let (id, origin) = match key {
            ThreadKey::Conversation(cid) => (cid, ThreadOrigin::Conversation),
            ThreadKey::ReplyChain(root) => (root, ThreadOrigin::ReplyChain),
        };
        threads.push(ConversationThread {
            id,
            origin,
            root_content_id: contents[root_idx].id.clone(),
            content_ids: idxs.iter().map(|&i| contents[i].id.clone()).collect(),
            participants: idxs
                .iter()
                .map(|&i| contents[i].author_id.clone())
                .filter(|a| !a.is_empty())
                .collect(),
        });
    }

    tracing::info!(threads = threads.len(), "threading complete");
    threads
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::DateTime;

    use super::*;
    use crate::content::SourceCategory;

    fn post(id: &str, ts: i64, author: &str) -> ContentItem {
        ContentItem::new(id, format!("post {id}"), SourceCategory::SocialPost)
            .with_created_at(DateTime::from_timestamp(ts, 0).unwrap())
            .with_author(author)
    }

    fn chat(id: &str, ts: i64, author: &str, conversation: &str) -> ContentItem {
        ContentItem::new(id, format!("msg {id}"), SourceCategory::ChatMessage)
            .with_created_at(DateTime::from_timestamp(ts, 0).unwrap())
            .with_author(author)
            .with_conversation(conversation)
    }

    #[test]
    fn reply_chain_becomes_thread() {
        let contents = vec![
            post("p1", 100, "alice"),
            post("p2", 200, "bob").with_reply_to("p1"),
            post("p3", 300, "alice").with_reply_to("p2"),
        ];
        let threads = build_threads(&contents);
        assert_eq!(threads.len(), 1);
        let t = &threads[0];
        assert_eq!(t.id, "p1");
        assert_eq!(t.origin, ThreadOrigin::ReplyChain);
        assert_eq!(t.root_content_id, "p1");
        assert_eq!(t.content_ids, vec!["p1", "p2", "p3"]);
        assert_eq!(t.participants.len(), 2);
    }

    #[test]
    fn standalone_posts_are_not_threads() {
        let contents = vec![post("p1", 100, "alice"), post("p2", 200, "bob")];
        assert!(build_threads(&contents).is_empty());
    }

    #[test]
    fn reply_to_missing_parent_is_its_own_root() {
        let contents = vec![
            post("p2", 200, "bob").with_reply_to("gone"),
            post("p3", 300, "carol").with_reply_to("p2"),
        ];
        let threads = build_threads(&contents);
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].root_content_id, "p2");
    }

    #[test]
    fn conversation_members_sorted_by_time() {
        let contents = vec![
            chat("m3", 300, "bob", "c1"),
            chat("m1", 100, "alice", "c1"),
            chat("x1", 150, "zed", "c2"),
            chat("m2", 200, "alice", "c1"),
        ];
        let threads = build_threads(&contents);
        assert_eq!(threads.len(), 2);
        assert_eq!(threads[0].id, "c1");
        assert_eq!(threads[0].origin, ThreadOrigin::Conversation);
        assert_eq!(threads[0].content_ids, vec!["m1", "m2", "m3"]);
        assert_eq!(threads[0].root_content_id, "m1");
        assert_eq!(threads[1].id, "c2");
        assert_eq!(threads[1].len(), 1);
    }

    #[test]
    fn reply_cycle_terminates() {
        let contents = vec![
            post("a", 100, "x").with_reply_to("b"),
            post("b", 200, "y").with_reply_to("a"),
        ];
        let threads = build_threads(&contents);
        let total: usize = threads.iter().map(ConversationThread::len).sum();
        assert!(total <= 2);
    }

    #[test]
    fn conversation_and_chain_may_share_an_id() {
        let contents = vec![
            post("5", 100, "alice"),
            post("6", 200, "bob").with_reply_to("5"),
            chat("m1", 150, "carol", "5"),
        ];
        let threads = build_threads(&contents);
        assert_eq!(threads.len(), 2);
        let origins: Vec<(&str, ThreadOrigin)> =
            threads.iter().map(|t| (t.id.as_str(), t.origin)).collect();
        assert_eq!(
            origins,
            vec![("5", ThreadOrigin::ReplyChain), ("5", ThreadOrigin::Conversation)]
        );
    }
}
