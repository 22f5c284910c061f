//! Graph materialization: contents, actions, topics and threads as one
//! node/edge document.
//!
//! Node identity is a `(NodeKind, key)` pair. Its only string form is
//! `<prefix>_<key>`; prefixes contain no underscore, so parsing splits at the
//! first one and ids of different kinds never collide even when keys do.
//!
//! Materialization is a pure function of its inputs. Edges whose endpoint is
//! not a node of the output are dropped and reported as diagnostics.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::action::ActionItem;
use crate::content::ContentItem;
use crate::diagnostics::{DiagnosticKind, Diagnostics, Outcome};
use crate::thread::{ConversationThread, ThreadOrigin};
use crate::topic::TopicIndex;

/// Longest node label, in characters.
pub const LABEL_MAX_CHARS: usize = 80;

// ── Identity ────────────────────────────────────────────────────────────

/// What a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Content,
    Action,
    Topic,
    /// Conversation thread, keyed by conversation id.
    Thread,
    /// Reply-chain thread, keyed by root content id.
    Chain,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        Self::Content,
        Self::Action,
        Self::Topic,
        Self::Thread,
        Self::Chain,
    ];

    /// Id prefix; never contains `_`.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Action => "action",
            Self::Topic => "topic",
            Self::Thread => "thread",
            Self::Chain => "chain",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_label() == s)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Structured node identity, serialized as `<prefix>_<key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NodeId {
    kind: NodeKind,
    key: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    pub fn content(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Content, key)
    }

    pub fn action(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Action, key)
    }

    pub fn topic(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Topic, key)
    }

    pub fn thread(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Thread, key)
    }

    pub fn chain(key: impl Into<String>) -> Self {
        Self::new(NodeKind::Chain, key)
    }

    /// Node id of a thread. Conversations and reply chains live under
    /// different kinds, so a conversation id equal to a chain's root id
    /// still yields two distinct nodes.
    pub fn for_thread(thread: &ConversationThread) -> Self {
        match thread.origin {
            ThreadOrigin::Conversation => Self::thread(&thread.id),
            ThreadOrigin::ReplyChain => Self::chain(&thread.id),
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.key)
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, key) = s
            .split_once('_')
            .ok_or_else(|| format!("node id \"{s}\" has no kind prefix"))?;
        let kind =
            NodeKind::from_label(prefix).ok_or_else(|| format!("unknown node kind \"{prefix}\""))?;
        if key.is_empty() {
            return Err(format!("node id \"{s}\" has an empty key"));
        }
        Ok(Self::new(kind, key))
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for NodeId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ── Document ────────────────────────────────────────────────────────────

/// One graph node. Kind-specific attributes are flattened beside the
/// common fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub label: String,
    #[serde(flatten)]
    pub attributes: BTreeMap<String, Value>,
}

impl Node {
    fn new(id: NodeId, label: &str) -> Self {
        Self {
            kind: id.kind(),
            id,
            label: truncate_label(label),
            attributes: BTreeMap::new(),
        }
    }

    fn attr(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.to_string(), value.into());
        self
    }

    fn attr_opt<V: Into<Value>>(self, name: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.attr(name, v),
            None => self,
        }
    }
}

/// Relationship kinds. The set is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// content → action
    Extracts,
    /// action → topic
    BelongsTo,
    /// content → topic, when none of the content's actions is in that topic
    TaggedWith,
    /// content → parent content
    ReplyTo,
    /// thread or chain → content
    Contains,
}

impl EdgeKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Extracts => "extracts",
            Self::BelongsTo => "belongs_to",
            Self::TaggedWith => "tagged_with",
            Self::ReplyTo => "reply_to",
            Self::Contains => "contains",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: NodeId, target: NodeId, kind: EdgeKind) -> Self {
        Self {
            source,
            target,
            kind,
        }
    }
}

/// A materialized graph. Every edge endpoint is one of `nodes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Linear scan. For repeated lookups build [`Graph::index_nodes`] once.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    /// Node id → position in `nodes`.
    pub fn index_nodes(&self) -> HashMap<NodeId, usize> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect()
    }

    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn edges_of(&self, kind: EdgeKind) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.kind == kind)
    }

    pub fn has_edge(&self, source: &NodeId, target: &NodeId, kind: EdgeKind) -> bool {
        self.edges
            .iter()
            .any(|e| e.kind == kind && &e.source == source && &e.target == target)
    }
}

fn truncate_label(text: &str) -> String {
    text.chars().take(LABEL_MAX_CHARS).collect()
}

// ── Materialization ─────────────────────────────────────────────────────

/// Build the graph for one run.
pub fn materialize(
    contents: &[ContentItem],
    actions: &[ActionItem],
    topics: &TopicIndex,
    threads: &[ConversationThread],
) -> Outcome<Graph> {
    let mut nodes: Vec<Node> = Vec::new();
    let mut candidates: Vec<Edge> = Vec::new();

    for item in contents {
        nodes.push(
            Node::new(NodeId::content(&item.id), &item.text)
                .attr("source_type", item.source_type.as_label())
                .attr_opt("author_id", Some(&item.author_id).filter(|a| !a.is_empty()).cloned())
                .attr_opt("created_at", item.created_at.map(|t| t.to_rfc3339()))
                .attr_opt("conversation_id", item.conversation_id.clone()),
        );
        if let Some(parent) = &item.reply_to {
            candidates.push(Edge::new(
                NodeId::content(&item.id),
                NodeId::content(parent),
                EdgeKind::ReplyTo,
            ));
        }
    }

    for action in actions {
        nodes.push(
            Node::new(NodeId::action(&action.id), &action.text)
                .attr("priority", action.priority.as_label())
                .attr("status", action.status().as_label())
                .attr("topic", action.topic.clone())
                .attr_opt("link", action.link_metadata.as_ref().map(|l| l.url.clone())),
        );
        candidates.push(Edge::new(
            NodeId::content(&action.source_id),
            NodeId::action(&action.id),
            EdgeKind::Extracts,
        ));
        candidates.push(Edge::new(
            NodeId::action(&action.id),
            NodeId::topic(&action.topic),
            EdgeKind::BelongsTo,
        ));
    }

    for topic in topics.iter() {
        if topic.content_ids.is_empty() && topic.action_ids.is_empty() {
            continue;
        }
        nodes.push(
            Node::new(NodeId::topic(&topic.name), &topic.name)
                .attr("keywords", json!(topic.keywords))
                .attr("content_count", topic.content_ids.len())
                .attr("action_count", topic.action_ids.len()),
        );
    }

    let mut action_topics: HashMap<&str, HashSet<&str>> = HashMap::new();
    for action in actions {
        action_topics
            .entry(action.source_id.as_str())
            .or_default()
            .insert(action.topic.as_str());
    }
    for item in contents {
        let Some(topic) = topics.content_topic(&item.id) else {
            continue;
        };
        let covered = action_topics
            .get(item.id.as_str())
            .is_some_and(|t| t.contains(topic));
        if !covered {
            candidates.push(Edge::new(
                NodeId::content(&item.id),
                NodeId::topic(topic),
                EdgeKind::TaggedWith,
            ));
        }
    }

    for thread in threads {
        let thread_id = NodeId::for_thread(thread);
        nodes.push(
            Node::new(thread_id.clone(), &thread.id)
                .attr("root", thread.root_content_id.clone())
                .attr("size", thread.len())
                .attr("participants", json!(thread.participants)),
        );
        for content_id in &thread.content_ids {
            candidates.push(Edge::new(
                thread_id.clone(),
                NodeId::content(content_id),
                EdgeKind::Contains,
            ));
        }
    }

    let known: HashSet<&NodeId> = nodes.iter().map(|n| &n.id).collect();
    let mut seen: HashSet<Edge> = HashSet::new();
    let mut edges = Vec::with_capacity(candidates.len());
    let mut diagnostics = Diagnostics::new();
    for edge in candidates {
        let missing = [&edge.source, &edge.target]
            .into_iter()
            .find(|end| !known.contains(end));
        if let Some(end) = missing {
            diagnostics.push(
                DiagnosticKind::DanglingEdge,
                edge.source.to_string(),
                format!("{} edge to {} dropped: {end} is not a node", edge.kind, edge.target),
            );
            continue;
        }
        if seen.insert(edge.clone()) {
            edges.push(edge);
        }
    }

    tracing::info!(
        nodes = nodes.len(),
        edges = edges.len(),
        dropped = diagnostics.len(),
        "graph materialized"
    );
    Outcome::new(Graph { nodes, edges }, diagnostics)
}

// ── Tests ───────────────────────────────────────────────────────────────
