//! End-to-end pipeline: normalize → extract → classify → thread → flows →
//! graph.
//!
//! A [`Pipeline`] holds only validated configuration. Every
//! [`Pipeline::run`] builds a fresh [`RunContext`] that owns all per-run
//! state; nothing carries over between runs.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::action::ActionItem;
use crate::config::PipelineConfig;
use crate::content::ContentItem;
use crate::diagnostics::Diagnostics;
use crate::error::ConfigResult;
use crate::extract::ActionExtractor;
use crate::flow::{FlowError, FlowManager, FlowResult, FlowSummary, NextAction, Progress};
use crate::graph::{Graph, Node, NodeId, materialize};
use crate::normalize::{SourceRecord, normalize_batch};
use crate::thread::{ConversationThread, build_threads};
use crate::topic::{TopicIndex, TopicSummary, TopicTable};

/// Configured, reusable pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    table: TopicTable,
    extractor: ActionExtractor,
}

impl Default for Pipeline {
    fn default() -> Self {
        let config = PipelineConfig::default();
        Self {
            extractor: ActionExtractor::new(&config),
            table: TopicTable::builtin(),
            config,
        }
    }
}

impl Pipeline {
    /// Validate `config` and freeze its topic table.
    pub fn new(config: PipelineConfig) -> ConfigResult<Self> {
        config.validate()?;
        let table = config.topic_table()?;
        tracing::info!(
            topics = table.len(),
            min_action_len = config.min_action_len,
            max_action_len = config.max_action_len,
            purchase_links = config.purchase_links,
            "pipeline configured"
        );
        Ok(Self {
            extractor: ActionExtractor::new(&config),
            table,
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn topic_table(&self) -> &TopicTable {
        &self.table
    }

    /// Process one batch. Per-record problems end up in the context's
    /// diagnostics; the run itself cannot fail.
    pub fn run(&self, records: &[SourceRecord]) -> RunContext {
        let (contents, mut diagnostics) = normalize_batch(records).into_parts();

        let mut actions: Vec<ActionItem> = Vec::new();
        for item in &contents {
            actions.extend(self.extractor.extract(item, &mut diagnostics));
        }
        tracing::info!(
            contents = contents.len(),
            actions = actions.len(),
            "action extraction complete"
        );

        let topics = TopicIndex::build(&self.table, &contents, &mut actions);
        let threads = build_threads(&contents);
        let flows = FlowManager::build(&self.table.topic_names(), actions);

        let (graph, graph_diagnostics) =
            materialize(&contents, flows.actions(), &topics, &threads).into_parts();
        diagnostics.extend(graph_diagnostics);
        let node_index = graph.index_nodes();

        let stats = RunStats {
            records: records.len(),
            accepted: contents.len(),
            rejected: records.len() - contents.len(),
            actions: flows.actions().len(),
            topics: topics
                .iter()
                .filter(|t| !t.content_ids.is_empty() || !t.action_ids.is_empty())
                .count(),
            threads: threads.len(),
            diagnostics: diagnostics.len(),
        };
        tracing::info!(
            records = stats.records,
            accepted = stats.accepted,
            actions = stats.actions,
            diagnostics = stats.diagnostics,
            "run complete"
        );

        RunContext {
            contents,
            topics,
            threads,
            flows,
            graph,
            node_index,
            diagnostics,
            stats,
        }
    }
}

// ── Run state ───────────────────────────────────────────────────────────

/// Counts for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub records: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub actions: usize,
    /// Topics holding at least one content or action.
    pub topics: usize,
    pub threads: usize,
    pub diagnostics: usize,
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "flowgraph run")?;
        writeln!(f, "  records:      {}", self.records)?;
        writeln!(f, "  accepted:     {}", self.accepted)?;
        writeln!(f, "  rejected:     {}", self.rejected)?;
        writeln!(f, "  actions:      {}", self.actions)?;
        writeln!(f, "  topics:       {}", self.topics)?;
        writeln!(f, "  threads:      {}", self.threads)?;
        writeln!(f, "  diagnostics:  {}", self.diagnostics)?;
        Ok(())
    }
}

/// Everything one run produced. Owned by the caller.
#[derive(Debug, Clone)]
pub struct RunContext {
    contents: Vec<ContentItem>,
    topics: TopicIndex,
    threads: Vec<ConversationThread>,
    flows: FlowManager,
    graph: Graph,
    node_index: HashMap<NodeId, usize>,
    diagnostics: Diagnostics,
    stats: RunStats,
}

impl RunContext {
    pub fn contents(&self) -> &[ContentItem] {
        &self.contents
    }

    /// Actions in extraction order.
    pub fn actions(&self) -> &[ActionItem] {
        self.flows.actions()
    }

    pub fn topics(&self) -> &TopicIndex {
        &self.topics
    }

    pub fn threads(&self) -> &[ConversationThread] {
        &self.threads
    }

    pub fn flows(&self) -> &FlowManager {
        &self.flows
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Indexed lookup into [`RunContext::graph`].
    pub fn graph_node(&self, id: &NodeId) -> Option<&Node> {
        self.node_index.get(id).and_then(|&i| self.graph.nodes.get(i))
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    pub fn progress(&self) -> Progress {
        self.flows.progress()
    }

    // ── Flow operations ──────────────────────────────────────────────

    pub fn next_action(&self, topic: &str) -> FlowResult<Option<&ActionItem>> {
        self.flows.next_action(topic)
    }

    pub fn next_action_any(&self) -> Option<&ActionItem> {
        self.flows.next_action_any()
    }

    pub fn add_dependency(&mut self, action_id: &str, blocker_id: &str) -> FlowResult<()> {
        self.flows.add_dependency(action_id, blocker_id)
    }

    /// Complete an action now. See [`Self::complete_action_at`].
    pub fn complete_action(&mut self, id: &str) -> FlowResult<NextAction<'_>> {
        self.complete_action_at(id, Utc::now())
    }

    /// Complete an action and keep the graph's action node in step.
    pub fn complete_action_at(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> FlowResult<NextAction<'_>> {
        let topic = self
            .flows
            .action(id)
            .map(|a| a.topic.clone())
            .ok_or_else(|| FlowError::UnknownAction {
                action_id: id.to_string(),
            })?;
        self.flows.complete_action_at(id, now)?;

        let node_id = NodeId::action(id);
        if let Some(node) = self
            .node_index
            .get(&node_id)
            .and_then(|&i| self.graph.nodes.get_mut(i))
        {
            if let Some(action) = self.flows.action(id) {
                node.attributes.insert(
                    "status".into(),
                    Value::from(action.status().as_label()),
                );
            }
        }

        self.flows.next_in_flow(&topic)
    }

    // ── Export ───────────────────────────────────────────────────────

    pub fn topic_summaries(&self) -> BTreeMap<String, TopicSummary> {
        self.topics.summaries()
    }

    pub fn flow_summaries(&self) -> BTreeMap<String, FlowSummary> {
        self.flows.summaries()
    }

    /// Serializable view of the whole run.
    pub fn report(&self) -> RunReport<'_> {
        RunReport {
            stats: self.stats,
            graph: &self.graph,
            actions: self.flows.actions(),
            topics: self.topic_summaries(),
            flows: self.flow_summaries(),
            threads: &self.threads,
            diagnostics: &self.diagnostics,
        }
    }
}

/// JSON export of a [`RunContext`].
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub stats: RunStats,
    pub graph: &'a Graph,
    pub actions: &'a [ActionItem],
    pub topics: BTreeMap<String, TopicSummary>,
    pub flows: BTreeMap<String, FlowSummary>,
    pub threads: &'a [ConversationThread],
    pub diagnostics: &'a Diagnostics,
}

// ── Tests ───────────────────────────────────────────────────────────────
