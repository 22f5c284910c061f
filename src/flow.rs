//! Task flows: per-topic priority queues with a completion state machine.
//!
//! Each topic gets one [`TaskFlow`]. Its order is fixed at build time by a
//! stable sort on `(tier rank, created_at)` and never re-sorted; new actions
//! require a fresh build. The cursor always points at the first pending
//! action and only moves forward.
//!
//! ```text
//!   Pending ──assign(≥1 action)──▶ InProgress ──cursor == len──▶ Completed
//!      └──────assign(no actions)─────────────────────────────────▲
//! ```
//!
//! Dependencies form a DAG (petgraph); cycles are rejected when added. A
//! pending action with a pending dependency is never offered as next. That
//! check happens when answering, not when moving the cursor.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use miette::Diagnostic;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{ActionItem, ActionStatus, Priority};

// ═══════════════════════════════════════════════════════════════════════
// Error
// ═══════════════════════════════════════════════════════════════════════

/// Contract violations in flow operations.
#[derive(Debug, Error, Diagnostic)]
pub enum FlowError {
    #[error("no action with id \"{action_id}\" in this run")]
    #[diagnostic(
        code(flowgraph::flow::unknown_action),
        help("Action ids have the form `<content id>#<ordinal>`. List them from the run's actions.")
    )]
    UnknownAction { action_id: String },

    #[error("no flow for topic \"{topic}\"")]
    #[diagnostic(
        code(flowgraph::flow::unknown_topic),
        help("Every topic in the table, plus `general`, has a flow. Check the topic name.")
    )]
    UnknownTopic { topic: String },

    #[error("dependency {action_id} -> {blocker_id} would create a cycle")]
    #[diagnostic(
        code(flowgraph::flow::cycle_detected),
        help("Action dependencies must form a DAG; an action cannot (transitively) depend on itself.")
    )]
    CycleDetected {
        action_id: String,
        blocker_id: String,
    },
}

/// Convenience alias.
pub type FlowResult<T> = std::result::Result<T, FlowError>;

// ═══════════════════════════════════════════════════════════════════════
// Flow
// ═══════════════════════════════════════════════════════════════════════

/// Lifecycle state of one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowStatus {
    /// No actions assigned yet.
    Pending,
    /// Cursor is before the end.
    InProgress,
    /// Cursor reached the end: every action is complete.
    Completed,
}

impl FlowStatus {
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Ordered work queue for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFlow {
    topic: String,
    ordered_action_ids: Vec<String>,
    cursor: usize,
    status: FlowStatus,
}

impl TaskFlow {
    /// A flow with nothing assigned.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            ordered_action_ids: Vec::new(),
            cursor: 0,
            status: FlowStatus::Pending,
        }
    }

    /// Assign the already-sorted queue. Only valid once, from `Pending`.
    fn assign(&mut self, ordered_action_ids: Vec<String>) {
        debug_assert_eq!(self.status, FlowStatus::Pending, "flow assigned twice");
        self.status = if ordered_action_ids.is_empty() {
            FlowStatus::Completed
        } else {
            FlowStatus::InProgress
        };
        self.ordered_action_ids = ordered_action_ids;
        self.cursor = 0;
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn ordered_action_ids(&self) -> &[String] {
        &self.ordered_action_ids
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn status(&self) -> FlowStatus {
        self.status
    }

    pub fn len(&self) -> usize {
        self.ordered_action_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered_action_ids.is_empty()
    }
}

/// Answer to "what next?" for one flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction<'a> {
    /// The first eligible pending action.
    Ready(&'a ActionItem),
    /// Pending actions remain, but every one waits on a pending dependency.
    Blocked,
    /// Every action in the flow is complete.
    AllComplete,
}

impl<'a> NextAction<'a> {
    pub fn action(&self) -> Option<&'a ActionItem> {
        match self {
            Self::Ready(action) => Some(action),
            _ => None,
        }
    }
}

/// Per-action line in a flow summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEntry {
    pub id: String,
    pub priority: Priority,
    pub status: ActionStatus,
}

/// Export shape for one flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowSummary {
    pub status: FlowStatus,
    pub cursor: usize,
    pub total: usize,
    pub completed: usize,
    pub actions: Vec<FlowEntry>,
}

/// Completion counts across all flows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub total_actions: usize,
    pub completed_actions: usize,
    pub flows: usize,
    pub completed_flows: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Manager
// ═══════════════════════════════════════════════════════════════════════

/// Owns a run's actions and flows; the only place action status changes.
#[derive(Debug, Clone)]
pub struct FlowManager {
    actions: Vec<ActionItem>,
    action_index: HashMap<String, usize>,
    flows: Vec<TaskFlow>,
    flow_index: HashMap<String, usize>,
    /// Action id → owning flow index.
    owner: HashMap<String, usize>,
    dep_dag: DiGraph<usize, ()>,
    dep_nodes: HashMap<usize, NodeIndex>,
}

impl FlowManager {
    /// Build one flow per topic name, in the given order, and queue every
    /// action under its `topic`.
    pub fn build(topic_names: &[&str], actions: Vec<ActionItem>) -> Self {
        let mut flows: Vec<TaskFlow> = topic_names.iter().map(|&name| TaskFlow::new(name)).collect();
        let mut flow_index: HashMap<String, usize> = topic_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.to_string(), i))
            .collect();

        let mut queues: Vec<Vec<usize>> = vec![Vec::new(); flows.len()];
        for (i, action) in actions.iter().enumerate() {
            let fidx = match flow_index.get(&action.topic) {
                Some(&fidx) => fidx,
                None => {
                    debug_assert!(false, "action {} has unknown topic {:?}", action.id, action.topic);
                    flows.push(TaskFlow::new(action.topic.clone()));
                    queues.push(Vec::new());
                    flow_index.insert(action.topic.clone(), flows.len() - 1);
                    flows.len() - 1
                }
            };
            queues[fidx].push(i);
        }

        let mut owner = HashMap::with_capacity(actions.len());
        for (fidx, queue) in queues.iter_mut().enumerate() {
            // Stable: equal keys keep extraction order.
            queue.sort_by_key(|&i| (actions[i].priority.rank(), actions[i].created_at));
            let ids: Vec<String> = queue.iter().map(|&i| actions[i].id.clone()).collect();
            for id in &ids {
                owner.insert(id.clone(), fidx);
            }
            flows[fidx].assign(ids);
        }

        let action_index = actions
            .iter()
            .enumerate()
            .map(|(i, a)| (a.id.clone(), i))
            .collect();

        let manager = Self {
            actions,
            action_index,
            flows,
            flow_index,
            owner,
            dep_dag: DiGraph::new(),
            dep_nodes: HashMap::new(),
        };
        tracing::info!(
            flows = manager.flows.len(),
            actions = manager.actions.len(),
            in_progress = manager
                .flows
                .iter()
                .filter(|f| f.status == FlowStatus::InProgress)
                .count(),
            "task flows built"
        );
        manager
    }

    // ── Lookup ───────────────────────────────────────────────────────

    /// All actions, in extraction order.
    pub fn actions(&self) -> &[ActionItem] {
        &self.actions
    }

    pub fn action(&self, id: &str) -> Option<&ActionItem> {
        self.action_index.get(id).map(|&i| &self.actions[i])
    }

    /// Flows in topic-table order.
    pub fn flows(&self) -> impl Iterator<Item = &TaskFlow> {
        self.flows.iter()
    }

    pub fn flow(&self, topic: &str) -> Option<&TaskFlow> {
        self.flow_index.get(topic).map(|&i| &self.flows[i])
    }

    fn flow_idx(&self, topic: &str) -> FlowResult<usize> {
        self.flow_index
            .get(topic)
            .copied()
            .ok_or_else(|| FlowError::UnknownTopic {
                topic: topic.to_string(),
            })
    }

    fn action_idx(&self, id: &str) -> FlowResult<usize> {
        self.action_index
            .get(id)
            .copied()
            .ok_or_else(|| FlowError::UnknownAction {
                action_id: id.to_string(),
            })
    }

    // ── Completion ───────────────────────────────────────────────────

    /// Complete an action now. See [`Self::complete_action_at`].
    pub fn complete_action(&mut self, id: &str) -> FlowResult<NextAction<'_>> {
        self.complete_action_at(id, Utc::now())
    }

    /// Mark `id` complete at `now` and return what comes next in its flow.
    ///
    /// Completing an already-complete action changes nothing.
    pub fn complete_action_at(
        &mut self,
        id: &str,
        now: DateTime<Utc>,
    ) -> FlowResult<NextAction<'_>> {
        let aidx = self.action_idx(id)?;
        let fidx = *self
            .owner
            .get(id)
            .ok_or_else(|| FlowError::UnknownAction {
                action_id: id.to_string(),
            })?;

        if self.actions[aidx].mark_complete(now) {
            let flow = &mut self.flows[fidx];
            while flow.cursor < flow.ordered_action_ids.len() {
                let current = &flow.ordered_action_ids[flow.cursor];
                if self.actions[self.action_index[current]].is_pending() {
                    break;
                }
                flow.cursor += 1;
            }
            if flow.cursor == flow.ordered_action_ids.len() {
                flow.status = FlowStatus::Completed;
            }
            tracing::info!(
                action = id,
                topic = %flow.topic,
                cursor = flow.cursor,
                status = %flow.status,
                "action completed"
            );
        }

        Ok(self.next_in(fidx))
    }

    // ── Next action ──────────────────────────────────────────────────

    fn next_in(&self, fidx: usize) -> NextAction<'_> {
        let flow = &self.flows[fidx];
        let mut any_pending = false;
        for id in &flow.ordered_action_ids[flow.cursor..] {
            let action = &self.actions[self.action_index[id]];
            if !action.is_pending() {
                continue;
            }
            any_pending = true;
            if !self.has_pending_dependency(action) {
                return NextAction::Ready(action);
            }
        }
        if any_pending {
            NextAction::Blocked
        } else {
            NextAction::AllComplete
        }
    }

    /// Detailed next-step signal for one topic's flow.
    pub fn next_in_flow(&self, topic: &str) -> FlowResult<NextAction<'_>> {
        Ok(self.next_in(self.flow_idx(topic)?))
    }

    /// Next eligible action for one topic, if any.
    pub fn next_action(&self, topic: &str) -> FlowResult<Option<&ActionItem>> {
        Ok(self.next_in_flow(topic)?.action())
    }

    /// Highest-priority eligible action across all flows. Compares tier
    /// rank only; ties go to the earlier flow.
    pub fn next_action_any(&self) -> Option<&ActionItem> {
        let mut best: Option<&ActionItem> = None;
        for fidx in 0..self.flows.len() {
            if let NextAction::Ready(candidate) = self.next_in(fidx) {
                if best.is_none_or(|b| candidate.priority.rank() < b.priority.rank()) {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    // ── Dependencies ─────────────────────────────────────────────────

    /// Record that `action_id` cannot start before `blocker_id` completes.
    pub fn add_dependency(&mut self, action_id: &str, blocker_id: &str) -> FlowResult<()> {
        let aidx = self.action_idx(action_id)?;
        let bidx = self.action_idx(blocker_id)?;
        let cycle = || FlowError::CycleDetected {
            action_id: action_id.to_string(),
            blocker_id: blocker_id.to_string(),
        };
        if aidx == bidx {
            return Err(cycle());
        }

        let blocker_node = *self
            .dep_nodes
            .entry(bidx)
            .or_insert_with(|| self.dep_dag.add_node(bidx));
        let action_node = *self
            .dep_nodes
            .entry(aidx)
            .or_insert_with(|| self.dep_dag.add_node(aidx));

        if self.dep_dag.find_edge(blocker_node, action_node).is_some() {
            return Ok(());
        }
        let edge = self.dep_dag.add_edge(blocker_node, action_node, ());
        if petgraph::algo::is_cyclic_directed(&self.dep_dag) {
            self.dep_dag.remove_edge(edge);
            return Err(cycle());
        }

        self.actions[aidx].add_dependency(blocker_id);
        tracing::debug!(action = action_id, blocker = blocker_id, "dependency added");
        Ok(())
    }

    fn has_pending_dependency(&self, action: &ActionItem) -> bool {
        action
            .depends_on()
            .iter()
            .any(|dep| self.action(dep).is_some_and(ActionItem::is_pending))
    }

    /// Whether `id` waits on at least one pending dependency.
    pub fn is_blocked(&self, id: &str) -> FlowResult<bool> {
        let aidx = self.action_idx(id)?;
        Ok(self.has_pending_dependency(&self.actions[aidx]))
    }

    /// Actions in dependency order (blockers first). Actions without
    /// dependencies keep extraction order.
    pub fn dependency_order(&self) -> Vec<&ActionItem> {
        let mut ordered: Vec<&ActionItem> = Vec::with_capacity(self.actions.len());
        // Cycles are rejected on insert, so toposort cannot fail here.
        if let Ok(nodes) = petgraph::algo::toposort(&self.dep_dag, None) {
            ordered.extend(nodes.into_iter().map(|n| &self.actions[self.dep_dag[n]]));
        }
        ordered.extend(
            self.actions
                .iter()
                .enumerate()
                .filter(|(i, _)| !self.dep_nodes.contains_key(i))
                .map(|(_, a)| a),
        );
        ordered
    }

    // ── Reporting ────────────────────────────────────────────────────

    pub fn summaries(&self) -> BTreeMap<String, FlowSummary> {
        self.flows
            .iter()
            .map(|flow| {
                let actions: Vec<FlowEntry> = flow
                    .ordered_action_ids
                    .iter()
                    .map(|id| {
                        let action = &self.actions[self.action_index[id]];
                        FlowEntry {
                            id: id.clone(),
                            priority: action.priority,
                            status: action.status(),
                        }
                    })
                    .collect();
                let completed = actions
                    .iter()
                    .filter(|e| e.status == ActionStatus::Complete)
                    .count();
                (
                    flow.topic.clone(),
                    FlowSummary {
                        status: flow.status,
                        cursor: flow.cursor,
                        total: actions.len(),
                        completed,
                        actions,
                    },
                )
            })
            .collect()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            total_actions: self.actions.len(),
            completed_actions: self.actions.iter().filter(|a| !a.is_pending()).count(),
            flows: self.flows.len(),
            completed_flows: self
                .flows
                .iter()
                .filter(|f| f.status == FlowStatus::Completed)
                .count(),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────
