// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # flowgraph
//!
//! Turns heterogeneous personal content exports (social posts, chat
//! messages, notes) into prioritized action items, topic clusters,
//! per-topic task flows and a node/edge graph.
//!
//! ## Architecture
//!
//! - **Normalizer** (`normalize`): raw JSON records → canonical [`content::ContentItem`]s
//! - **Extractor** (`extract`): keyword tiers → [`action::ActionItem`]s, plus purchase links
//! - **Topics** (`topic`): ordered keyword table → topic clusters and co-occurrence links
//! - **Threads** (`thread`): conversation and reply-chain grouping
//! - **Flows** (`flow`): per-topic priority queues, completion, dependency DAG
//! - **Graph** (`graph`): structured node ids, typed edges, dangling-edge checks
//! - **Pipeline** (`pipeline`): one fresh [`pipeline::RunContext`] per run
//!
//! ## Library usage
//!
//! ```no_run
//! use flowgraph::normalize::SourceRecord;
//! use flowgraph::pipeline::Pipeline;
//! use serde_json::json;
//!
//! let pipeline = Pipeline::default();
//! let mut run = pipeline.run(&[SourceRecord::new(json!({
//!     "id": "n1",
//!     "type": "note",
//!     "text": "ASAP: Fix the login bug!",
//! }))]);
//! let next = run.next_action("development").unwrap().map(|a| a.id.clone());
//! if let Some(id) = next {
//!     run.complete_action(&id).unwrap();
//! }
//! ```

pub mod action;
pub mod config;
pub mod content;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod flow;
pub mod graph;
pub mod normalize;
pub mod pipeline;
pub mod thread;
pub mod topic;
