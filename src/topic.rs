//! Topic classification and co-occurrence linking.
//!
//! A topic's score for a text is the number of keyword occurrences (as
//! substrings) in the lowercased text. The highest score wins, ties go to the
//! topic declared first, and a zero score lands in [`GENERAL_TOPIC`]. The
//! table is an explicit ordered list, never a map, so the tie-break does not
//! depend on container iteration order.
//!
//! After classification, topics whose content sets intersect are linked
//! symmetrically. Links are rebuilt from scratch on every [`TopicIndex::build`].

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::ActionItem;
use crate::content::ContentItem;

/// Reserved topic for items no keyword matched.
pub const GENERAL_TOPIC: &str = "general";

/// Built-in topic table, in tie-break order.
pub const DEFAULT_TOPICS: &[(&str, &[&str])] = &[
    (
        "development",
        &["code", "bug", "api", "deploy", "release", "refactor", "server", "database", "login"],
    ),
    (
        "documentation",
        &["documentation", "docs", "document", "readme", "wiki", "write-up"],
    ),
    (
        "shopping",
        &["buy", "purchase", "order", "groceries", "shop", "store"],
    ),
    (
        "health",
        &["doctor", "dentist", "gym", "workout", "exercise", "medicine", "sleep"],
    ),
    (
        "finance",
        &["budget", "invoice", "tax", "bank", "payment", "bill", "expense"],
    ),
    (
        "travel",
        &["flight", "hotel", "trip", "travel", "passport", "booking"],
    ),
    (
        "learning",
        &["learn", "course", "study", "tutorial", "lecture", "book"],
    ),
    (
        "social",
        &["party", "birthday", "dinner", "friend", "meetup", "wedding"],
    ),
];

// ═══════════════════════════════════════════════════════════════════════
// Error
// ═══════════════════════════════════════════════════════════════════════

/// Errors from defining a topic table.
#[derive(Debug, Error, Diagnostic)]
pub enum TopicError {
    #[error("topic table is empty")]
    #[diagnostic(
        code(flowgraph::topic::empty_table),
        help("Define at least one topic, or omit `topics` to use the built-in table.")
    )]
    EmptyTable,

    #[error("topic name is empty")]
    #[diagnostic(
        code(flowgraph::topic::empty_name),
        help("Every topic needs a non-blank name.")
    )]
    EmptyName,

    #[error("topic \"{name}\" is declared more than once")]
    #[diagnostic(
        code(flowgraph::topic::duplicate),
        help("Topic names must be unique; merge the keyword lists into one entry.")
    )]
    DuplicateName { name: String },

    #[error("topic name \"general\" is reserved")]
    #[diagnostic(
        code(flowgraph::topic::reserved),
        help("`general` collects items no keyword matched. Pick a different name.")
    )]
    ReservedName,

    #[error("topic \"{name}\" has no keywords")]
    #[diagnostic(
        code(flowgraph::topic::no_keywords),
        help("A topic without keywords can never score; give it at least one non-blank keyword.")
    )]
    NoKeywords { name: String },
}

/// Convenience alias.
pub type TopicResult<T> = std::result::Result<T, TopicError>;

// ═══════════════════════════════════════════════════════════════════════
// Table
// ═══════════════════════════════════════════════════════════════════════

/// One topic declaration. Keywords are fixed once the table is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDef {
    name: String,
    keywords: Vec<String>,
}

impl TopicDef {
    pub fn new<S: Into<String>>(name: impl Into<String>, keywords: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    /// Total keyword occurrences in already-lowercased text.
    pub fn score(&self, lower: &str) -> usize {
        self.keywords.iter().map(|kw| lower.matches(kw.as_str()).count()).sum()
    }
}

/// Ordered, validated topic table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicTable {
    defs: Vec<TopicDef>,
}

impl TopicTable {
    /// Validate and freeze a table. Keywords are trimmed and lowercased;
    /// blank keywords are dropped.
    pub fn new(defs: Vec<TopicDef>) -> TopicResult<Self> {
        if defs.is_empty() {
            return Err(TopicError::EmptyTable);
        }
        let mut seen = HashSet::new();
        let mut frozen = Vec::with_capacity(defs.len());
        for def in defs {
            let name = def.name.trim().to_string();
            if name.is_empty() {
                return Err(TopicError::EmptyName);
            }
            if name.eq_ignore_ascii_case(GENERAL_TOPIC) {
                return Err(TopicError::ReservedName);
            }
            if !seen.insert(name.clone()) {
                return Err(TopicError::DuplicateName { name });
            }
            let keywords: Vec<String> = def
                .keywords
                .iter()
                .map(|kw| kw.trim().to_lowercase())
                .filter(|kw| !kw.is_empty())
                .collect();
            if keywords.is_empty() {
                return Err(TopicError::NoKeywords { name });
            }
            frozen.push(TopicDef { name, keywords });
        }
        Ok(Self { defs: frozen })
    }

    /// The table built from [`DEFAULT_TOPICS`].
    pub fn builtin() -> Self {
        Self {
            defs: DEFAULT_TOPICS
                .iter()
                .map(|(name, kws)| TopicDef::new(*name, kws.iter().copied()))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicDef> {
        self.defs.iter()
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Topic names in table order, followed by [`GENERAL_TOPIC`].
    pub fn topic_names(&self) -> Vec<&str> {
        self.defs
            .iter()
            .map(TopicDef::name)
            .chain(std::iter::once(GENERAL_TOPIC))
            .collect()
    }

    /// Classify a text. Pure function of the text and the table.
    pub fn classify(&self, text: &str) -> &str {
        let lower = text.to_lowercase();
        let mut best: Option<(&TopicDef, usize)> = None;
        for def in &self.defs {
            let score = def.score(&lower);
            // Strictly greater keeps the earlier declaration on ties.
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((def, score));
            }
        }
        best.map(|(def, _)| def.name()).unwrap_or(GENERAL_TOPIC)
    }
}

impl Default for TopicTable {
    fn default() -> Self {
        Self::builtin()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Per-run topics
// ═══════════════════════════════════════════════════════════════════════

/// A topic populated for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Topic {
    pub name: String,
    pub keywords: Vec<String>,
    pub content_ids: BTreeSet<String>,
    pub action_ids: BTreeSet<String>,
    pub related_topics: BTreeSet<String>,
}

impl Topic {
    fn empty(name: &str, keywords: &[String]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.to_vec(),
            content_ids: BTreeSet::new(),
            action_ids: BTreeSet::new(),
            related_topics: BTreeSet::new(),
        }
    }
}

/// Export shape for one topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSummary {
    pub keywords: Vec<String>,
    pub content_count: usize,
    pub action_count: usize,
    pub related: Vec<String>,
}

/// All topics of one run plus the content → topic assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicIndex {
    /// Table order, `general` last.
    topics: Vec<Topic>,
    by_name: HashMap<String, usize>,
    content_topic: HashMap<String, String>,
}

impl TopicIndex {
    /// Classify contents and actions, fill membership sets, and link topics
    /// that share a content id. Sets each action's `topic`.
    pub fn build(table: &TopicTable, contents: &[ContentItem], actions: &mut [ActionItem]) -> Self {
        let mut topics: Vec<Topic> = table
            .iter()
            .map(|def| Topic::empty(def.name(), def.keywords()))
            .collect();
        topics.push(Topic::empty(GENERAL_TOPIC, &[]));
        let by_name: HashMap<String, usize> = topics
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        let mut content_topic = HashMap::with_capacity(contents.len());
        for item in contents {
            let name = table.classify(&item.text);
            topics[by_name[name]].content_ids.insert(item.id.clone());
            content_topic.insert(item.id.clone(), name.to_string());
        }

        for action in actions.iter_mut() {
            let name = table.classify(&action.text);
            let topic = &mut topics[by_name[name]];
            topic.action_ids.insert(action.id.clone());
            topic.content_ids.insert(action.source_id.clone());
            action.topic = name.to_string();
        }

        let mut index = Self {
            topics,
            by_name,
            content_topic,
        };
        index.link_related();

        tracing::info!(
            topics = index.topics.iter().filter(|t| !t.content_ids.is_empty()).count(),
            links = index.topics.iter().map(|t| t.related_topics.len()).sum::<usize>() / 2,
            "topic classification complete"
        );
        index
    }

    /// Rebuild the symmetric related-topic relation from content overlap.
    fn link_related(&mut self) {
        for topic in &mut self.topics {
            topic.related_topics.clear();
        }
        let n = self.topics.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let shared = !self.topics[i]
                    .content_ids
                    .is_disjoint(&self.topics[j].content_ids);
                if shared {
                    let (a, b) = (self.topics[i].name.clone(), self.topics[j].name.clone());
                    self.topics[i].related_topics.insert(b);
                    self.topics[j].related_topics.insert(a);
                }
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Topic> {
        self.by_name.get(name).map(|&i| &self.topics[i])
    }

    /// Topics in table order, `general` last.
    pub fn iter(&self) -> impl Iterator<Item = &Topic> {
        self.topics.iter()
    }

    /// Topic assigned to a content item's own text.
    pub fn content_topic(&self, content_id: &str) -> Option<&str> {
        self.content_topic.get(content_id).map(String::as_str)
    }

    pub fn summaries(&self) -> BTreeMap<String, TopicSummary> {
        self.topics
            .iter()
            .map(|t| {
                (
                    t.name.clone(),
                    TopicSummary {
                        keywords: t.keywords.clone(),
                        content_count: t.content_ids.len(),
                        action_count: t.action_ids.len(),
                        related: t.related_topics.iter().cloned().collect(),
                    },
                )
            })
            .collect()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Priority;
    use crate::content::SourceCategory;

    fn table(defs: &[(&str, &[&str])]) -> TopicTable {
        TopicTable::new(
            defs.iter()
                .map(|(n, kws)| TopicDef::new(*n, kws.iter().copied()))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn documentation_beats_development() {
        let t = TopicTable::builtin();
        assert_eq!(t.classify("TODO: Update the API documentation"), "documentation");
        assert_eq!(t.classify("ASAP: Fix the login bug"), "development");
    }

    #[test]
    fn zero_score_is_general() {
        let t = TopicTable::builtin();
        assert_eq!(t.classify("Lovely weather today"), GENERAL_TOPIC);
        assert_eq!(t.classify(""), GENERAL_TOPIC);
    }

    #[test]
    fn tie_goes_to_declaration_order() {
        let t = table(&[("alpha", &["red"]), ("beta", &["blue"])]);
        assert_eq!(t.classify("red and blue"), "alpha");
        let t = table(&[("beta", &["blue"]), ("alpha", &["red"])]);
        assert_eq!(t.classify("red and blue"), "beta");
    }

    #[test]
    fn repeated_keywords_count() {
        let t = table(&[("alpha", &["red"]), ("beta", &["blue"])]);
        assert_eq!(t.classify("red, blue, blue"), "beta");
    }

    #[test]
    fn classification_is_deterministic() {
        let t = TopicTable::builtin();
        let text = "Book a flight and a hotel for the conference";
        let first = t.classify(text).to_string();
        for _ in 0..10 {
            assert_eq!(t.classify(text), first);
        }
        assert_eq!(first, "travel");
    }

    #[test]
    fn keywords_are_lowercased_and_frozen() {
        let t = table(&[("Ops", &["  Deploy ", ""])]);
        let def = t.iter().next().unwrap();
        assert_eq!(def.keywords(), &["deploy".to_string()]);
        assert_eq!(t.classify("DEPLOY tonight"), "Ops");
    }

    #[test]
    fn table_validation() {
        assert!(matches!(TopicTable::new(vec![]), Err(TopicError::EmptyTable)));
        assert!(matches!(
            TopicTable::new(vec![TopicDef::new("  ", ["x"])]),
            Err(TopicError::EmptyName)
        ));
        assert!(matches!(
            TopicTable::new(vec![TopicDef::new("", ["x"])]),
            Err(TopicError::EmptyName)
        ));
        assert!(matches!(
            TopicTable::new(vec![TopicDef::new("General", ["x"])]),
            Err(TopicError::ReservedName)
        ));
        assert!(matches!(
            TopicTable::new(vec![TopicDef::new("a", ["x"]), TopicDef::new("a", ["y"])]),
            Err(TopicError::DuplicateName { .. })
        ));
        assert!(matches!(
            TopicTable::new(vec![TopicDef::new("a", [" "])]),
            Err(TopicError::NoKeywords { .. })
        ));
    }

    #[test]
    fn topic_names_end_with_general() {
        let table = TopicTable::builtin();
        let names = table.topic_names();
        assert_eq!(names.first(), Some(&"development"));
        assert_eq!(names.last(), Some(&GENERAL_TOPIC));
    }

    #[test]
    fn shared_content_links_topics() {
        // The note itself is about travel; its action is about finance.
        let contents = vec![ContentItem::new(
            "n1",
            "Trip planning: flight and hotel. TODO pay the hotel invoice",
            SourceCategory::Note,
        )];
        let mut actions = vec![ActionItem::new(
            "n1#0",
            "TODO pay the invoice by bank transfer",
            "n1",
            SourceCategory::Note,
            Priority::High,
            None,
        )];
        let index = TopicIndex::build(&TopicTable::builtin(), &contents, &mut actions);

        assert_eq!(index.content_topic("n1"), Some("travel"));
        assert_eq!(actions[0].topic, "finance");

        let travel = index.get("travel").unwrap();
        let finance = index.get("finance").unwrap();
        assert!(travel.related_topics.contains("finance"));
        assert!(finance.related_topics.contains("travel"));
        assert!(finance.content_ids.contains("n1"));
        assert!(finance.action_ids.contains("n1#0"));
    }

    #[test]
    fn disjoint_topics_stay_unlinked() {
        let contents = vec![
            ContentItem::new("a", "fix the login bug", SourceCategory::Note),
            ContentItem::new("b", "book the flight", SourceCategory::Note),
        ];
        let index = TopicIndex::build(&TopicTable::builtin(), &contents, &mut []);
        for topic in index.iter() {
            assert!(topic.related_topics.is_empty(), "{} has links", topic.name);
        }
    }

    #[test]
    fn summaries_cover_every_topic() {
        let contents = vec![ContentItem::new("a", "nothing to see", SourceCategory::Note)];
        let index = TopicIndex::build(&TopicTable::builtin(), &contents, &mut []);
        let summaries = index.summaries();
        assert_eq!(summaries.len(), DEFAULT_TOPICS.len() + 1);
        assert_eq!(summaries[GENERAL_TOPIC].content_count, 1);
        assert!(summaries[GENERAL_TOPIC].keywords.is_empty());
    }
}
