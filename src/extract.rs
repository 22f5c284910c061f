//! Action extraction from canonical content text.
//!
//! Tiers are scanned in fixed order (urgent → high → medium → low) using
//! [`PRIORITY_KEYWORDS`]. For each tier keyword present in the lowercased
//! text, every sentence containing it whose length is within the configured
//! bounds becomes one [`ActionItem`] of that tier. A keyword that produced a
//! match is never rescanned by a later tier, and a sentence already emitted
//! for the same content item is not emitted again, so the first tier wins.
//!
//! Purchase intent is detected separately per action sentence: a purchase
//! verb followed within a bounded token window by a known product noun yields
//! a deterministic search link. There is no fuzzy or partial matching.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::action::{ActionItem, LinkMetadata, PRIORITY_KEYWORDS};
use crate::config::PipelineConfig;
use crate::content::ContentItem;
use crate::diagnostics::{DiagnosticKind, Diagnostics};

// ── Vocabulary ──────────────────────────────────────────────────────────

const SENTENCE_BREAKS: [char; 4] = ['.', '!', '?', '\n'];

/// Verbs that open an explicit purchase intent.
pub const PURCHASE_VERBS: &[&str] = &["buy", "purchase", "order", "reorder", "grab", "restock"];

/// Product nouns recognized after a purchase verb.
pub const PRODUCT_NOUNS: &[&str] = &[
    "milk",
    "eggs",
    "bread",
    "coffee",
    "tea",
    "batteries",
    "charger",
    "cable",
    "laptop",
    "monitor",
    "keyboard",
    "headphones",
    "book",
    "books",
    "shoes",
    "shampoo",
    "toothpaste",
    "detergent",
    "vitamins",
    "ink",
];

static RE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\p{L}\p{N}']+").unwrap());

// ── Helpers ─────────────────────────────────────────────────────────────

/// Fold text for duplicate detection: NFKC, lowercase, collapsed whitespace.
pub fn normalize_text(text: &str) -> String {
    text.nfkc()
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split on `.`, `!`, `?` and newlines, trimming each piece and dropping
/// empty ones.
pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(SENTENCE_BREAKS)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Detect explicit purchase intent in one sentence.
///
/// `window` is how many tokens after the verb may hold the noun (1 means
/// the noun must immediately follow).
pub fn detect_purchase_intent(sentence: &str, window: usize, search_url: &str) -> Option<LinkMetadata> {
    let lower = sentence.to_lowercase();
    let tokens: Vec<&str> = RE_TOKEN.find_iter(&lower).map(|m| m.as_str()).collect();

    for (i, token) in tokens.iter().enumerate() {
        if !PURCHASE_VERBS.contains(token) {
            continue;
        }
        let end = (i + window).min(tokens.len().saturating_sub(1));
        if let Some(noun) = tokens[i + 1..=end.max(i)]
            .iter()
            .find(|t| PRODUCT_NOUNS.contains(t))
        {
            return Some(LinkMetadata {
                kind: "purchase".into(),
                query: (*noun).to_string(),
                url: format!("{search_url}{}", urlencoding::encode(noun)),
            });
        }
    }
    None
}

// ── Extractor ───────────────────────────────────────────────────────────

/// Keyword-tier action extractor.
#[derive(Debug, Clone)]
pub struct ActionExtractor {
    min_len: usize,
    max_len: usize,
    purchase_links: bool,
    purchase_window: usize,
    search_url: String,
}

impl Default for ActionExtractor {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl ActionExtractor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            min_len: config.min_action_len,
            max_len: config.max_action_len,
            purchase_links: config.purchase_links,
            purchase_window: config.purchase_window,
            search_url: config.purchase_search_url.clone(),
        }
    }

    /// Extract all actions from one content item.
    ///
    /// Out-of-bounds candidate sentences are discarded individually and
    /// reported in `diagnostics`. Returned actions have an empty `topic`;
    /// the topic classifier fills it in.
    pub fn extract(&self, item: &ContentItem, diagnostics: &mut Diagnostics) -> Vec<ActionItem> {
        let lower = item.text.to_lowercase();
        let sentences = split_sentences(&item.text);

        let mut actions: Vec<ActionItem> = Vec::new();
        let mut emitted: HashSet<String> = HashSet::new();
        let mut rejected: HashSet<String> = HashSet::new();
        let mut claimed: HashSet<&str> = HashSet::new();

        for (tier, keywords) in PRIORITY_KEYWORDS {
            for &keyword in *keywords {
                if claimed.contains(keyword) || !lower.contains(keyword) {
                    continue;
                }

                let mut matched = false;
                for sentence in &sentences {
                    if !sentence.to_lowercase().contains(keyword) {
                        continue;
                    }
                    let normalized = normalize_text(sentence);
                    let len = sentence.chars().count();
                    if len < self.min_len || len > self.max_len {
                        if rejected.insert(normalized) {
                            diagnostics.push(
                                DiagnosticKind::ActionOutOfBounds,
                                item.id.clone(),
                                format!(
                                    "candidate action of {len} chars outside [{}, {}] discarded",
                                    self.min_len, self.max_len
                                ),
                            );
                        }
                        continue;
                    }
                    matched = true;
                    if !emitted.insert(normalized) {
                        continue;
                    }

                    let mut action = ActionItem::new(
                        format!("{}#{}", item.id, actions.len()),
                        *sentence,
                        item.id.clone(),
                        item.source_type,
                        *tier,
                        item.created_at,
                    );
                    if self.purchase_links {
                        action.link_metadata =
                            detect_purchase_intent(sentence, self.purchase_window, &self.search_url);
                    }
                    tracing::debug!(id = %action.id, %tier, keyword, "action extracted");
                    actions.push(action);
                }

                if matched {
                    claimed.insert(keyword);
                }
            }
        }

        actions
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Priority;
    use crate::content::SourceCategory;

    fn note(id: &str, text: &str) -> ContentItem {
        ContentItem::new(id, text, SourceCategory::Note)
    }

    fn extract(text: &str) -> (Vec<ActionItem>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let actions = ActionExtractor::default().extract(&note("n1", text), &mut diags);
        (actions, diags)
    }

    #[test]
    fn asap_is_urgent() {
        let (actions, _) = extract("ASAP: Fix the login bug!");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].priority, Priority::Urgent);
        assert_eq!(actions[0].text, "ASAP: Fix the login bug");
        assert_eq!(actions[0].id, "n1#0");
        assert_eq!(actions[0].source_id, "n1");
    }

    #[test]
    fn todo_is_high() {
        let (actions, _) = extract("TODO: Update the API documentation");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].priority, Priority::High);
    }

    #[test]
    fn no_keywords_no_actions() {
        let (actions, diags) = extract("Lovely weather at the beach today.");
        assert!(actions.is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn multiple_tiers_from_one_text() {
        let text = "This is urgent, call the plumber. \
                    We should repaint the fence. \
                    Maybe learn the ukulele someday.";
        let (actions, _) = extract(text);
        let tiers: Vec<Priority> = actions.iter().map(|a| a.priority).collect();
        assert_eq!(tiers, vec![Priority::Urgent, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn first_tier_wins_for_shared_sentence() {
        // "urgent" and "must" both hit the same sentence; urgent claims it.
        let (actions, _) = extract("Urgent: we must renew the passport");
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].priority, Priority::Urgent);
    }

    #[test]
    fn duplicate_sentences_collapse() {
        let (actions, _) = extract("TODO call the bank\nTODO   call the BANK\nTODO call the bank");
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn short_sentence_discarded_with_diagnostic() {
        let (actions, diags) = extract("ASAP! Then the long part follows here.");
        assert!(actions.is_empty());
        assert_eq!(diags.count(DiagnosticKind::ActionOutOfBounds), 1);
    }

    #[test]
    fn long_sentence_discarded() {
        let text = format!("todo {}", "x".repeat(600));
        let (actions, diags) = extract(&text);
        assert!(actions.is_empty());
        assert_eq!(diags.count(DiagnosticKind::ActionOutOfBounds), 1);
    }

    #[test]
    fn bounds_are_inclusive() {
        // Exactly 10 chars.
        let (actions, _) = extract("todo 12345");
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn created_at_copied_from_content() {
        let created = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let item = note("n2", "Remember to water the plants").with_created_at(created);
        let mut diags = Diagnostics::new();
        let actions = ActionExtractor::default().extract(&item, &mut diags);
        assert_eq!(actions[0].created_at, Some(created));
        assert_eq!(actions[0].source_type, SourceCategory::Note);
    }

    #[test]
    fn purchase_link_within_window() {
        let link = detect_purchase_intent("Need to buy some oat milk", 3, "https://shop/?q=").unwrap();
        assert_eq!(link.kind, "purchase");
        assert_eq!(link.query, "milk");
        assert_eq!(link.url, "https://shop/?q=milk");
    }

    #[test]
    fn purchase_link_requires_both_verb_and_noun() {
        assert!(detect_purchase_intent("The milk went sour", 3, "u").is_none());
        assert!(detect_purchase_intent("Buy something nice for mom", 3, "u").is_none());
        // Noun beyond the window.
        assert!(detect_purchase_intent("buy a very nice new laptop", 2, "u").is_none());
        assert!(detect_purchase_intent("buy a very nice new laptop", 5, "u").is_some());
        // Adjacent only.
        assert!(detect_purchase_intent("order coffee", 1, "u").is_some());
        // Verb at the very end.
        assert!(detect_purchase_intent("milk is what I need to buy", 3, "u").is_none());
    }

    #[test]
    fn purchase_links_attach_to_actions() {
        let (actions, _) = extract("Don't forget to buy batteries for the remote");
        assert_eq!(actions.len(), 1);
        let link = actions[0].link_metadata.as_ref().unwrap();
        assert_eq!(link.query, "batteries");
        assert!(link.url.ends_with("batteries"));
    }

    #[test]
    fn purchase_links_can_be_disabled() {
        let config = PipelineConfig {
            purchase_links: false,
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        let actions = ActionExtractor::new(&config)
            .extract(&note("n1", "TODO buy coffee beans"), &mut diags);
        assert_eq!(actions.len(), 1);
        assert!(actions[0].link_metadata.is_none());
    }

    #[test]
    fn normalize_folds_case_and_space() {
        assert_eq!(normalize_text("  Call\tThe   BANK "), "call the bank");
        assert_eq!(normalize_text("ｔｏｄｏ"), "todo");
    }
}
