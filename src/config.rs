//! Pipeline configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields the stock
//! behavior. A `[[topics]]` list replaces the built-in topic table wholesale.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::topic::{TopicDef, TopicTable};

/// Tunables for one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Shortest action sentence kept, in characters.
    #[serde(default = "default_min_action_len")]
    pub min_action_len: usize,
    /// Longest action sentence kept, in characters.
    #[serde(default = "default_max_action_len")]
    pub max_action_len: usize,
    /// Generate purchase search links for explicit purchase intent.
    #[serde(default = "default_purchase_links")]
    pub purchase_links: bool,
    /// How many tokens after a purchase verb may hold the product noun.
    #[serde(default = "default_purchase_window")]
    pub purchase_window: usize,
    /// Search URL prefix; the percent-encoded product noun is appended.
    #[serde(default = "default_purchase_search_url")]
    pub purchase_search_url: String,
    /// Ordered topic table. `None` uses the built-in table.
    #[serde(default)]
    pub topics: Option<Vec<TopicDef>>,
}

fn default_min_action_len() -> usize {
    10
}
fn default_max_action_len() -> usize {
    500
}
fn default_purchase_links() -> bool {
    true
}
fn default_purchase_window() -> usize {
    3
}
fn default_purchase_search_url() -> String {
    "https://www.amazon.com/s?k=".into()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_action_len: default_min_action_len(),
            max_action_len: default_max_action_len(),
            purchase_links: default_purchase_links(),
            purchase_window: default_purchase_window(),
            purchase_search_url: default_purchase_search_url(),
            topics: None,
        }
    }
}

impl PipelineConfig {
    /// Read, parse and validate a TOML config file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })?;
        tracing::info!(path = %path.display(), "loaded pipeline config");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: "<inline>".into(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check bounds and build the topic table once to surface table errors.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.min_action_len > self.max_action_len {
            return Err(ConfigError::LengthBounds {
                min: self.min_action_len,
                max: self.max_action_len,
            });
        }
        if self.purchase_window == 0 {
            return Err(ConfigError::PurchaseWindow);
        }
        self.topic_table()?;
        Ok(())
    }

    /// The topic table this config selects.
    pub fn topic_table(&self) -> ConfigResult<TopicTable> {
        match &self.topics {
            Some(defs) => Ok(TopicTable::new(defs.clone())?),
            None => Ok(TopicTable::builtin()),
        }
    }
}
