use serde::Deserialize;

use crate::vocab::{DEFAULT_CONTEXTS, DEFAULT_VP_KEY};

/// How long one anonymizer lives during a query evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnonymizationScope {
    /// Fresh placeholders for every answer row; rows are processed concurrently
    #[default]
    PerRow,
    /// One placeholder table shared by all rows of the evaluation
    PerQuery,
}

/// Settings of a [`crate::Processor`].
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessorConfig {
    /// JSON-LD contexts of the presentation envelope
    #[serde(default = "default_contexts")]
    pub contexts: Vec<String>,

    /// Name of the synthetic variable carrying the presentation
    #[serde(default = "default_vp_key")]
    pub vp_key: String,

    #[serde(default)]
    pub anonymization_scope: AnonymizationScope,
}

fn default_contexts() -> Vec<String> {
    DEFAULT_CONTEXTS.iter().map(|c| c.to_string()).collect()
}

fn default_vp_key() -> String {
    DEFAULT_VP_KEY.to_string()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            contexts: default_contexts(),
            vp_key: default_vp_key(),
            anonymization_scope: AnonymizationScope::default(),
        }
    }
}

impl ProcessorConfig {
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
