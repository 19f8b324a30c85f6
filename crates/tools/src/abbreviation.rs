//! Abbreviation search — expands internet slang acronyms ("yyds", "xswl").
//!
//! Each input is split into runs of two or more ASCII letters or digits,
//! lowercased, and the runs are looked up one at a time. Results are cached
//! per token for the life of the process; failed lookups are not cached.

use async_trait::async_trait;
use parley_core::error::{LookupError, ToolError};
use parley_core::lookup::{extract_tokens, AbbreviationLookup};
use parley_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

pub struct SearchAbbreviationTool {
    lookup: Arc<dyn AbbreviationLookup>,
    cache: RwLock<HashMap<String, Vec<String>>>,
}

impl SearchAbbreviationTool {
    pub fn new(lookup: Arc<dyn AbbreviationLookup>) -> Self {
        Self {
            lookup,
            cache: RwLock::new(HashMap::new()),
        }
    }

    async fn expand(&self, token: &str) -> Result<Vec<String>, LookupError> {
        if let Some(hit) = self.cache.read().await.get(token) {
            return Ok(hit.clone());
        }
        let found = self.lookup.lookup(token).await?;
        self.cache.write().await.insert(token.to_string(), found.clone());
        Ok(found)
    }
}

#[async_trait]
impl Tool for SearchAbbreviationTool {
    fn name(&self) -> &str {
        "search_abbreviation"
    }

    fn description(&self) -> &str {
        "Look up what internet slang abbreviations made of letters and digits stand for."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "tokens": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Abbreviations to expand, e.g. [\"yyds\", \"xswl\"]"
                }
            },
            "required": ["tokens"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let raw = arguments["tokens"]
            .as_array()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'tokens' array".into()))?;

        let mut tokens: Vec<String> = Vec::new();
        for token in raw.iter().filter_map(|t| t.as_str()).flat_map(extract_tokens) {
            if !tokens.contains(&token) {
                tokens.push(token);
            }
        }
        if tokens.is_empty() {
            return Err(ToolError::InvalidArguments(
                "No token has at least two ASCII letters or digits".into(),
            ));
        }

        let mut results = Vec::with_capacity(tokens.len());
        for token in tokens {
            match self.expand(&token).await {
                Ok(definitions) => {
                    results.push(serde_json::json!({ "token": token, "definitions": definitions }));
                }
                Err(e) => {
                    debug!(token = %token, error = %e, "Abbreviation lookup failed");
                    results.push(serde_json::json!({ "token": token, "error": e.to_string() }));
                }
            }
        }

        Ok(ToolResult::json(true, serde_json::json!({ "results": results })))
    }
}

/// One record of the guess API's response.
#[derive(Debug, Deserialize)]
struct GuessRecord {
    name: String,
    #[serde(default)]
    trans: Option<Vec<String>>,
    #[serde(default)]
    inputting: Option<Vec<String>>,
}

/// HTTP client for an nbnhhsh-style guess API.
///
/// `POST {"text": "<token>"}` → `[{"name": "<token>", "trans": [...], "inputting": [...]}]`
pub struct NbnhhshLookup {
    client: reqwest::Client,
    api_url: String,
}

impl NbnhhshLookup {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            api_url: api_url.into(),
        }
    }
}

/// Confirmed translations first; fall back to crowd-sourced candidates.
fn definitions_for(token: &str, records: Vec<GuessRecord>) -> Vec<String> {
    records
        .into_iter()
        .filter(|r| r.name.eq_ignore_ascii_case(token))
        .flat_map(|r| match r.trans {
            Some(trans) if !trans.is_empty() => trans,
            _ => r.inputting.unwrap_or_default(),
        })
        .collect()
}

#[async_trait]
impl AbbreviationLookup for NbnhhshLookup {
    async fn lookup(&self, token: &str) -> Result<Vec<String>, LookupError> {
        let response = self
            .client
            .post(&self.api_url)
            .json(&serde_json::json!({ "text": token }))
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Network(format!("guess API returned {status}")));
        }

        let records: Vec<GuessRecord> = response
            .json()
            .await
            .map_err(|e| LookupError::Decode(e.to_string()))?;
        Ok(definitions_for(token, records))
    }
}
