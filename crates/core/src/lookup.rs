//! Abbreviation lookup — expands internet slang acronyms.

use async_trait::async_trait;
use crate::error::LookupError;

/// A service that guesses what a short alphanumeric token stands for.
#[async_trait]
pub trait AbbreviationLookup: Send + Sync {
    /// Candidate expansions for one normalized token (lowercase ASCII
    /// alphanumerics). An empty list means "no idea".
    async fn lookup(&self, token: &str) -> std::result::Result<Vec<String>, LookupError>;
}

/// Extract lookup tokens from raw text: every run of two or more ASCII
/// letters or digits, lowercased.
///
/// Anything else splits runs, so `"x-y"` yields nothing and `"ab cd"`
/// yields two tokens.
pub fn extract_tokens(raw: &str) -> Vec<String> {
    raw.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|run| run.len() >= 2)
        .map(str::to_ascii_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_alphanumeric_runs() {
        assert_eq!(extract_tokens("YYDS!"), vec!["yyds"]);
        assert_eq!(extract_tokens("ab cd"), vec!["ab", "cd"]);
        assert_eq!(extract_tokens("xswl,2333"), vec!["xswl", "2333"]);
    }

    #[test]
    fn short_runs_are_dropped() {
        assert!(extract_tokens(" x-y ").is_empty());
        assert!(extract_tokens("a").is_empty());
        assert!(extract_tokens("你好").is_empty());
        assert_eq!(extract_tokens("你好yyds"), vec!["yyds"]);
    }
}
