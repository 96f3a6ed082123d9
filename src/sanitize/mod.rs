//! Pull-request description sanitizer.
//!
//! Fetches a pull request's description, strips the HTML-comment
//! template instructions contributors leave behind, and writes the
//! cleaned text back. Runs as its own pipeline; its failures never
//! touch the coverage aggregator.

use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// Non-greedy match of one HTML-comment block, across newlines.
const TEMPLATE_COMMENT_PATTERN: &str = r"(?s)<!--.*?-->";

fn template_comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(TEMPLATE_COMMENT_PATTERN).unwrap())
}

fn blank_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap())
}

/// Remove HTML-comment-delimited template instructions from a PR body.
///
/// Runs of blank lines left behind by removed comments are collapsed.
/// Applying this twice yields the same result as applying it once.
pub fn strip_template_comments(body: &str) -> String {
    let stripped = template_comment_re().replace_all(body, "");
    let collapsed = blank_run_re().replace_all(&stripped, "\n\n");
    collapsed.trim().to_string()
}

/// Parse a GitHub URL to extract owner and repo name.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    // Handle various GitHub URL formats
    let url = url.trim_end_matches('/').trim_end_matches(".git");

    // https://github.com/owner/repo
    if let Some(rest) = url.strip_prefix("https://github.com/") {
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() >= 2 {
            return Some((parts[0].to_string(), parts[1].to_string()));
        }
    }

    // git@github.com:owner/repo
    if let Some(rest) = url.strip_prefix("git@github.com:") {
        let parts: Vec<&str> = rest.split('/').collect();
        if parts.len() >= 2 {
            return Some((parts[0].to_string(), parts[1].to_string()));
        }
    }

    None
}

/// Outcome of one sanitizer run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanitizeOutcome {
    /// The description contained template markup and was rewritten.
    Updated,
    /// The description was already clean (or empty); nothing written.
    Unchanged,
}

/// Cleans pull-request descriptions through the GitHub API.
pub struct Sanitizer {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl Sanitizer {
    /// Create a sanitizer for an API base URL and token.
    pub fn new(api_url: String, token: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Fetch, clean, and (when needed) write back one PR description.
    pub async fn sanitize(&self, owner: &str, repo: &str, pr: u64) -> Result<SanitizeOutcome> {
        let url = format!("{}/repos/{}/{}/pulls/{}", self.api_url, owner, repo, pr);

        debug!("Fetching PR description from {}", url);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, "covjoin")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .with_context(|| format!("Failed to fetch PR #{}", pr))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("GitHub API error {} for PR #{}: {}", status, pr, body));
        }

        let pull: Value = response
            .json()
            .await
            .context("Failed to parse pull request response")?;

        let body = match pull["body"].as_str() {
            Some(body) if !body.is_empty() => body.to_string(),
            _ => {
                info!("PR #{} has no description; nothing to sanitize", pr);
                return Ok(SanitizeOutcome::Unchanged);
            }
        };

        let cleaned = strip_template_comments(&body);
        if cleaned == body {
            info!("PR #{} description already clean", pr);
            return Ok(SanitizeOutcome::Unchanged);
        }

        debug!(
            "Rewriting PR #{} description ({} -> {} bytes)",
            pr,
            body.len(),
            cleaned.len()
        );
        let response = self
            .client
            .patch(&url)
            .bearer_auth(&self.token)
            .header(reqwest::header::USER_AGENT, "covjoin")
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .json(&json!({ "body": cleaned }))
            .send()
            .await
            .with_context(|| format!("Failed to update PR #{}", pr))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!(
                "GitHub API error {} updating PR #{}: {}",
                status,
                pr,
                body
            ));
        }

        info!("PR #{} description sanitized", pr);
        Ok(SanitizeOutcome::Updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_removes_comment_blocks() {
        let body = "Fixes a bug.\n\n<!-- Describe your change here -->\n\nDetails follow.";
        assert_eq!(
            strip_template_comments(body),
            "Fixes a bug.\n\nDetails follow."
        );
    }

    #[test]
    fn test_strip_removes_multiline_comments() {
        let body = "Summary\n<!--\nDelete this checklist\n- [ ] item\n-->\nBody";
        assert_eq!(strip_template_comments(body), "Summary\n\nBody");
    }

    #[test]
    fn test_strip_keeps_clean_text() {
        let body = "No markup here.\n\nJust prose.";
        assert_eq!(strip_template_comments(body), body);
    }

    #[test]
    fn test_strip_is_idempotent() {
        let body = "A\n<!-- one -->\nB\n<!-- two -->\nC";
        let once = strip_template_comments(body);
        let twice = strip_template_comments(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_strip_handles_comment_only_body() {
        let body = "<!-- template text only -->";
        assert_eq!(strip_template_comments(body), "");
    }

    #[test]
    fn test_parse_github_url_https() {
        let result = parse_github_url("https://github.com/owner/repo");
        assert_eq!(result, Some(("owner".to_string(), "repo".to_string())));
    }

    #[test]
    fn test_parse_github_url_https_with_git() {
        let result = parse_github_url("https://github.com/owner/repo.git");
        assert_eq!(result, Some(("owner".to_string(), "repo".to_string())));
    }

    #[test]
    fn test_parse_github_url_ssh() {
        let result = parse_github_url("git@github.com:owner/repo");
        assert_eq!(result, Some(("owner".to_string(), "repo".to_string())));
    }

    #[test]
    fn test_parse_github_url_invalid() {
        let result = parse_github_url("https://gitlab.com/user/repo");
        assert_eq!(result, None);
    }
}
