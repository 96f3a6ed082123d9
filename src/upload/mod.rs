//! Report upload to the coverage-tracking service.
//!
//! One outbound POST per run. The auth mode is selected from the
//! trigger context computed at pipeline start: pushes and same-repo
//! pull requests mint a short-lived identity-federation token from the
//! CI runner; every other trigger requires a stored credential. Any
//! failure here fails the whole run; there is no retry.

use crate::errors::PipelineError;
use crate::models::{AuthMode, TriggerContext, UploadResult};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variable with the runner's ID-token endpoint.
pub const OIDC_URL_VAR: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";
/// Environment variable with the bearer for the ID-token endpoint.
pub const OIDC_TOKEN_VAR: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";

/// Audience requested for minted ID tokens.
const OIDC_AUDIENCE: &str = "covjoin";

/// The runner-provided endpoint for minting ID tokens.
#[derive(Debug, Clone)]
pub struct OidcRequestEnv {
    /// Endpoint URL.
    pub url: String,
    /// Bearer token authorizing the mint request.
    pub request_token: String,
}

impl OidcRequestEnv {
    /// Read the ID-token endpoint from the environment, if exposed.
    pub fn from_env() -> Option<Self> {
        let url = std::env::var(OIDC_URL_VAR).ok()?;
        let request_token = std::env::var(OIDC_TOKEN_VAR).ok()?;
        Some(Self { url, request_token })
    }
}

/// Uploads the combined XML report to the coverage service.
pub struct Uploader {
    client: reqwest::Client,
    service_url: String,
    timeout_seconds: u64,
}

impl Uploader {
    /// Create an uploader for a service URL.
    pub fn new(service_url: String, timeout_seconds: u64) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .map_err(|e| PipelineError::upload(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            service_url,
            timeout_seconds,
        })
    }

    /// Select the auth mode for this run.
    ///
    /// Triggers eligible for identity federation mint an ID token from
    /// the runner endpoint; when the endpoint is not exposed, a stored
    /// credential is accepted as a fallback. All other triggers require
    /// the stored credential outright.
    pub async fn resolve_auth(
        &self,
        ctx: &TriggerContext,
        stored_token: Option<&str>,
        oidc_env: Option<OidcRequestEnv>,
    ) -> Result<AuthMode, PipelineError> {
        if ctx.use_oidc() {
            match oidc_env {
                Some(env) => {
                    let token = self.mint_id_token(&env).await?;
                    info!("Using identity-federation auth for {} trigger", ctx);
                    return Ok(AuthMode::Oidc(token));
                }
                None => {
                    if let Some(token) = stored_token {
                        warn!("ID-token endpoint not exposed; falling back to stored credential");
                        return Ok(AuthMode::Token(token.to_string()));
                    }
                    return Err(PipelineError::upload(format!(
                        "trigger '{}' selects identity federation but no ID-token endpoint \
                         or stored credential is available",
                        ctx
                    )));
                }
            }
        }

        match stored_token {
            Some(token) => {
                info!("Using stored-credential auth for {} trigger", ctx);
                Ok(AuthMode::Token(token.to_string()))
            }
            None => Err(PipelineError::upload(format!(
                "trigger '{}' requires a stored credential (set COVJOIN_TOKEN)",
                ctx
            ))),
        }
    }

    /// Mint a short-lived ID token from the runner endpoint.
    async fn mint_id_token(&self, env: &OidcRequestEnv) -> Result<String, PipelineError> {
        let separator = if env.url.contains('?') { '&' } else { '?' };
        let url = format!("{}{}audience={}", env.url, separator, OIDC_AUDIENCE);

        debug!("Requesting ID token with audience '{}'", OIDC_AUDIENCE);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&env.request_token)
            .send()
            .await
            .map_err(|e| self.map_request_error("ID-token endpoint", e))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(PipelineError::upload(format!(
                "ID-token endpoint returned {}",
                status
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PipelineError::upload(format!("cannot parse ID-token response: {}", e)))?;

        token_from_response(&body)
    }

    /// Transmit the XML report. Fatal on any rejection.
    pub async fn upload(
        &self,
        xml: &str,
        auth: &AuthMode,
    ) -> Result<UploadResult, PipelineError> {
        info!(
            "Uploading {} byte report to {} ({} auth)",
            xml.len(),
            self.service_url,
            auth.label()
        );

        let response = self
            .client
            .post(&self.service_url)
            .bearer_auth(auth.bearer())
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(xml.to_string())
            .send()
            .await
            .map_err(|e| self.map_request_error("coverage service", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::upload(format!(
                "coverage service returned {}: {}",
                status, body
            )));
        }

        // The service may return a report URL; absence is not an error.
        let report_url = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|v| v["url"].as_str().map(String::from));

        Ok(UploadResult {
            status: status.as_u16(),
            report_url,
        })
    }

    /// Map transport errors onto the pipeline's fatal upload kind.
    fn map_request_error(&self, target: &str, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::upload(format!(
                "{} timed out after {}s",
                target, self.timeout_seconds
            ))
        } else if e.is_connect() {
            PipelineError::upload(format!("cannot connect to {}", target))
        } else {
            PipelineError::upload(format!("request to {} failed: {}", target, e))
        }
    }
}

/// Extract the minted token from an ID-token endpoint response.
fn token_from_response(body: &Value) -> Result<String, PipelineError> {
    body["value"]
        .as_str()
        .map(String::from)
        .ok_or_else(|| PipelineError::upload("ID-token response has no 'value' field"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uploader() -> Uploader {
        Uploader::new("https://coverage.example.com/upload".to_string(), 5).unwrap()
    }

    #[tokio::test]
    async fn test_fork_pull_request_requires_stored_token() {
        let ctx = TriggerContext::PullRequest { from_fork: true };

        let err = uploader().resolve_auth(&ctx, None, None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upload(_)));

        let auth = uploader()
            .resolve_auth(&ctx, Some("secret"), None)
            .await
            .unwrap();
        assert!(matches!(auth, AuthMode::Token(_)));
    }

    #[tokio::test]
    async fn test_push_without_oidc_endpoint_falls_back_to_stored_token() {
        let auth = uploader()
            .resolve_auth(&TriggerContext::Push, Some("secret"), None)
            .await
            .unwrap();
        assert!(matches!(auth, AuthMode::Token(_)));
    }

    #[tokio::test]
    async fn test_push_without_any_credential_is_fatal() {
        let err = uploader()
            .resolve_auth(&TriggerContext::Push, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Upload(_)));
    }

    #[tokio::test]
    async fn test_other_trigger_requires_stored_token() {
        let ctx = TriggerContext::Other("workflow_dispatch".to_string());
        let auth = uploader()
            .resolve_auth(&ctx, Some("secret"), None)
            .await
            .unwrap();
        assert_eq!(auth.label(), "token");
    }

    #[test]
    fn test_token_from_response() {
        let body = serde_json::json!({"value": "minted-token"});
        assert_eq!(token_from_response(&body).unwrap(), "minted-token");

        let body = serde_json::json!({"count": 1});
        let err = token_from_response(&body).unwrap_err();
        assert!(matches!(err, PipelineError::Upload(_)));
        assert!(err.to_string().contains("'value'"));
    }

    #[test]
    fn test_auth_mode_bearer() {
        assert_eq!(AuthMode::Oidc("abc".to_string()).bearer(), "abc");
        assert_eq!(AuthMode::Token("xyz".to_string()).bearer(), "xyz");
    }
}
