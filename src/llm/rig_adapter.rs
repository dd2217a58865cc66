//! Bridges rig's `CompletionModel` to our `LlmProvider` trait.

use async_trait::async_trait;
use rig::agent::AgentBuilder;
use rig::completion::{CompletionError, CompletionModel, Prompt, PromptError};

use crate::error::LlmError;
use crate::llm::provider::{CompletionRequest, CompletionResponse, LlmProvider};

/// Wraps any rig completion model.
pub struct RigAdapter<M: CompletionModel> {
    model: M,
    model_name: String,
    provider: &'static str,
}

impl<M: CompletionModel> RigAdapter<M> {
    pub fn new(model: M, model_name: &str, provider: &'static str) -> Self {
        Self {
            model,
            model_name: model_name.to_string(),
            provider,
        }
    }
}

#[async_trait]
impl<M> LlmProvider for RigAdapter<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let mut builder = AgentBuilder::new(self.model.clone());
        if let Some(system) = request.system_text() {
            builder = builder.preamble(&system);
        }
        if let Some(temperature) = request.temperature {
            builder = builder.temperature(f64::from(temperature));
        }
        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(u64::from(max_tokens));
        }
        let agent = builder.build();

        let content = agent
            .prompt(request.user_text())
            .await
            .map_err(|e| map_prompt_error(self.provider, e))?;

        Ok(CompletionResponse { content })
    }
}

fn map_prompt_error(provider: &str, error: PromptError) -> LlmError {
    match error {
        PromptError::CompletionError(CompletionError::JsonError(e)) => LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: e.to_string(),
        },
        PromptError::CompletionError(CompletionError::ResponseError(reason)) => {
            LlmError::InvalidResponse {
                provider: provider.to_string(),
                reason,
            }
        }
        other => classify_failure(provider, other.to_string()),
    }
}

/// Sort a provider failure message into rate-limit, auth or generic failure.
///
/// rig surfaces provider HTTP errors as text, so the status is recovered from it.
pub fn classify_failure(provider: &str, reason: String) -> LlmError {
    let lower = reason.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if has(&["429", "rate limit", "rate_limit", "resource_exhausted", "quota"]) {
        LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after: None,
        }
    } else if has(&[
        "401",
        "403",
        "unauthorized",
        "permission_denied",
        "invalid api key",
        "invalid x-api-key",
        "api key not valid",
        "authentication",
    ]) {
        LlmError::AuthFailed {
            provider: provider.to_string(),
        }
    } else {
        LlmError::RequestFailed {
            provider: provider.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_replies_are_rate_limited() {
        for reason in [
            "ProviderError: 429 Too Many Requests",
            "Gemini: RESOURCE_EXHAUSTED",
            "You exceeded your current quota",
        ] {
            assert!(matches!(
                classify_failure("gemini", reason.into()),
                LlmError::RateLimited { retry_after: None, .. }
            ));
        }
    }

    #[test]
    fn credential_replies_are_auth_failures() {
        for reason in [
            "HTTP status 401 Unauthorized",
            "API key not valid. Please pass a valid API key.",
            "authentication_error: invalid x-api-key",
        ] {
            let err = classify_failure("anthropic", reason.into());
            assert!(matches!(err, LlmError::AuthFailed { ref provider } if provider == "anthropic"));
        }
    }

    #[test]
    fn other_failures_keep_their_reason() {
        let err = classify_failure("openai", "connection reset by peer".into());
        match err {
            LlmError::RequestFailed { provider, reason } => {
                assert_eq!(provider, "openai");
                assert_eq!(reason, "connection reset by peer");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_provider_payload_is_invalid_response() {
        let err = map_prompt_error(
            "openai",
            PromptError::CompletionError(CompletionError::ResponseError("no choices".into())),
        );
        assert!(matches!(err, LlmError::InvalidResponse { ref reason, .. } if reason == "no choices"));
    }
}
