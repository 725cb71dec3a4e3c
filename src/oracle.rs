//! The external text-classification/translation service.
//!
//! The rest of the crate depends only on [`Oracle::request`]: a system prompt
//! and a user prompt in, raw completion text plus token usage out.
//! [`ChatOracle`] speaks the OpenAI-compatible chat completions protocol.

use crate::config::OracleConfig;
use crate::ProblabelError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Token-equivalent counters reported by the oracle. Additive across calls;
/// sums saturate at `u64::MAX`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl std::ops::Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            prompt_tokens: self.prompt_tokens.saturating_add(rhs.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_add(rhs.completion_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl std::ops::AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), |acc, u| acc + u)
    }
}

impl std::fmt::Display for Usage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "prompt={} completion={} total={}",
            self.prompt_tokens, self.completion_tokens, self.total_tokens
        )
    }
}

/// One completion returned by the oracle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub usage: Usage,
}

/// Sampling limits for a single request.
#[derive(Debug, Clone, Copy)]
pub struct RequestLimits {
    pub temperature: f64,
    pub max_tokens: u32,
}

pub trait Oracle: Sync {
    fn request(
        &self,
        system: &str,
        user: &str,
        limits: RequestLimits,
    ) -> Result<Completion, ProblabelError>;
}

/// Strip markdown code fences from an oracle response.
///
/// Handles a leading ``` with an optional language hint line (```json),
/// a fence on a single line, and a missing closing fence.
pub fn strip_fences(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.trim_end();
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    match rest.split_once('\n') {
        Some((hint, body)) if is_language_hint(hint) => body.trim(),
        _ => rest.trim(),
    }
}

fn is_language_hint(line: &str) -> bool {
    line.trim().chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// OpenAI-compatible chat completions client, with optional fallback endpoint.
pub struct ChatOracle {
    agent: ureq::Agent,
    endpoint: String,
    fallback_endpoint: Option<String>,
    model: String,
    api_key: String,
}

impl ChatOracle {
    pub fn new(config: &OracleConfig, api_key: String) -> Self {
        let agent = ureq::Agent::new_with_config(
            ureq::config::Config::builder()
                .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
                .build(),
        );
        Self {
            agent,
            endpoint: config.endpoint.clone(),
            fallback_endpoint: config.fallback_endpoint.clone(),
            model: config.model.clone(),
            api_key,
        }
    }

    fn try_endpoint(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<Completion, ProblabelError> {
        let resp: serde_json::Value = self
            .agent
            .post(endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(|e| ProblabelError::Oracle(format!("request to {endpoint}: {e}")))?
            .body_mut()
            .read_json()
            .map_err(|e| ProblabelError::Oracle(format!("response from {endpoint}: {e}")))?;

        parse_chat_response(&resp)
    }
}

impl Oracle for ChatOracle {
    fn request(
        &self,
        system: &str,
        user: &str,
        limits: RequestLimits,
    ) -> Result<Completion, ProblabelError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": limits.temperature,
            "max_tokens": limits.max_tokens,
        });

        match self.try_endpoint(&self.endpoint, &body) {
            Ok(completion) => Ok(completion),
            Err(primary_err) => match &self.fallback_endpoint {
                Some(fallback) => {
                    log::warn!("primary endpoint failed ({primary_err}), trying fallback");
                    self.try_endpoint(fallback, &body)
                }
                None => Err(primary_err),
            },
        }
    }
}

/// Pull content and usage out of a chat completions response body.
fn parse_chat_response(resp: &serde_json::Value) -> Result<Completion, ProblabelError> {
    let content = resp
        .pointer("/choices/0/message/content")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| ProblabelError::Oracle("no content in chat completion response".into()))?
        .trim()
        .to_string();

    let count = |key: &str| {
        resp.get("usage")
            .and_then(|u| u.get(key))
            .and_then(serde_json::Value::as_u64)
    };
    let prompt_tokens = count("prompt_tokens").unwrap_or(0);
    let completion_tokens = count("completion_tokens").unwrap_or(0);
    let total_tokens = count("total_tokens").unwrap_or(prompt_tokens.saturating_add(completion_tokens));

    Ok(Completion {
        content,
        usage: Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        },
    })
}
