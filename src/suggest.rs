use std::future::Future;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::aggregate::ChannelSummary;
use crate::curiosity::{Action, ActionType, Tier};
use crate::oracle::OracleOutput;

const SYSTEM_PROMPT: &str = "You are a marketing performance analyst. Given channel \
summaries and risk findings as JSON, reply with only a JSON array of actions. Each \
action has: action_type (pause_creative | shift_budget | increase_budget), title, \
description, impact_estimate (number, currency per month), confidence (low | medium \
| high), urgency (low | medium | high), entity_ids (array of UUIDs, primary first).";

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("suggestion service unavailable")]
    Unavailable,
    #[error("suggestion request failed: {0}")]
    Request(String),
    #[error("malformed suggestion response: {0}")]
    Malformed(String),
}

/// Capability seam for narrative-quality recommendations. Implementations
/// get exactly one bounded attempt per cycle; the caller owns the timeout
/// and always has a deterministic fallback.
pub trait SuggestProvider {
    fn suggest(
        &self,
        channels: &[ChannelSummary],
        oracle: &OracleOutput,
    ) -> impl Future<Output = Result<Vec<Action>, SuggestError>> + Send;
}

/// Chat-completions-compatible HTTP provider.
#[derive(Debug, Clone)]
pub struct HttpSuggestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpSuggestClient {
    pub fn new(base_url: String, api_key: String, model: String) -> HttpSuggestClient {
        HttpSuggestClient {
            http: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    /// Builds a client from SUGGEST_API_URL / SUGGEST_API_KEY /
    /// SUGGEST_MODEL; absent configuration means no enrichment.
    pub fn from_env() -> Option<HttpSuggestClient> {
        let base_url = std::env::var("SUGGEST_API_URL").ok()?;
        let api_key = std::env::var("SUGGEST_API_KEY").ok()?;
        let model =
            std::env::var("SUGGEST_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        Some(HttpSuggestClient::new(base_url, api_key, model))
    }
}

impl SuggestProvider for HttpSuggestClient {
    fn suggest(
        &self,
        channels: &[ChannelSummary],
        oracle: &OracleOutput,
    ) -> impl Future<Output = Result<Vec<Action>, SuggestError>> + Send {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": json!({
                    "channel_summaries": channels,
                    "risk": oracle,
                }).to_string() },
            ],
        });
        let request = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body);

        async move {
            let response = request
                .send()
                .await
                .map_err(|e| SuggestError::Request(e.to_string()))?
                .error_for_status()
                .map_err(|e| SuggestError::Request(e.to_string()))?;
            let completion: ChatCompletion = response
                .json()
                .await
                .map_err(|e| SuggestError::Malformed(e.to_string()))?;
            let content = completion
                .choices
                .first()
                .map(|c| c.message.content.as_str())
                .ok_or_else(|| SuggestError::Malformed("no choices in response".to_string()))?;
            parse_actions(content)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct WireAction {
    action_type: String,
    title: String,
    description: String,
    impact_estimate: f64,
    confidence: String,
    urgency: String,
    #[serde(default)]
    entity_ids: Vec<Uuid>,
}

/// Parses the model's reply into candidate actions. Anything off-shape is
/// a malformed response; the caller falls back to rule-based candidates.
pub fn parse_actions(content: &str) -> Result<Vec<Action>, SuggestError> {
    let wire: Vec<WireAction> = serde_json::from_str(content.trim())
        .map_err(|e| SuggestError::Malformed(e.to_string()))?;

    wire.into_iter()
        .map(|raw| {
            let action_type = match raw.action_type.as_str() {
                "pause_creative" => ActionType::PauseCreative,
                "shift_budget" => ActionType::ShiftBudget,
                "increase_budget" => ActionType::IncreaseBudget,
                other => {
                    return Err(SuggestError::Malformed(format!(
                        "unknown action_type {other:?}"
                    )))
                }
            };
            let confidence = Tier::parse(&raw.confidence).ok_or_else(|| {
                SuggestError::Malformed(format!("unknown confidence {:?}", raw.confidence))
            })?;
            let urgency = Tier::parse(&raw.urgency).ok_or_else(|| {
                SuggestError::Malformed(format!("unknown urgency {:?}", raw.urgency))
            })?;
            Ok(Action {
                action_type,
                title: raw.title,
                description: raw.description,
                impact_estimate: raw.impact_estimate,
                impact_label: format!("~${:.0}/month", raw.impact_estimate),
                confidence,
                urgency,
                score: 0,
                entity_ids: raw.entity_ids,
            })
        })
        .collect()
}
