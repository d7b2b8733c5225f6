//! Wire contract for the remote reasoning endpoint.
//!
//! The request is an OpenAI-compatible vision chat completion: one user
//! message carrying the JSON context plus the camera frame as a base64
//! data URL. The response must reduce to
//! `{"explanation": string, "recommendations": [{target, value,
//! rationale}]}`; any deviation from that shape is a reasoning failure,
//! never a parse panic.

use serde_json::{json, Value};

use crate::error::{TwinError, TwinResult};
use crate::recommend::{Recommendation, RecommendationSet};

use super::ReasoningContext;

/// Maximum tokens requested from the model.
const MAX_TOKENS: u32 = 1024;

/// Builds the chat-completion request body.
///
/// Kept in one place so the payload can be adjusted when an endpoint
/// deviates from the OpenAI vision shape.
#[must_use]
pub fn build_request_body(context: &ReasoningContext, image_base64: &str, model: &str) -> Value {
    let context_json =
        serde_json::to_string_pretty(context).unwrap_or_else(|_| "{}".to_string());

    let mut alert_text = String::new();
    if !context.alerts.is_empty() {
        alert_text.push_str("\n\nSPATIAL ALERTS:\n");
        for id in &context.alerts {
            let status = context
                .zones
                .iter()
                .find(|zone| zone.id == *id)
                .map_or_else(|| "unknown".to_string(), |zone| zone.status.to_string());
            alert_text.push_str(&format!("- {id}: {status}\n"));
        }
        alert_text.push_str("Reference these zones in your explanation.\n");
    }

    let instructions = format!(
        "You are the reasoning service for a greenhouse digital twin. \
         The greenhouse has 8 beds (B01-B08), each split into zones A (north), \
         B (center) and C (south). You receive an image of the greenhouse and \
         zone-level telemetry.\n\n\
         Identify problems at the zone level and recommend targeted actions.\
         {alert_text}\n\
         Return JSON only, with this exact shape:\n\
         {{\"explanation\": \"string\", \"recommendations\": \
         [{{\"target\": \"fan\"|\"vent\"|\"valve\"|\"<zone id like B03-C>\", \
         \"value\": number in [0,1] for actuators or a status string for zones, \
         \"rationale\": \"string\"}}]}}"
    );

    json!({
        "model": model,
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": format!("Context (JSON):\n{context_json}\n\n{instructions}"),
                    },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/jpeg;base64,{image_base64}") },
                    },
                ],
            },
        ],
        "max_tokens": MAX_TOKENS,
    })
}

/// Strips a surrounding Markdown code fence, if present.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string (e.g. "json") up to the first newline.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    body.trim().strip_suffix("```").map_or(body, str::trim).trim()
}

/// Extracts a recommendation set from a raw endpoint response.
///
/// Accepts either a chat-completion wrapper (the payload JSON lives in
/// `choices[0].message.content`, possibly inside a code fence) or the
/// bare payload object.
///
/// # Errors
///
/// `TwinError::ReasoningUnavailable` on any shape deviation.
pub fn parse_response(raw: &Value) -> TwinResult<RecommendationSet> {
    let payload = match raw.pointer("/choices/0/message/content") {
        Some(Value::String(content)) => {
            let stripped = strip_code_fence(content);
            serde_json::from_str::<Value>(stripped).map_err(|e| {
                TwinError::reasoning_unavailable(format!("model output is not JSON: {e}"))
            })?
        }
        Some(other) => other.clone(),
        None => raw.clone(),
    };

    parse_payload(&payload)
}

fn parse_payload(payload: &Value) -> TwinResult<RecommendationSet> {
    let object = payload
        .as_object()
        .ok_or_else(|| TwinError::reasoning_unavailable("response payload is not an object"))?;

    let explanation = object
        .get("explanation")
        .and_then(Value::as_str)
        .ok_or_else(|| TwinError::reasoning_unavailable("response has no 'explanation' string"))?
        .to_string();

    let raw_recs = object
        .get("recommendations")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            TwinError::reasoning_unavailable("response has no 'recommendations' array")
        })?;

    let mut recommendations = Vec::with_capacity(raw_recs.len());
    for (index, raw_rec) in raw_recs.iter().enumerate() {
        let rec: Recommendation = serde_json::from_value(raw_rec.clone()).map_err(|e| {
            TwinError::reasoning_unavailable(format!("recommendation {index} is malformed: {e}"))
        })?;
        recommendations.push(rec);
    }

    Ok(RecommendationSet {
        explanation,
        recommendations,
    })
}
