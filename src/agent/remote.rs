//! Remote reasoning agent.
//!
//! Issues a single bounded HTTP request per tick to a configured
//! vision/reasoning endpoint. Network errors, non-2xx responses,
//! malformed payloads and timeouts all surface as
//! `TwinError::ReasoningUnavailable`; the engine then runs the local
//! rule policy for that tick. There are no retries.

use std::time::Duration;

use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{TwinError, TwinResult};
use crate::recommend::RecommendationSet;

use super::{wire, ImageRef, ReasoningAgent, ReasoningContext};

/// Client for the remote reasoning endpoint.
#[derive(Debug)]
pub struct RemoteAgent {
    config: RemoteConfig,
    client: reqwest::blocking::Client,
}

impl RemoteAgent {
    /// Creates an agent for a configured endpoint.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::ReasoningUnavailable` if the endpoint is not
    /// configured (missing URL or key) or the HTTP client cannot be
    /// built.
    pub fn new(config: RemoteConfig) -> TwinResult<Self> {
        if !config.is_configured() {
            return Err(TwinError::reasoning_unavailable(
                "remote endpoint not configured (missing api_url or api_key)",
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| TwinError::reasoning_unavailable(format!("http client: {e}")))?;
        Ok(Self { config, client })
    }

    /// The configured model name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl ReasoningAgent for RemoteAgent {
    fn decide(
        &self,
        image: Option<&ImageRef>,
        context: &ReasoningContext,
        timeout: Duration,
    ) -> TwinResult<RecommendationSet> {
        let image = image.ok_or_else(|| {
            TwinError::reasoning_unavailable("no camera frame available for the remote call")
        })?;
        let image_base64 = image.to_base64()?;
        let body = wire::build_request_body(context, &image_base64, &self.config.model);

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .timeout(timeout)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TwinError::reasoning_unavailable(format!(
                        "request timed out after {}ms",
                        timeout.as_millis()
                    ))
                } else {
                    TwinError::reasoning_unavailable(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TwinError::reasoning_unavailable(format!(
                "endpoint returned {status}"
            )));
        }

        let raw: Value = response
            .json()
            .map_err(|e| TwinError::reasoning_unavailable(format!("response is not JSON: {e}")))?;

        wire::parse_response(&raw)
    }
}
