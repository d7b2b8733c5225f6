//! Local rule agent: the always-available fallback policy.

use std::time::Duration;

use crate::config::ControllerConfig;
use crate::controller;
use crate::error::TwinResult;
use crate::recommend::RecommendationSet;

use super::{ImageRef, ReasoningAgent, ReasoningContext};

/// Wraps the deterministic rule controller behind the agent interface.
///
/// Never fails; its explanation is templated from the spatial alert
/// list so the history record reads the same way a remote explanation
/// would.
#[derive(Debug, Clone, Default)]
pub struct LocalRuleAgent {
    config: ControllerConfig,
}

impl LocalRuleAgent {
    /// Creates a local agent with the given controller setpoints.
    #[must_use]
    pub const fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    fn explain(context: &ReasoningContext) -> String {
        if context.alerts.is_empty() {
            return "All zones appear nominal; no alerts from telemetry.".to_string();
        }
        let sentences: Vec<String> = context
            .alerts
            .iter()
            .filter_map(|id| {
                context
                    .zones
                    .iter()
                    .find(|zone| zone.id == *id)
                    .map(|zone| format!("Zone {id} appears {} based on telemetry.", zone.status))
            })
            .collect();
        sentences.join(" ")
    }
}

impl ReasoningAgent for LocalRuleAgent {
    fn decide(
        &self,
        _image: Option<&ImageRef>,
        context: &ReasoningContext,
        _timeout: Duration,
    ) -> TwinResult<RecommendationSet> {
        let snapshot = context.to_snapshot();
        let mut set = controller::decide(&snapshot, &context.alerts, &self.config);
        set.explanation = format!("{} {}", Self::explain(context), set.explanation);
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify_all, spatial_alerts};
    use crate::config::ClassifierConfig;
    use crate::state::Snapshot;
    use crate::zone::ZoneId;

    fn context_with_dry_zone() -> ReasoningContext {
        let mut snapshot = Snapshot::template();
        snapshot
            .zone_mut(ZoneId::parse("B03-C").unwrap())
            .unwrap()
            .set_soil_moisture(0.22);
        classify_all(&mut snapshot, &ClassifierConfig::default());
        let alerts = spatial_alerts(&snapshot);
        ReasoningContext::from_snapshot(&snapshot, &alerts)
    }

    #[test]
    fn test_local_agent_always_succeeds() {
        let agent = LocalRuleAgent::default();
        let ctx = context_with_dry_zone();
        let set = agent.decide(None, &ctx, Duration::from_secs(1)).unwrap();
        assert_eq!(set.recommendations.len(), 3);
    }

    #[test]
    fn test_explanation_templated_from_alerts() {
        let agent = LocalRuleAgent::default();
        let ctx = context_with_dry_zone();
        let set = agent.decide(None, &ctx, Duration::from_secs(1)).unwrap();
        assert!(set.explanation.contains("Zone B03-C appears dry based on telemetry."));
    }

    #[test]
    fn test_explanation_when_nominal() {
        let agent = LocalRuleAgent::default();
        let ctx = ReasoningContext::from_snapshot(&Snapshot::template(), &[]);
        let set = agent.decide(None, &ctx, Duration::from_secs(1)).unwrap();
        assert!(set.explanation.contains("nominal"));
    }

    #[test]
    fn test_matches_bare_controller_output() {
        let agent = LocalRuleAgent::default();
        let ctx = context_with_dry_zone();
        let set = agent.decide(None, &ctx, Duration::from_secs(1)).unwrap();

        let direct = crate::controller::decide(
            &ctx.to_snapshot(),
            &ctx.alerts,
            &ControllerConfig::default(),
        );
        assert_eq!(set.recommendations, direct.recommendations);
    }
}
