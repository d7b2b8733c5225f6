//! Deterministic rule controller.
//!
//! The local policy maps the current snapshot to actuator setpoints:
//! proportional fan response above a comfort temperature, proportional
//! vent opening above a humidity setpoint, and a binary irrigation valve
//! driven by dry zones. Every rule is independent and evaluated every
//! tick. This is also the fallback policy whenever the reasoning agent
//! cannot be consulted.

use crate::config::ControllerConfig;
use crate::recommend::{ActuatorKind, Recommendation, RecommendationSet};
use crate::state::Snapshot;
use crate::zone::{ZoneId, ZoneStatus};

/// Computes this tick's actuator setpoints from the snapshot.
///
/// `alerts` is the precomputed spatial alert list for the same snapshot;
/// only its `dry` members influence the valve.
#[must_use]
pub fn decide(
    snapshot: &Snapshot,
    alerts: &[ZoneId],
    config: &ControllerConfig,
) -> RecommendationSet {
    let temp = snapshot.environment.temperature_c();
    let humidity = snapshot.environment.humidity_percent();

    let fan = ((temp - config.fan_comfort_c) / config.fan_full_span_c).clamp(0.0, 1.0);
    let vent = ((humidity - config.vent_open_pct) / config.vent_full_span_pct).clamp(0.0, 1.0);

    let dry_zones: Vec<ZoneId> = alerts
        .iter()
        .copied()
        .filter(|id| {
            snapshot
                .zone(*id)
                .is_some_and(|zone| zone.status == ZoneStatus::Dry)
        })
        .collect();
    let valve = if dry_zones.is_empty() { 0.0 } else { 1.0 };

    let valve_rationale = if dry_zones.is_empty() {
        "no dry zones; valve closed".to_string()
    } else {
        format!(
            "dry zones need irrigation: {}",
            dry_zones
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )
    };

    RecommendationSet {
        explanation: format!(
            "Rule policy at {temp:.1}C / {humidity:.0}% humidity: fan {fan:.2}, vent {vent:.2}, valve {valve:.0}."
        ),
        recommendations: vec![
            Recommendation::actuator(
                ActuatorKind::Fan,
                fan,
                format!("temperature {temp:.1}C against {:.1}C comfort point", config.fan_comfort_c),
            ),
            Recommendation::actuator(
                ActuatorKind::Vent,
                vent,
                format!("humidity {humidity:.0}% against {:.0}% setpoint", config.vent_open_pct),
            ),
            Recommendation::actuator(ActuatorKind::Valve, valve, valve_rationale),
        ],
    }
}
