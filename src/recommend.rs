//! Recommendations: proposed actuator and zone changes with rationale.
//!
//! A recommendation set is produced once per tick (by the rule
//! controller or a reasoning agent) and consumed at most once by the
//! actuation applier. Targets stay textual until apply time so that a
//! remote agent naming a nonexistent device skips that one entry instead
//! of invalidating the whole set.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TwinError;
use crate::zone::{ZoneId, ZoneStatus};

/// The three controllable devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorKind {
    /// Circulation fan, power 0-1.
    Fan,
    /// Roof vent, opening 0-1.
    Vent,
    /// Irrigation valve, flow 0-1.
    Valve,
}

impl ActuatorKind {
    /// The wire name of this actuator.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fan => "fan",
            Self::Vent => "vent",
            Self::Valve => "valve",
        }
    }

    /// Parses a wire name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "fan" => Some(Self::Fan),
            "vent" => Some(Self::Vent),
            "valve" => Some(Self::Valve),
            _ => None,
        }
    }
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A resolved recommendation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// One of the named actuators.
    Actuator(ActuatorKind),
    /// A spatial zone.
    Zone(ZoneId),
}

impl Target {
    /// Resolves a textual target into an actuator or zone.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::UnknownTarget` if the string is neither an
    /// actuator name nor a valid zone id.
    pub fn resolve(raw: &str) -> Result<Self, TwinError> {
        if let Some(kind) = ActuatorKind::parse(raw) {
            return Ok(Self::Actuator(kind));
        }
        ZoneId::parse(raw).map(Self::Zone).map_err(|_| TwinError::UnknownTarget {
            target: raw.to_string(),
        })
    }
}

/// The proposed value of a recommendation.
///
/// Actuator targets take a numeric level; zone targets take a status
/// override. On the wire this is a bare number or a status string.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProposedValue {
    /// Numeric setpoint for an actuator.
    Level(f64),
    /// Status override for a zone.
    Status(ZoneStatus),
}

/// One proposed change: target, value, and a human-readable rationale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Actuator name or zone id.
    pub target: String,
    /// Proposed value.
    pub value: ProposedValue,
    /// Why the agent proposes it.
    pub rationale: String,
}

impl Recommendation {
    /// A recommendation that sets an actuator level.
    #[must_use]
    pub fn actuator(kind: ActuatorKind, level: f64, rationale: impl Into<String>) -> Self {
        Self {
            target: kind.name().to_string(),
            value: ProposedValue::Level(level),
            rationale: rationale.into(),
        }
    }

    /// A recommendation that overrides a zone's status.
    #[must_use]
    pub fn zone(id: ZoneId, status: ZoneStatus, rationale: impl Into<String>) -> Self {
        Self {
            target: id.to_string(),
            value: ProposedValue::Status(status),
            rationale: rationale.into(),
        }
    }

    /// Resolves the textual target.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::UnknownTarget` for unresolvable targets.
    pub fn resolve_target(&self) -> Result<Target, TwinError> {
        Target::resolve(&self.target)
    }
}

/// An ordered set of recommendations plus an overall explanation.
///
/// When several entries target the same actuator, the last one in list
/// order wins; the applier walks the list front to back and every write
/// is absolute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationSet {
    /// Overall explanation for this tick's decision.
    pub explanation: String,
    /// Ordered proposed changes.
    pub recommendations: Vec<Recommendation>,
}

impl RecommendationSet {
    /// An empty set with the given explanation.
    #[must_use]
    pub fn empty(explanation: impl Into<String>) -> Self {
        Self {
            explanation: explanation.into(),
            recommendations: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actuator_kind_round_trip() {
        for kind in [ActuatorKind::Fan, ActuatorKind::Vent, ActuatorKind::Valve] {
            assert_eq!(ActuatorKind::parse(kind.name()), Some(kind));
        }
        assert_eq!(ActuatorKind::parse("heater"), None);
    }

    #[test]
    fn test_target_resolve() {
        assert_eq!(
            Target::resolve("fan").unwrap(),
            Target::Actuator(ActuatorKind::Fan)
        );
        assert_eq!(
            Target::resolve("B03-C").unwrap(),
            Target::Zone(ZoneId::parse("B03-C").unwrap())
        );
        let err = Target::resolve("heater").unwrap_err();
        assert!(matches!(err, TwinError::UnknownTarget { .. }));
    }

    #[test]
    fn test_recommendation_wire_shape() {
        let rec = Recommendation::actuator(ActuatorKind::Valve, 1.0, "zone B03-C is dry");
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["target"], "valve");
        assert_eq!(json["value"], 1.0);

        let zone_rec = Recommendation::zone(
            ZoneId::parse("B03-C").unwrap(),
            ZoneStatus::Dry,
            "visible wilt",
        );
        let json = serde_json::to_value(&zone_rec).unwrap();
        assert_eq!(json["target"], "B03-C");
        assert_eq!(json["value"], "dry");
    }

    #[test]
    fn test_proposed_value_untagged_parse() {
        let level: ProposedValue = serde_json::from_str("0.7").unwrap();
        assert_eq!(level, ProposedValue::Level(0.7));

        let status: ProposedValue = serde_json::from_str("\"shaded\"").unwrap();
        assert_eq!(status, ProposedValue::Status(ZoneStatus::Shaded));

        assert!(serde_json::from_str::<ProposedValue>("\"blue\"").is_err());
    }

    #[test]
    fn test_set_round_trip() {
        let set = RecommendationSet {
            explanation: "all nominal".to_string(),
            recommendations: vec![
                Recommendation::actuator(ActuatorKind::Fan, 0.0, "cool"),
                Recommendation::actuator(ActuatorKind::Valve, 1.0, "dry zones"),
            ],
        };
        let json = serde_json::to_string(&set).unwrap();
        let back: RecommendationSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }
}
