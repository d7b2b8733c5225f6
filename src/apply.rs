//! Actuation applier: commits a recommendation set into the snapshot.
//!
//! Actuator targets are overwritten with the clamped proposed value.
//! Zone targets get their status set directly (an operator/agent
//! override) and are mapped to a visual material class via a fixed
//! table. Unknown or ill-typed targets are skipped; the rest of the set
//! still applies, and the returned record notes what happened.
//!
//! Every write is absolute, so applying the same set twice yields an
//! identical snapshot.

use serde::{Deserialize, Serialize};

use crate::recommend::{ActuatorKind, ProposedValue, RecommendationSet, Target};
use crate::state::Snapshot;
use crate::zone::{ZoneId, ZoneStatus};

/// Visual material class for a zone's plants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialClass {
    /// Green, healthy plant material.
    Healthy,
    /// Brownish material signalling a problem zone.
    Unhealthy,
}

impl MaterialClass {
    /// The fixed status -> material table: only `ok` renders healthy.
    #[must_use]
    pub const fn for_status(status: ZoneStatus) -> Self {
        match status {
            ZoneStatus::Ok => Self::Healthy,
            ZoneStatus::Dry | ZoneStatus::Wet | ZoneStatus::Shaded | ZoneStatus::Stressed => {
                Self::Unhealthy
            }
        }
    }
}

/// One committed actuator write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorWrite {
    /// Wire name of the actuator.
    pub actuator: String,
    /// The stored (clamped) value, which may differ from the proposal.
    pub value: f64,
}

/// One committed zone status override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneOverride {
    /// The zone that was overridden.
    pub zone: ZoneId,
    /// The status that was set.
    pub status: ZoneStatus,
    /// The material class derived from the status.
    pub material: MaterialClass,
}

/// One skipped recommendation and why it was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecommendation {
    /// The offending target string.
    pub target: String,
    /// Human-readable skip reason.
    pub reason: String,
}

/// A zone rendered with the unhealthy material this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneMaterial {
    /// The affected zone.
    pub zone: ZoneId,
    /// Its status after actuation.
    pub status: ZoneStatus,
    /// The material class derived from the status.
    pub material: MaterialClass,
}

/// What the applier did with one recommendation set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActuationRecord {
    /// Actuator writes, in application order.
    pub actuator_writes: Vec<ActuatorWrite>,
    /// Zone status overrides, in application order.
    pub zone_overrides: Vec<ZoneOverride>,
    /// Zones carrying the unhealthy material after this pass.
    pub unhealthy_zones: Vec<ZoneMaterial>,
    /// Recommendations that were skipped.
    pub skipped: Vec<SkippedRecommendation>,
}

impl ActuationRecord {
    /// True if nothing was skipped.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Applies a recommendation set to the snapshot.
///
/// Entries apply in list order; for duplicate targets the last write
/// wins. Unknown targets and type mismatches are skipped and recorded,
/// never fatal.
pub fn apply(snapshot: &mut Snapshot, set: &RecommendationSet) -> ActuationRecord {
    let mut record = ActuationRecord::default();

    for rec in &set.recommendations {
        let target = match rec.resolve_target() {
            Ok(target) => target,
            Err(err) => {
                record.skipped.push(SkippedRecommendation {
                    target: rec.target.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        match (target, rec.value) {
            (Target::Actuator(kind), ProposedValue::Level(level)) => {
                let actuators = &mut snapshot.actuators;
                let stored = match kind {
                    ActuatorKind::Fan => {
                        actuators.set_fan(level);
                        actuators.fan()
                    }
                    ActuatorKind::Vent => {
                        actuators.set_vent(level);
                        actuators.vent()
                    }
                    ActuatorKind::Valve => {
                        actuators.set_valve(level);
                        actuators.valve()
                    }
                };
                record.actuator_writes.push(ActuatorWrite {
                    actuator: kind.name().to_string(),
                    value: stored,
                });
            }
            (Target::Zone(id), ProposedValue::Status(status)) => {
                match snapshot.zone_mut(id) {
                    Some(zone) => {
                        zone.status = status;
                        record.zone_overrides.push(ZoneOverride {
                            zone: id,
                            status,
                            material: MaterialClass::for_status(status),
                        });
                    }
                    None => record.skipped.push(SkippedRecommendation {
                        target: rec.target.clone(),
                        reason: format!("zone {id} not present in snapshot"),
                    }),
                }
            }
            (Target::Actuator(kind), ProposedValue::Status(status)) => {
                record.skipped.push(SkippedRecommendation {
                    target: rec.target.clone(),
                    reason: format!("actuator {kind} cannot take status '{status}'"),
                });
            }
            (Target::Zone(id), ProposedValue::Level(level)) => {
                record.skipped.push(SkippedRecommendation {
                    target: rec.target.clone(),
                    reason: format!("zone {id} cannot take numeric level {level}"),
                });
            }
        }
    }

    // Visual feedback pass: every zone whose status is not ok renders
    // with the unhealthy material this tick.
    for zone in &snapshot.zones {
        let material = MaterialClass::for_status(zone.status);
        if material == MaterialClass::Unhealthy {
            record.unhealthy_zones.push(ZoneMaterial {
                zone: zone.id,
                status: zone.status,
                material,
            });
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommend::{ActuatorKind, Recommendation};

    #[test]
    fn test_material_table() {
        assert_eq!(MaterialClass::for_status(ZoneStatus::Ok), MaterialClass::Healthy);
        for status in [
            ZoneStatus::Dry,
            ZoneStatus::Wet,
            ZoneStatus::Shaded,
            ZoneStatus::Stressed,
        ] {
            assert_eq!(MaterialClass::for_status(status), MaterialClass::Unhealthy);
        }
    }

    #[test]
    fn test_apply_actuators_clamped() {
        let mut snapshot = Snapshot::template();
        let set = RecommendationSet {
            explanation: String::new(),
            recommendations: vec![
                Recommendation::actuator(ActuatorKind::Fan, 1.8, "hot"),
                Recommendation::actuator(ActuatorKind::Valve, -0.5, "off"),
            ],
        };

        let record = apply(&mut snapshot, &set);
        assert_eq!(snapshot.actuators.fan(), 1.0);
        assert_eq!(snapshot.actuators.valve(), 0.0);
        // The record carries the stored values, not the proposals.
        assert_eq!(record.actuator_writes[0].value, 1.0);
        assert_eq!(record.actuator_writes[1].value, 0.0);
        assert!(record.is_clean());
    }

    #[test]
    fn test_apply_zone_override_and_material() {
        let mut snapshot = Snapshot::template();
        let id = ZoneId::parse("B03-C").unwrap();
        let set = RecommendationSet {
            explanation: String::new(),
            recommendations: vec![Recommendation::zone(id, ZoneStatus::Dry, "visible wilt")],
        };

        let record = apply(&mut snapshot, &set);
        assert_eq!(snapshot.zone(id).unwrap().status, ZoneStatus::Dry);
        assert_eq!(
            record.zone_overrides,
            vec![ZoneOverride {
                zone: id,
                status: ZoneStatus::Dry,
                material: MaterialClass::Unhealthy,
            }]
        );
        // The visual pass notes the same zone as unhealthy.
        assert_eq!(
            record.unhealthy_zones,
            vec![ZoneMaterial {
                zone: id,
                status: ZoneStatus::Dry,
                material: MaterialClass::Unhealthy,
            }]
        );
    }

    #[test]
    fn test_unknown_target_skipped_rest_applied() {
        let mut snapshot = Snapshot::template();
        let set = RecommendationSet {
            explanation: String::new(),
            recommendations: vec![
                Recommendation {
                    target: "heater".to_string(),
                    value: ProposedValue::Level(1.0),
                    rationale: "cold".to_string(),
                },
                Recommendation::actuator(ActuatorKind::Fan, 0.6, "warm"),
            ],
        };

        let record = apply(&mut snapshot, &set);
        assert_eq!(record.skipped.len(), 1);
        assert_eq!(record.skipped[0].target, "heater");
        assert_eq!(snapshot.actuators.fan(), 0.6);
    }

    #[test]
    fn test_type_mismatches_are_skipped() {
        let mut snapshot = Snapshot::template();
        let id = ZoneId::parse("B01-A").unwrap();
        let set = RecommendationSet {
            explanation: String::new(),
            recommendations: vec![
                Recommendation {
                    target: "fan".to_string(),
                    value: ProposedValue::Status(ZoneStatus::Dry),
                    rationale: String::new(),
                },
                Recommendation {
                    target: id.to_string(),
                    value: ProposedValue::Level(0.5),
                    rationale: String::new(),
                },
            ],
        };

        let record = apply(&mut snapshot, &set);
        assert_eq!(record.skipped.len(), 2);
        assert_eq!(snapshot, Snapshot::template());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut snapshot = Snapshot::template();
        let set = RecommendationSet {
            explanation: String::new(),
            recommendations: vec![
                Recommendation::actuator(ActuatorKind::Fan, 0.7, "hot"),
                Recommendation::actuator(ActuatorKind::Vent, 0.4, "humid"),
                Recommendation::zone(ZoneId::parse("B05-A").unwrap(), ZoneStatus::Shaded, "dark"),
            ],
        };

        let first_record = apply(&mut snapshot, &set);
        let once = snapshot.clone();
        let second_record = apply(&mut snapshot, &set);
        assert_eq!(snapshot, once);
        assert_eq!(first_record, second_record);
    }

    #[test]
    fn test_duplicate_targets_last_one_wins() {
        let mut snapshot = Snapshot::template();
        let set = RecommendationSet {
            explanation: String::new(),
            recommendations: vec![
                Recommendation::actuator(ActuatorKind::Fan, 0.2, "first"),
                Recommendation::actuator(ActuatorKind::Fan, 0.9, "second"),
            ],
        };

        apply(&mut snapshot, &set);
        assert_eq!(snapshot.actuators.fan(), 0.9);
    }
}
