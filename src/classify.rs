//! Zone classification and the spatial alert list.
//!
//! Classification is a pure threshold function over a zone's numeric
//! readings, evaluated in a fixed priority order: dry > wet > shaded >
//! stressed > ok. Exactly one status results; the first matching rule
//! wins.

use crate::config::ClassifierConfig;
use crate::state::Snapshot;
use crate::zone::{Zone, ZoneId, ZoneStatus};

/// Derives the status for one zone from its numeric readings.
#[must_use]
pub fn classify(zone: &Zone, config: &ClassifierConfig) -> ZoneStatus {
    if zone.soil_moisture() < config.dry_below {
        ZoneStatus::Dry
    } else if zone.soil_moisture() > config.wet_above {
        ZoneStatus::Wet
    } else if zone.light_pct() < config.shaded_below {
        ZoneStatus::Shaded
    } else if zone.health_score() < config.stressed_below {
        ZoneStatus::Stressed
    } else {
        ZoneStatus::Ok
    }
}

/// Reclassifies every zone in place.
///
/// This also repairs any status an operator override left out of sync
/// with the numeric readings.
pub fn classify_all(snapshot: &mut Snapshot, config: &ClassifierConfig) {
    for zone in &mut snapshot.zones {
        zone.status = classify(zone, config);
    }
}

/// Zone ids whose status is not `ok`, in ascending zone-id order.
///
/// Zones are stored in canonical order, so a single pass preserves it.
#[must_use]
pub fn spatial_alerts(snapshot: &Snapshot) -> Vec<ZoneId> {
    snapshot
        .zones
        .iter()
        .filter(|zone| !zone.status.is_ok())
        .map(|zone| zone.id)
        .collect()
}
