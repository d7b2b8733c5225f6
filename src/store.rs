//! State store: durable load/save/reset of the canonical snapshot.
//!
//! Loading is strict about structure (missing fields, zone count and
//! order) and lenient about values (out-of-range numerics are clamped,
//! never rejected and never persisted unclamped). Saving is atomic:
//! write to a temp file in the same directory, fsync, rename.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::engine::TickStage;
use crate::error::{SchemaError, TwinError, TwinResult};
use crate::state::Snapshot;
use crate::zone::{ZoneId, ZONE_COUNT};

/// Top-level keys every persisted state file must carry.
const REQUIRED_KEYS: [&str; 4] = ["timestamp", "environment", "zones", "actuators"];

/// Loads and validates a snapshot from a JSON state file.
///
/// # Errors
///
/// - `TwinError::Persistence` if the file cannot be read.
/// - `TwinError::Schema` if required fields are missing, the JSON is
///   malformed, or the zones are not the canonical 24 in bed-major
///   order. Out-of-range values are clamped, not rejected.
pub fn load(path: &Path) -> TwinResult<Snapshot> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| TwinError::persistence(TickStage::Idle, path, e))?;

    let value: Value = serde_json::from_str(&raw).map_err(|e| SchemaError::MalformedJson {
        reason: e.to_string(),
    })?;

    let object = value.as_object().ok_or_else(|| SchemaError::MalformedJson {
        reason: "top level is not a JSON object".to_string(),
    })?;
    for key in REQUIRED_KEYS {
        if !object.contains_key(key) {
            return Err(SchemaError::MissingField {
                field: key.to_string(),
            }
            .into());
        }
    }

    let mut snapshot: Snapshot =
        serde_json::from_value(value).map_err(|e| SchemaError::MalformedJson {
            reason: e.to_string(),
        })?;

    validate_zone_order(&snapshot)?;
    snapshot.clamp_in_place();
    Ok(snapshot)
}

/// Saves a snapshot atomically (temp file + rename).
///
/// `stage` is the tick stage to blame in persistence errors; pass
/// `TickStage::Idle` outside a tick.
///
/// # Errors
///
/// - `TwinError::Schema` if any numeric field is non-finite (nothing is
///   written in that case).
/// - `TwinError::Persistence` on any I/O failure; the previously
///   persisted file is left intact.
pub fn save(snapshot: &Snapshot, path: &Path, stage: TickStage) -> TwinResult<()> {
    validate_finite(snapshot)?;

    let mut body = serde_json::to_string_pretty(snapshot).map_err(|e| {
        SchemaError::MalformedJson {
            reason: format!("serialization failed: {e}"),
        }
    })?;
    body.push('\n');

    let tmp_path = path.with_extension("json.tmp");
    let persist = |e| TwinError::persistence(stage, path, e);

    {
        let mut file = File::create(&tmp_path).map_err(persist)?;
        file.write_all(body.as_bytes()).map_err(persist)?;
        file.sync_all().map_err(persist)?;
    }
    std::fs::rename(&tmp_path, path).map_err(persist)?;
    Ok(())
}

/// Overwrites the live state with the template, discarding simulation
/// continuity. The history log is untouched; it is an audit trail
/// independent of live state.
///
/// With no template path the built-in `Snapshot::template()` is used.
///
/// # Errors
///
/// Propagates template load errors and live-state save errors.
pub fn reset(live_path: &Path, template_path: Option<&Path>) -> TwinResult<Snapshot> {
    let snapshot = match template_path {
        Some(path) => load(path)?,
        None => Snapshot::template(),
    };
    save(&snapshot, live_path, TickStage::Idle)?;
    Ok(snapshot)
}

fn validate_zone_order(snapshot: &Snapshot) -> Result<(), SchemaError> {
    if snapshot.zones.len() != ZONE_COUNT {
        return Err(SchemaError::WrongZoneCount {
            expected: ZONE_COUNT,
            actual: snapshot.zones.len(),
        });
    }
    for (index, (zone, expected)) in snapshot.zones.iter().zip(ZoneId::all()).enumerate() {
        if zone.id != expected {
            return Err(SchemaError::ZoneOutOfOrder {
                index,
                expected: expected.to_string(),
                actual: zone.id.to_string(),
            });
        }
    }
    Ok(())
}

fn validate_finite(snapshot: &Snapshot) -> Result<(), SchemaError> {
    let env = &snapshot.environment;
    let act = &snapshot.actuators;
    let fields = [
        ("environment.temperature_c", env.temperature_c()),
        ("environment.humidity_percent", env.humidity_percent()),
        ("environment.co2_ppm", env.co2_ppm()),
        ("environment.light_lux", env.light_lux()),
        ("actuators.fan", act.fan()),
        ("actuators.vent", act.vent()),
        ("actuators.valve", act.valve()),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(SchemaError::NonFiniteNumber {
                field: field.to_string(),
            });
        }
    }
    for zone in &snapshot.zones {
        let per_zone = [
            ("soil_moisture", zone.soil_moisture()),
            ("light_pct", zone.light_pct()),
            ("plant_height_cm", zone.plant_height_cm()),
            ("health_score", zone.health_score()),
        ];
        for (field, value) in per_zone {
            if !value.is_finite() {
                return Err(SchemaError::NonFiniteNumber {
                    field: format!("zones[{}].{field}", zone.id),
                });
            }
        }
    }
    Ok(())
}
