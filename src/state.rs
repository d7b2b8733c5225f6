//! Canonical twin state: environment, zones, actuators.
//!
//! The `Snapshot` is the single canonical mutable aggregate. Every other
//! component reads or writes through it, and it is threaded explicitly
//! through the tick pipeline; there is no ambient global state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::zone::{Zone, ZoneId, ZONE_COUNT};

/// Declared range for greenhouse air temperature, degrees Celsius.
pub const TEMP_RANGE: (f64, f64) = (10.0, 40.0);
/// Declared range for relative humidity, percent.
pub const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);
/// Declared range for CO2 concentration, ppm.
pub const CO2_RANGE: (f64, f64) = (300.0, 2000.0);
/// Declared range for light intensity, lux.
pub const LIGHT_RANGE: (f64, f64) = (0.0, 50_000.0);

/// Shared air-volume sensor readings.
///
/// Mutated only by the drift simulator (and indirectly by fan/vent
/// effects folded into the drift targets). All writes clamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    temperature_c: f64,
    humidity_percent: f64,
    co2_ppm: f64,
    light_lux: f64,
}

impl Environment {
    /// Creates an environment with clamped readings.
    #[must_use]
    pub fn new(temperature_c: f64, humidity_percent: f64, co2_ppm: f64, light_lux: f64) -> Self {
        let mut env = Self {
            temperature_c: 0.0,
            humidity_percent: 0.0,
            co2_ppm: 0.0,
            light_lux: 0.0,
        };
        env.set_temperature_c(temperature_c);
        env.set_humidity_percent(humidity_percent);
        env.set_co2_ppm(co2_ppm);
        env.set_light_lux(light_lux);
        env
    }

    /// Air temperature in degrees Celsius.
    #[must_use]
    pub const fn temperature_c(&self) -> f64 {
        self.temperature_c
    }

    /// Relative humidity in percent.
    #[must_use]
    pub const fn humidity_percent(&self) -> f64 {
        self.humidity_percent
    }

    /// CO2 concentration in ppm.
    #[must_use]
    pub const fn co2_ppm(&self) -> f64 {
        self.co2_ppm
    }

    /// Light intensity in lux.
    #[must_use]
    pub const fn light_lux(&self) -> f64 {
        self.light_lux
    }

    /// Sets temperature, clamped to the declared range.
    pub fn set_temperature_c(&mut self, value: f64) {
        self.temperature_c = value.clamp(TEMP_RANGE.0, TEMP_RANGE.1);
    }

    /// Sets humidity, clamped to the declared range.
    pub fn set_humidity_percent(&mut self, value: f64) {
        self.humidity_percent = value.clamp(HUMIDITY_RANGE.0, HUMIDITY_RANGE.1);
    }

    /// Sets CO2, clamped to the declared range.
    pub fn set_co2_ppm(&mut self, value: f64) {
        self.co2_ppm = value.clamp(CO2_RANGE.0, CO2_RANGE.1);
    }

    /// Sets light, clamped to the declared range.
    pub fn set_light_lux(&mut self, value: f64) {
        self.light_lux = value.clamp(LIGHT_RANGE.0, LIGHT_RANGE.1);
    }

    /// Re-applies range clamps to every field.
    pub fn clamp_in_place(&mut self) {
        self.set_temperature_c(self.temperature_c);
        self.set_humidity_percent(self.humidity_percent);
        self.set_co2_ppm(self.co2_ppm);
        self.set_light_lux(self.light_lux);
    }
}

/// Actuator setpoints, each normalized to [0, 1].
///
/// Boolean on/off devices are the 0/1 special case. Mutated only by the
/// rule controller or accepted recommendations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actuators {
    fan: f64,
    vent: f64,
    valve: f64,
}

impl Actuators {
    /// Creates actuators with clamped setpoints.
    #[must_use]
    pub fn new(fan: f64, vent: f64, valve: f64) -> Self {
        Self {
            fan: fan.clamp(0.0, 1.0),
            vent: vent.clamp(0.0, 1.0),
            valve: valve.clamp(0.0, 1.0),
        }
    }

    /// All actuators off.
    #[must_use]
    pub const fn off() -> Self {
        Self {
            fan: 0.0,
            vent: 0.0,
            valve: 0.0,
        }
    }

    /// Fan power in [0, 1].
    #[must_use]
    pub const fn fan(&self) -> f64 {
        self.fan
    }

    /// Vent opening in [0, 1].
    #[must_use]
    pub const fn vent(&self) -> f64 {
        self.vent
    }

    /// Water valve flow in [0, 1].
    #[must_use]
    pub const fn valve(&self) -> f64 {
        self.valve
    }

    /// Sets fan power, clamped to [0, 1].
    pub fn set_fan(&mut self, value: f64) {
        self.fan = value.clamp(0.0, 1.0);
    }

    /// Sets vent opening, clamped to [0, 1].
    pub fn set_vent(&mut self, value: f64) {
        self.vent = value.clamp(0.0, 1.0);
    }

    /// Sets valve flow, clamped to [0, 1].
    pub fn set_valve(&mut self, value: f64) {
        self.valve = value.clamp(0.0, 1.0);
    }

    /// True if the water valve is open (any strictly positive flow).
    #[must_use]
    pub fn valve_open(&self) -> bool {
        self.valve > 0.0
    }

    /// Re-applies range clamps to every field.
    pub fn clamp_in_place(&mut self) {
        self.set_fan(self.fan);
        self.set_vent(self.vent);
        self.set_valve(self.valve);
    }
}

impl Default for Actuators {
    fn default() -> Self {
        Self::off()
    }
}

/// The canonical twin state for one instant.
///
/// Zones are kept in canonical bed-major order (bed 1-8 x A,B,C); the
/// state store rejects files that violate that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When this snapshot was last advanced (UTC, monotonic).
    pub timestamp: DateTime<Utc>,
    /// Shared sensor readings.
    pub environment: Environment,
    /// All 24 zones in canonical order.
    pub zones: Vec<Zone>,
    /// Actuator setpoints.
    pub actuators: Actuators,
}

impl Snapshot {
    /// The built-in template snapshot: calm mid-range greenhouse with 24
    /// lettuce zones. Used by `reset` when no template file is given.
    #[must_use]
    pub fn template() -> Self {
        let zones = ZoneId::all()
            .map(|id| Zone::new(id, "lettuce", 0.5, 70.0, 12.0, 0.9))
            .collect();
        Self {
            timestamp: DateTime::UNIX_EPOCH,
            environment: Environment::new(22.0, 55.0, 420.0, 8000.0),
            zones,
            actuators: Actuators::off(),
        }
    }

    /// Looks up a zone by id.
    #[must_use]
    pub fn zone(&self, id: ZoneId) -> Option<&Zone> {
        self.zones.get(id.index()).filter(|z| z.id == id)
    }

    /// Looks up a zone by id, mutably.
    pub fn zone_mut(&mut self, id: ZoneId) -> Option<&mut Zone> {
        self.zones.get_mut(id.index()).filter(|z| z.id == id)
    }

    /// Advances the timestamp to `now`, never moving backward.
    ///
    /// Wall clocks can step backward (NTP); the snapshot timestamp must
    /// not, so a non-advancing clock still yields a strictly later stamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        let min_next = self.timestamp + Duration::microseconds(1);
        self.timestamp = std::cmp::max(now, min_next);
    }

    /// Re-applies range clamps to every numeric field in the snapshot.
    pub fn clamp_in_place(&mut self) {
        self.environment.clamp_in_place();
        self.actuators.clamp_in_place();
        for zone in &mut self.zones {
            zone.clamp_in_place();
        }
    }

    /// True if zones are exactly the canonical 24 in bed-major order.
    #[must_use]
    pub fn zones_in_canonical_order(&self) -> bool {
        self.zones.len() == ZONE_COUNT
            && self.zones.iter().zip(ZoneId::all()).all(|(z, id)| z.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::ZoneStatus;

    #[test]
    fn test_environment_clamps_on_write() {
        let mut env = Environment::new(100.0, -10.0, 0.0, 1e9);
        assert_eq!(env.temperature_c(), 40.0);
        assert_eq!(env.humidity_percent(), 0.0);
        assert_eq!(env.co2_ppm(), 300.0);
        assert_eq!(env.light_lux(), 50_000.0);

        env.set_temperature_c(5.0);
        assert_eq!(env.temperature_c(), 10.0);
    }

    #[test]
    fn test_actuators_clamp_and_valve_open() {
        let mut act = Actuators::new(2.0, -1.0, 0.0);
        assert_eq!(act.fan(), 1.0);
        assert_eq!(act.vent(), 0.0);
        assert!(!act.valve_open());

        act.set_valve(0.3);
        assert!(act.valve_open());
    }

    #[test]
    fn test_template_shape() {
        let snapshot = Snapshot::template();
        assert!(snapshot.zones_in_canonical_order());
        assert_eq!(snapshot.environment.temperature_c(), 22.0);
        assert_eq!(snapshot.actuators.fan(), 0.0);
        assert!(snapshot.zones.iter().all(|z| z.status == ZoneStatus::Ok));
    }

    #[test]
    fn test_zone_lookup_by_id() {
        let mut snapshot = Snapshot::template();
        let id = crate::zone::ZoneId::parse("B03-C").unwrap();
        assert!(snapshot.zone(id).is_some());
        snapshot.zone_mut(id).unwrap().set_soil_moisture(0.22);
        assert_eq!(snapshot.zone(id).unwrap().soil_moisture(), 0.22);
    }

    #[test]
    fn test_touch_is_monotonic() {
        let mut snapshot = Snapshot::template();
        let t1 = Utc::now();
        snapshot.touch(t1);
        let stamped = snapshot.timestamp;
        assert!(stamped >= t1);

        // A clock that went backward still advances the stamp.
        snapshot.touch(t1 - chrono::Duration::hours(1));
        assert!(snapshot.timestamp > stamped);
    }

    #[test]
    fn test_snapshot_serde_round_trip() {
        let snapshot = Snapshot::template();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }
}
