//! Environmental drift simulation.
//!
//! One step moves every environment field toward its ambient target plus
//! bounded uniform noise, dries the soil, and waters any zone whose
//! effective valve state is open. The RNG is an explicit, seedable
//! source; given the same seed and start snapshot the produced sequences
//! are bit-identical.
//!
//! The simulator mutates nothing outside the snapshot it is given. In
//! particular it never touches the actuators; those belong to the
//! controller and the applier.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::DriftConfig;
use crate::state::Snapshot;

/// Mean-reverting update with bounded noise: `old + rate*(target - old) + noise`.
///
/// Clamping happens in the field setters, not here.
fn revert<R: Rng>(old: f64, target: f64, rate: f64, noise: f64, rng: &mut R) -> f64 {
    let jitter = if noise > 0.0 {
        rng.gen_range(-noise..=noise)
    } else {
        0.0
    };
    old + rate * (target - old) + jitter
}

/// Advances the snapshot by one drift step.
///
/// `now` stamps the snapshot (monotonically); pass `Utc::now()` in
/// production and a fixed time in tests.
pub fn drift_step<R: Rng>(snapshot: &mut Snapshot, config: &DriftConfig, now: DateTime<Utc>, rng: &mut R) {
    snapshot.touch(now);

    let rate = config.reversion_rate;
    let env = &mut snapshot.environment;
    env.set_temperature_c(revert(
        env.temperature_c(),
        config.temp_target,
        rate,
        config.temp_noise,
        rng,
    ));
    env.set_humidity_percent(revert(
        env.humidity_percent(),
        config.humidity_target,
        rate,
        config.humidity_noise,
        rng,
    ));
    env.set_co2_ppm(revert(
        env.co2_ppm(),
        config.co2_target,
        rate,
        config.co2_noise,
        rng,
    ));
    env.set_light_lux(revert(
        env.light_lux(),
        config.light_target,
        rate,
        config.light_noise,
        rng,
    ));

    let watering = snapshot.actuators.valve_open();
    for zone in &mut snapshot.zones {
        zone.set_soil_moisture(zone.soil_moisture() - config.soil_dry_rate);
        if watering {
            zone.set_soil_moisture(zone.soil_moisture() + config.soil_wet_gain);
        }
        zone.set_light_pct(revert(
            zone.light_pct(),
            config.zone_light_target,
            rate,
            config.zone_light_noise,
            rng,
        ));
    }
}
