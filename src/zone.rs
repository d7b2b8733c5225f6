//! Zone identity, telemetry, and derived status.
//!
//! The greenhouse floor is 8 planting beds, each subdivided into three
//! sub-zones (A=north, B=center, C=south), for 24 zones total. A zone is
//! the unit of spatial reasoning: it carries its own telemetry and a
//! status derived from it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Number of planting beds.
pub const BED_COUNT: u8 = 8;

/// Number of zones in the greenhouse (beds x sub-zones).
pub const ZONE_COUNT: usize = (BED_COUNT as usize) * 3;

/// Sub-zone position within a bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SubZone {
    /// North end of the bed.
    A,
    /// Center of the bed.
    B,
    /// South end of the bed.
    C,
}

impl SubZone {
    /// All sub-zones in canonical order.
    pub const ALL: [Self; 3] = [Self::A, Self::B, Self::C];

    /// The sub-zone letter.
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }
}

/// Stable zone identifier: bed number (1-8) plus sub-zone letter.
///
/// The textual form is `B<bed 01-08>-<A|B|C>`, e.g. `B03-C`. Ordering is
/// bed-major, so iterating sorted zone ids walks bed 1 A,B,C then bed 2
/// A,B,C and so on.
///
/// # Examples
///
/// ```
/// use greentwin::ZoneId;
///
/// let id = ZoneId::parse("B03-C").unwrap();
/// assert_eq!(id.bed(), 3);
/// assert_eq!(id.to_string(), "B03-C");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ZoneId {
    bed: u8,
    sub: SubZone,
}

impl ZoneId {
    /// Creates a zone id from a bed number and sub-zone.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidZoneId` if `bed` is outside 1-8.
    pub fn new(bed: u8, sub: SubZone) -> Result<Self, SchemaError> {
        if bed == 0 || bed > BED_COUNT {
            return Err(SchemaError::InvalidZoneId {
                raw: format!("B{bed:02}-{}", sub.letter()),
            });
        }
        Ok(Self { bed, sub })
    }

    /// Parses the textual `B<bed>-<sub>` form.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidZoneId` on any deviation from the
    /// `B<01-08>-<A|B|C>` shape.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let invalid = || SchemaError::InvalidZoneId { raw: raw.to_string() };

        let rest = raw.strip_prefix('B').ok_or_else(invalid)?;
        let (digits, sub) = rest.split_once('-').ok_or_else(invalid)?;
        if digits.len() != 2 {
            return Err(invalid());
        }
        let bed: u8 = digits.parse().map_err(|_| invalid())?;
        let sub = match sub {
            "A" => SubZone::A,
            "B" => SubZone::B,
            "C" => SubZone::C,
            _ => return Err(invalid()),
        };
        Self::new(bed, sub).map_err(|_| invalid())
    }

    /// The bed number (1-8).
    #[must_use]
    pub const fn bed(self) -> u8 {
        self.bed
    }

    /// The sub-zone within the bed.
    #[must_use]
    pub const fn sub(self) -> SubZone {
        self.sub
    }

    /// Position of this zone in the canonical bed-major order (0-23).
    #[must_use]
    pub fn index(self) -> usize {
        (self.bed as usize - 1) * 3
            + SubZone::ALL.iter().position(|s| *s == self.sub).unwrap_or(0)
    }

    /// All 24 zone ids in canonical order.
    pub fn all() -> impl Iterator<Item = Self> {
        (1..=BED_COUNT)
            .flat_map(|bed| SubZone::ALL.into_iter().map(move |sub| Self { bed, sub }))
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{:02}-{}", self.bed, self.sub.letter())
    }
}

impl Serialize for ZoneId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ZoneId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Discrete zone condition derived from its numeric readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneStatus {
    /// All readings within nominal bands.
    Ok,
    /// Soil moisture below the dry threshold.
    Dry,
    /// Soil moisture above the saturation threshold.
    Wet,
    /// Light below the shade threshold.
    Shaded,
    /// Health score below the stress threshold.
    Stressed,
}

impl ZoneStatus {
    /// Parses the snake_case textual form.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::UnknownStatus` for any other string.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        match raw {
            "ok" => Ok(Self::Ok),
            "dry" => Ok(Self::Dry),
            "wet" => Ok(Self::Wet),
            "shaded" => Ok(Self::Shaded),
            "stressed" => Ok(Self::Stressed),
            _ => Err(SchemaError::UnknownStatus { raw: raw.to_string() }),
        }
    }

    /// Returns true if the zone needs no attention.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "ok",
            Self::Dry => "dry",
            Self::Wet => "wet",
            Self::Shaded => "shaded",
            Self::Stressed => "stressed",
        };
        write!(f, "{s}")
    }
}

/// One spatial zone with its telemetry and derived status.
///
/// Numeric fields are clamped to their declared ranges on every write;
/// the clamped value is what is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    /// Zone identifier.
    pub id: ZoneId,
    /// Crop planted in this zone.
    pub crop: String,
    soil_moisture: f64,
    light_pct: f64,
    plant_height_cm: f64,
    health_score: f64,
    /// Derived condition; rewritten by classification every tick.
    pub status: ZoneStatus,
}

impl Zone {
    /// Creates a zone with clamped readings and `Ok` status.
    #[must_use]
    pub fn new(
        id: ZoneId,
        crop: impl Into<String>,
        soil_moisture: f64,
        light_pct: f64,
        plant_height_cm: f64,
        health_score: f64,
    ) -> Self {
        let mut zone = Self {
            id,
            crop: crop.into(),
            soil_moisture: 0.0,
            light_pct: 0.0,
            plant_height_cm: 0.0,
            health_score: 0.0,
            status: ZoneStatus::Ok,
        };
        zone.set_soil_moisture(soil_moisture);
        zone.set_light_pct(light_pct);
        zone.set_plant_height_cm(plant_height_cm);
        zone.set_health_score(health_score);
        zone
    }

    /// Soil moisture fraction in [0, 1].
    #[must_use]
    pub const fn soil_moisture(&self) -> f64 {
        self.soil_moisture
    }

    /// Light level in [0, 100] percent.
    #[must_use]
    pub const fn light_pct(&self) -> f64 {
        self.light_pct
    }

    /// Plant height in centimeters, >= 0.
    #[must_use]
    pub const fn plant_height_cm(&self) -> f64 {
        self.plant_height_cm
    }

    /// Health score in [0, 1].
    #[must_use]
    pub const fn health_score(&self) -> f64 {
        self.health_score
    }

    /// Sets soil moisture, clamped to [0, 1].
    pub fn set_soil_moisture(&mut self, value: f64) {
        self.soil_moisture = value.clamp(0.0, 1.0);
    }

    /// Sets light percentage, clamped to [0, 100].
    pub fn set_light_pct(&mut self, value: f64) {
        self.light_pct = value.clamp(0.0, 100.0);
    }

    /// Sets plant height, clamped to >= 0.
    pub fn set_plant_height_cm(&mut self, value: f64) {
        self.plant_height_cm = value.max(0.0);
    }

    /// Sets health score, clamped to [0, 1].
    pub fn set_health_score(&mut self, value: f64) {
        self.health_score = value.clamp(0.0, 1.0);
    }

    /// Re-applies range clamps to every numeric field.
    ///
    /// Used after deserializing persisted state, where values may have
    /// been edited out of range by hand.
    pub fn clamp_in_place(&mut self) {
        self.set_soil_moisture(self.soil_moisture);
        self.set_light_pct(self.light_pct);
        self.set_plant_height_cm(self.plant_height_cm);
        self.set_health_score(self.health_score);
    }
}
