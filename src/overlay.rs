//! Override-layer synchronizer.
//!
//! The composed twin state is mirrored into the strongest layer of the
//! external scene graph as attribute overrides: one attribute per
//! environment field, one per actuator, and four per zone. The layer is
//! fully regenerated from the snapshot every tick; it is a pure
//! projection, never a diff, so stale attributes cannot survive a
//! changed snapshot or leak across a reset.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TwinError, TwinResult};
use crate::state::Snapshot;

/// A single overridden attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Numeric attribute.
    Number(f64),
    /// String attribute.
    Text(String),
}

/// The override layer's content: attribute path -> value, sorted.
///
/// Paths follow the scene-graph convention
/// `<prim path>.<attribute>`, e.g.
/// `/World/Greenhouse/Zones/Bed_03/Zone_C.soilMoisturePct`. Only
/// overrides are authored; no structural prims.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayDoc {
    attrs: BTreeMap<String, AttrValue>,
}

impl OverlayDoc {
    /// Looks up an attribute by full path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&AttrValue> {
        self.attrs.get(path)
    }

    /// Number of authored attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    /// True if no attributes are authored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    fn number(&mut self, path: String, value: f64) {
        self.attrs.insert(path, AttrValue::Number(value));
    }

    fn text(&mut self, path: String, value: String) {
        self.attrs.insert(path, AttrValue::Text(value));
    }
}

/// Projects a snapshot into override-layer content.
///
/// Stateless and total: the same snapshot always yields the same
/// document regardless of any previous overlay state.
#[must_use]
pub fn project(snapshot: &Snapshot) -> OverlayDoc {
    let mut doc = OverlayDoc::default();

    doc.text(
        "/World/Greenhouse.timestamp".to_string(),
        snapshot.timestamp.to_rfc3339(),
    );

    let env = &snapshot.environment;
    doc.number("/World/Greenhouse/Environment.temperature_c".to_string(), env.temperature_c());
    doc.number(
        "/World/Greenhouse/Environment.humidity_percent".to_string(),
        env.humidity_percent(),
    );
    doc.number("/World/Greenhouse/Environment.co2_ppm".to_string(), env.co2_ppm());
    doc.number("/World/Greenhouse/Environment.light_lux".to_string(), env.light_lux());

    let act = &snapshot.actuators;
    doc.number("/World/Greenhouse/Actuators.fan".to_string(), act.fan());
    doc.number("/World/Greenhouse/Actuators.vent".to_string(), act.vent());
    doc.number("/World/Greenhouse/Actuators.valve".to_string(), act.valve());

    for zone in &snapshot.zones {
        let prim = format!(
            "/World/Greenhouse/Zones/Bed_{:02}/Zone_{}",
            zone.id.bed(),
            zone.id.sub().letter()
        );
        doc.number(format!("{prim}.soilMoisturePct"), zone.soil_moisture() * 100.0);
        doc.number(format!("{prim}.lightPct"), zone.light_pct());
        doc.number(format!("{prim}.healthScore"), zone.health_score());
        doc.text(format!("{prim}.status"), zone.status.to_string());
    }

    doc
}

/// The strongest composition layer of the external scene graph.
///
/// `replace` is all-or-nothing per tick: on failure the previous content
/// must be left untouched and a `TwinError::Sync` reported. The
/// canonical state store is never affected either way.
pub trait OverrideLayer {
    /// Replaces the layer's entire content with `doc`.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::Sync` if the layer cannot be written.
    fn replace(&mut self, doc: &OverlayDoc) -> TwinResult<()>;
}

impl<T: OverrideLayer + ?Sized> OverrideLayer for Box<T> {
    fn replace(&mut self, doc: &OverlayDoc) -> TwinResult<()> {
        (**self).replace(doc)
    }
}

/// File-backed override layer.
///
/// The document is serialized as JSON and written atomically (temp file
/// + rename), so a failed write leaves the previous overlay intact.
#[derive(Debug)]
pub struct FileOverrideLayer {
    path: PathBuf,
}

impl FileOverrideLayer {
    /// Creates a layer backed by the given file path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The layer's file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OverrideLayer for FileOverrideLayer {
    fn replace(&mut self, doc: &OverlayDoc) -> TwinResult<()> {
        let sync_err = |e: &dyn std::fmt::Display| {
            TwinError::sync(format!("{}: {e}", self.path.display()))
        };

        let mut body = serde_json::to_string_pretty(doc).map_err(|e| sync_err(&e))?;
        body.push('\n');

        let tmp_path = self.path.with_extension("overlay.tmp");
        {
            let mut file = File::create(&tmp_path).map_err(|e| sync_err(&e))?;
            file.write_all(body.as_bytes()).map_err(|e| sync_err(&e))?;
            file.sync_all().map_err(|e| sync_err(&e))?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| sync_err(&e))?;
        Ok(())
    }
}

/// In-memory override layer for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryOverrideLayer {
    content: OverlayDoc,
}

impl MemoryOverrideLayer {
    /// The current layer content.
    #[must_use]
    pub fn content(&self) -> &OverlayDoc {
        &self.content
    }
}

impl OverrideLayer for MemoryOverrideLayer {
    fn replace(&mut self, doc: &OverlayDoc) -> TwinResult<()> {
        self.content = doc.clone();
        Ok(())
    }
}
