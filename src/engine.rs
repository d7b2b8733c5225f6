//! Step orchestrator: one tick of the twin pipeline.
//!
//! Each tick runs Simulating -> Classifying -> Deciding -> Applying ->
//! Syncing -> Logging exactly once, strictly sequentially. A reasoning
//! failure at Deciding falls back to the local rule policy; an overlay
//! failure at Syncing is recorded but does not block Logging; failures
//! at Logging (history append or state save) abort the tick with no
//! partial commit of the canonical state.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::agent::{ImageRef, LocalRuleAgent, ReasoningAgent, ReasoningContext, RemoteAgent};
use crate::apply::{self, ActuationRecord};
use crate::classify::{classify_all, spatial_alerts};
use crate::config::TwinConfig;
use crate::error::{TwinError, TwinResult};
use crate::history::{HistoryLogger, HistoryRecord};
use crate::overlay::{project, OverrideLayer};
use crate::simulate::drift_step;
use crate::state::Snapshot;
use crate::store;
use crate::zone::ZoneId;

/// The tick state machine's stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickStage {
    /// Between ticks.
    Idle,
    /// Advancing the drift simulation.
    Simulating,
    /// Deriving zone statuses and the alert list.
    Classifying,
    /// Consulting the reasoning agent (or local rules).
    Deciding,
    /// Committing the recommendation set.
    Applying,
    /// Regenerating the override layer.
    Syncing,
    /// Appending history and persisting state.
    Logging,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Simulating => "simulating",
            Self::Classifying => "classifying",
            Self::Deciding => "deciding",
            Self::Applying => "applying",
            Self::Syncing => "syncing",
            Self::Logging => "logging",
        };
        write!(f, "{s}")
    }
}

/// Summary of one completed tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Snapshot timestamp after this tick.
    pub timestamp: DateTime<Utc>,
    /// Spatial alert list for this tick.
    pub alerts: Vec<ZoneId>,
    /// The deciding agent's explanation.
    pub explanation: String,
    /// True if the reasoning agent failed and local rules were used.
    pub fallback_used: bool,
    /// Overlay sync failure for this tick, if any.
    pub sync_error: Option<String>,
    /// What the actuation applier committed and skipped.
    pub actuation: ActuationRecord,
}

/// The twin engine: owns the canonical snapshot and sequences ticks.
///
/// One engine is one twin instance. Ticks never overlap; a tick fully
/// completes (including Logging) before the next may begin, which is
/// guaranteed here by `tick` taking `&mut self`. Parallel twin
/// instances must use entirely disjoint state, overlay, and history
/// paths.
pub struct TwinEngine<L: OverrideLayer> {
    config: TwinConfig,
    snapshot: Snapshot,
    state_path: PathBuf,
    overlay: L,
    history: HistoryLogger,
    rng: StdRng,
    local: LocalRuleAgent,
    remote: Option<RemoteAgent>,
    frame: Option<ImageRef>,
}

impl<L: OverrideLayer> TwinEngine<L> {
    /// Creates an engine around an already-loaded snapshot.
    #[must_use]
    pub fn new(
        config: TwinConfig,
        snapshot: Snapshot,
        state_path: impl Into<PathBuf>,
        history: HistoryLogger,
        overlay: L,
        seed: u64,
    ) -> Self {
        let local = LocalRuleAgent::new(config.controller.clone());
        Self {
            config,
            snapshot,
            state_path: state_path.into(),
            overlay,
            history,
            rng: StdRng::seed_from_u64(seed),
            local,
            remote: None,
            frame: None,
        }
    }

    /// Opens an engine from a persisted state file.
    ///
    /// # Errors
    ///
    /// Propagates state-load and history-open failures.
    pub fn open(
        config: TwinConfig,
        state_path: &Path,
        history_path: &Path,
        overlay: L,
        seed: u64,
    ) -> TwinResult<Self> {
        let snapshot = store::load(state_path)?;
        let history = HistoryLogger::open(history_path)?;
        Ok(Self::new(config, snapshot, state_path, history, overlay, seed))
    }

    /// Installs the remote reasoning agent.
    pub fn set_remote_agent(&mut self, agent: RemoteAgent) {
        self.remote = Some(agent);
    }

    /// Sets the camera frame shipped with remote reasoning requests.
    pub fn set_camera_frame(&mut self, frame: ImageRef) {
        self.frame = Some(frame);
    }

    /// The current canonical snapshot.
    #[must_use]
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &TwinConfig {
        &self.config
    }

    /// Operator override: sets a zone's soil moisture (clamped) and
    /// persists immediately. The status is re-derived on the next tick.
    ///
    /// # Errors
    ///
    /// `TwinError::UnknownTarget` if the zone is not in the snapshot;
    /// persistence errors from the immediate save.
    pub fn override_zone_soil_moisture(&mut self, id: ZoneId, value: f64) -> TwinResult<()> {
        self.with_zone(id, |zone| zone.set_soil_moisture(value))
    }

    /// Operator override: sets a zone's light percentage (clamped) and
    /// persists immediately.
    ///
    /// # Errors
    ///
    /// Same contract as `override_zone_soil_moisture`.
    pub fn override_zone_light_pct(&mut self, id: ZoneId, value: f64) -> TwinResult<()> {
        self.with_zone(id, |zone| zone.set_light_pct(value))
    }

    /// Operator override: sets a zone's health score (clamped) and
    /// persists immediately.
    ///
    /// # Errors
    ///
    /// Same contract as `override_zone_soil_moisture`.
    pub fn override_zone_health_score(&mut self, id: ZoneId, value: f64) -> TwinResult<()> {
        self.with_zone(id, |zone| zone.set_health_score(value))
    }

    fn with_zone(
        &mut self,
        id: ZoneId,
        mutate: impl FnOnce(&mut crate::zone::Zone),
    ) -> TwinResult<()> {
        let zone = self
            .snapshot
            .zone_mut(id)
            .ok_or_else(|| TwinError::UnknownTarget {
                target: id.to_string(),
            })?;
        mutate(zone);
        store::save(&self.snapshot, &self.state_path, TickStage::Idle)
    }

    /// Restores the template snapshot, discarding simulation continuity.
    ///
    /// The history log is untouched.
    ///
    /// # Errors
    ///
    /// Propagates template-load and save failures.
    pub fn reset(&mut self, template_path: Option<&Path>) -> TwinResult<()> {
        self.snapshot = store::reset(&self.state_path, template_path)?;
        Ok(())
    }

    /// Runs one full tick.
    ///
    /// # Errors
    ///
    /// Fatal failures (`Logging`: history append or state save) abort
    /// the tick and surface with stage context. Reasoning and sync
    /// failures are degraded gracefully and annotated in the report and
    /// history record instead.
    pub fn tick(&mut self) -> TwinResult<TickReport> {
        // Simulating
        drift_step(&mut self.snapshot, &self.config.drift, Utc::now(), &mut self.rng);

        // Classifying
        classify_all(&mut self.snapshot, &self.config.classifier);
        let alerts = spatial_alerts(&self.snapshot);

        // Deciding
        let context = ReasoningContext::from_snapshot(&self.snapshot, &alerts);
        let timeout = self.config.remote.timeout();
        let (set, fallback_used) = match &self.remote {
            Some(remote) => match remote.decide(self.frame.as_ref(), &context, timeout) {
                Ok(set) => (set, false),
                Err(err) => {
                    tracing::warn!(reason = %err, "remote reasoning unavailable, using local rules");
                    let mut set = self.local.decide(None, &context, timeout)?;
                    set.explanation =
                        format!("[fallback to local rules: {err}] {}", set.explanation);
                    (set, true)
                }
            },
            None => (self.local.decide(None, &context, timeout)?, false),
        };

        // Applying
        let actuation = apply::apply(&mut self.snapshot, &set);
        for skipped in &actuation.skipped {
            tracing::warn!(skipped_target = %skipped.target, reason = %skipped.reason, "recommendation skipped");
        }

        // Syncing: failure reported, never blocks Logging.
        let sync_error = match self.overlay.replace(&project(&self.snapshot)) {
            Ok(()) => None,
            Err(err) => {
                tracing::warn!(reason = %err, "overlay sync failed");
                Some(err.to_string())
            }
        };

        // Logging: history append, then state save. Both fatal.
        let record = HistoryRecord {
            snapshot: self.snapshot.clone(),
            alerts: alerts.clone(),
            explanation: set.explanation.clone(),
            fallback_used,
            sync_error: sync_error.clone(),
            actuation: actuation.clone(),
        };
        self.history.append(&record)?;
        store::save(&self.snapshot, &self.state_path, TickStage::Logging)?;

        tracing::info!(
            timestamp = %self.snapshot.timestamp,
            temperature_c = self.snapshot.environment.temperature_c(),
            humidity_percent = self.snapshot.environment.humidity_percent(),
            fan = self.snapshot.actuators.fan(),
            vent = self.snapshot.actuators.vent(),
            valve = self.snapshot.actuators.valve(),
            alerts = alerts.len(),
            fallback_used,
            "tick complete"
        );

        Ok(TickReport {
            timestamp: self.snapshot.timestamp,
            alerts,
            explanation: set.explanation,
            fallback_used,
            sync_error,
            actuation,
        })
    }
}
