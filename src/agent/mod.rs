//! Reasoning agents: who decides this tick's actions.
//!
//! The engine depends only on the `ReasoningAgent` capability; the two
//! variants are the local rule policy (always available) and a remote
//! vision/reasoning endpoint (one bounded attempt per tick, every
//! failure mapped to `ReasoningUnavailable` so the engine can fall back
//! to local rules).

mod local;
mod remote;
pub mod wire;

pub use local::LocalRuleAgent;
pub use remote::RemoteAgent;

use std::path::{Path, PathBuf};
use std::time::Duration;

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{TwinError, TwinResult};
use crate::recommend::RecommendationSet;
use crate::state::{Actuators, Environment, Snapshot};
use crate::zone::{Zone, ZoneId};

/// Reference to the camera frame shipped with a reasoning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    path: PathBuf,
}

impl ImageRef {
    /// Creates a reference to an image file on disk.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The image file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and base64-encodes the image.
    ///
    /// # Errors
    ///
    /// Returns `TwinError::ReasoningUnavailable` if the file cannot be
    /// read; an unreadable frame means the remote cannot be consulted.
    pub fn to_base64(&self) -> TwinResult<String> {
        let bytes = std::fs::read(&self.path).map_err(|e| {
            TwinError::reasoning_unavailable(format!(
                "cannot read camera frame {}: {e}",
                self.path.display()
            ))
        })?;
        Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
    }
}

/// The JSON context shipped with every reasoning request: the full
/// composed state plus the precomputed spatial alert list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningContext {
    /// Shared sensor readings.
    pub environment: Environment,
    /// Current actuator setpoints.
    pub actuators: Actuators,
    /// All 24 zones with telemetry and status.
    pub zones: Vec<Zone>,
    /// Zones whose status is not `ok`, ascending.
    pub alerts: Vec<ZoneId>,
}

impl ReasoningContext {
    /// Builds the context from a classified snapshot and its alert list.
    #[must_use]
    pub fn from_snapshot(snapshot: &Snapshot, alerts: &[ZoneId]) -> Self {
        Self {
            environment: snapshot.environment.clone(),
            actuators: snapshot.actuators.clone(),
            zones: snapshot.zones.clone(),
            alerts: alerts.to_vec(),
        }
    }

    /// Rebuilds a snapshot view of the context for rule evaluation.
    ///
    /// The timestamp is not part of the reasoning contract, so the view
    /// carries the epoch.
    #[must_use]
    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            timestamp: chrono::DateTime::UNIX_EPOCH,
            environment: self.environment.clone(),
            zones: self.zones.clone(),
            actuators: self.actuators.clone(),
        }
    }
}

/// Capability interface for per-tick decision making.
///
/// `decide` is issued at most once per tick. Implementations must treat
/// every failure as `TwinError::ReasoningUnavailable`; the engine then
/// falls back to the local rule policy for that tick, and the fallback
/// is noted in the emitted history record.
pub trait ReasoningAgent {
    /// Produces this tick's recommendation set.
    ///
    /// # Errors
    ///
    /// `TwinError::ReasoningUnavailable` when the agent cannot produce a
    /// usable decision within `timeout`.
    fn decide(
        &self,
        image: Option<&ImageRef>,
        context: &ReasoningContext,
        timeout: Duration,
    ) -> TwinResult<RecommendationSet>;
}
