// THEORY:
// The `escalation` module turns the registry's per-object signals into a
// per-camera alert level. Every tick, each camera lands in exactly one of three
// levels:
// - `None`: nothing is in view.
// - `Detecting`: something is in view but has not been there long enough.
// - `Alerted`: at least one object in view is sustained, and an `AlertEvent`
//   is emitted for it.
//
// Key architectural principles:
// 1.  **Two Independent Clocks**: The per-camera cooldown spaces escalations
//     apart so a camera that sees the same scene every 33ms does not re-evaluate
//     on every frame. The per-object sustained threshold lives in the registry
//     and decides whether an escalation is an alert. Neither stands in for the
//     other.
// 2.  **Free De-escalation**: A camera with no detections drops to `None`
//     immediately. The cooldown only gates upward movement.
// 3.  **State Passed In, Not Held**: The policy owns only its configuration.
//     Each camera's `CameraAlertState` is owned by the caller and handed in
//     `&mut` per tick.

use crate::core_modules::Timestamp;
use crate::core_modules::frame::FrameBuffer;
use crate::core_modules::tracker::{ObjectId, TrackingRegistry};
use crate::error::Result;
use chrono::TimeDelta;
use tracing::{debug, info};

const DEFAULT_COOLDOWN_MS: i64 = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AlertLevel {
    #[default]
    None,
    Detecting,
    Alerted,
}

impl AlertLevel {
    /// Numeric level for display: 0 clear, 1 yellow, 2 red.
    pub fn code(self) -> u8 {
        match self {
            AlertLevel::None => 0,
            AlertLevel::Detecting => 1,
            AlertLevel::Alerted => 2,
        }
    }
}

/// Per-camera operating mode chosen by the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    /// Escalate to `Alerted` only for sustained objects.
    #[default]
    Default,
    /// Ignore the camera entirely; its level stays `None`.
    Disabled,
    /// Any detection outside the cooldown escalates straight to `Alerted`.
    AlertOnDetection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraAlertState {
    pub level: AlertLevel,
    /// `None` until the camera escalates for the first time.
    pub last_escalation_time: Option<Timestamp>,
    pub mode: CameraMode,
}

#[derive(Debug, Clone)]
pub struct EscalationConfig {
    /// Minimum spacing between escalations on one camera.
    pub cooldown: TimeDelta,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            cooldown: TimeDelta::milliseconds(DEFAULT_COOLDOWN_MS),
        }
    }
}

/// Everything the policy needs to know about one camera for one tick.
#[derive(Debug, Clone, Copy)]
pub struct CameraObservation<'a> {
    pub camera: usize,
    /// Identities resolved from this tick's detections, in detector order.
    pub detections: &'a [ObjectId],
    /// The frame the detections came from, snapshotted only if an alert fires.
    pub frame: Option<&'a FrameBuffer>,
}

/// Emitted when a camera escalates to `Alerted`.
#[derive(Debug, Clone)]
pub struct AlertEvent {
    pub id: ObjectId,
    pub camera: usize,
    pub at: Timestamp,
    pub frame: Option<FrameBuffer>,
}

#[derive(Debug, Clone, Default)]
pub struct EscalationPolicy {
    config: EscalationConfig,
}

impl EscalationPolicy {
    pub fn new(config: EscalationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EscalationConfig {
        &self.config
    }

    /// Advances one camera's alert state for this tick.
    ///
    /// Fails only if a detection refers to an identity the registry does not
    /// hold, in which case `state` is left untouched.
    pub fn escalate(
        &self,
        state: &mut CameraAlertState,
        registry: &TrackingRegistry,
        observation: CameraObservation<'_>,
        now: Timestamp,
    ) -> Result<Option<AlertEvent>> {
        if state.mode == CameraMode::Disabled || observation.detections.is_empty() {
            state.level = AlertLevel::None;
            return Ok(None);
        }

        if let Some(last) = state.last_escalation_time {
            if now - last < self.config.cooldown {
                return Ok(None);
            }
        }

        let alerting = match state.mode {
            CameraMode::AlertOnDetection => observation.detections.first(),
            _ => self.first_sustained(registry, observation.detections, now)?,
        };

        state.last_escalation_time = Some(now);

        match alerting {
            Some(id) => {
                state.level = AlertLevel::Alerted;
                info!(camera = observation.camera, %id, "alert raised");
                Ok(Some(AlertEvent {
                    id: id.clone(),
                    camera: observation.camera,
                    at: now,
                    frame: observation.frame.cloned(),
                }))
            }
            None => {
                state.level = AlertLevel::Detecting;
                debug!(camera = observation.camera, detections = observation.detections.len(), "detecting");
                Ok(None)
            }
        }
    }

    fn first_sustained<'a>(
        &self,
        registry: &TrackingRegistry,
        detections: &'a [ObjectId],
        now: Timestamp,
    ) -> Result<Option<&'a ObjectId>> {
        for id in detections {
            if registry.is_sustained(id, now)? {
                return Ok(Some(id));
            }
        }
        Ok(None)
    }
}
