// THEORY:
// The `pipeline` module is the top-level API of the engine. It encapsulates the
// per-tick call contract in a single method so the surrounding application only
// has to hand over "what each camera saw this tick" and read back "how alarmed
// each camera is".
//
// One tick runs, in order:
// 1.  **Resolve**: every camera's rectangles are reduced to their top-left
//     corners and fed through the `TrackingRegistry`.
// 2.  **Escalate**: each camera's `CameraAlertState` is advanced by the
//     `EscalationPolicy`.
// 3.  **Hand Off**: alert events are persisted as an image plus an
//     `AlertRecord` in the `AlertStore`.
// 4.  **Sweep**: idle objects are evicted, exactly once, after every camera.
//
// File I/O on the alert log happens only in `flush` and `restore`, never inside
// `tick`.

use crate::core_modules::Timestamp;
use crate::core_modules::escalation::{CameraObservation, EscalationPolicy};
use crate::core_modules::tracker::TrackingRegistry;
use crate::core_modules::utils::image_helper::alert_image_path;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::alert_store::{AlertRecord, AlertStore, SortField};
pub use crate::core_modules::escalation::{
    AlertEvent, AlertLevel, CameraAlertState, CameraMode, EscalationConfig,
};
pub use crate::core_modules::frame::FrameBuffer;
pub use crate::core_modules::position::{Position, Rect};
pub use crate::core_modules::tracker::{ObjectId, TrackedObject, TrackerConfig};
pub use crate::core_modules::utils::image_helper::{ImageSink, PngImageSink};

const ALERT_LOG_FILE: &str = "alerts.json";
const DEFAULT_TICK_PERIOD_MS: u64 = 33;

/// Configuration for the VigilPipeline, allowing for tunable behavior.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub camera_count: usize,
    /// Root for alert images (`img/`) and the alert log.
    pub data_dir: PathBuf,
    /// Period the surrounding application is expected to call `tick` at.
    pub tick_period: Duration,
    pub tracker: TrackerConfig,
    pub escalation: EscalationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            camera_count: 1,
            data_dir: PathBuf::from("data"),
            tick_period: Duration::from_millis(DEFAULT_TICK_PERIOD_MS),
            tracker: TrackerConfig::default(),
            escalation: EscalationConfig::default(),
        }
    }
}

/// The outcome of a single tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// Alert level of every camera after this tick, indexed by camera.
    pub levels: Vec<AlertLevel>,
    /// Alerts raised this tick, including repeats for already-recorded objects.
    pub alerts: Vec<AlertEvent>,
    /// Number of tracked objects evicted by the closing sweep.
    pub evicted: usize,
}

impl TickReport {
    pub fn is_alerting(&self) -> bool {
        self.levels.contains(&AlertLevel::Alerted)
    }
}

/// The main, top-level struct for the engine.
pub struct VigilPipeline<S: ImageSink> {
    config: PipelineConfig,
    registry: TrackingRegistry,
    policy: EscalationPolicy,
    cameras: Vec<CameraAlertState>,
    store: AlertStore,
    sink: S,
    /// Start time of each live object whose alert has already been recorded.
    recorded: BTreeMap<ObjectId, Timestamp>,
}

impl<S: ImageSink> VigilPipeline<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Self {
        Self {
            registry: TrackingRegistry::new(config.tracker.clone()),
            policy: EscalationPolicy::new(config.escalation.clone()),
            cameras: vec![CameraAlertState::default(); config.camera_count],
            store: AlertStore::new(),
            sink,
            recorded: BTreeMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Sets a camera's operating mode. Unknown camera indices are ignored.
    pub fn set_camera_mode(&mut self, camera: usize, mode: CameraMode) {
        match self.cameras.get_mut(camera) {
            Some(state) => state.mode = mode,
            None => warn!(camera, "ignoring mode change for unknown camera"),
        }
    }

    /// Runs one tick over every camera.
    ///
    /// `detections[i]` and `frames[i]` belong to camera `i`. Missing entries are
    /// treated as "no detections" and "no frame".
    pub fn tick(
        &mut self,
        now: Timestamp,
        detections: &[Vec<Rect>],
        frames: &[Option<FrameBuffer>],
    ) -> TickReport {
        let mut alerts = Vec::new();

        for camera in 0..self.cameras.len() {
            let rects = detections.get(camera).map(Vec::as_slice).unwrap_or(&[]);
            let frame = frames.get(camera).and_then(Option::as_ref);

            let resolved: Vec<ObjectId> = if self.cameras[camera].mode == CameraMode::Disabled {
                Vec::new()
            } else {
                rects
                    .iter()
                    .map(|rect| self.registry.observe(camera, rect.top_left(), now))
                    .collect()
            };

            let observation = CameraObservation {
                camera,
                detections: &resolved,
                frame,
            };

            match self
                .policy
                .escalate(&mut self.cameras[camera], &self.registry, observation, now)
            {
                Ok(Some(event)) => {
                    self.persist(&event);
                    alerts.push(event);
                }
                Ok(None) => {}
                Err(e) => {
                    if cfg!(debug_assertions) {
                        panic!("escalation on camera {camera} hit a registry contract violation: {e}");
                    }
                    error!(camera, error = %e, "escalation skipped");
                }
            }
        }

        let evicted = self.registry.sweep(now);
        if evicted > 0 {
            debug!(evicted, tracked = self.registry.len(), "sweep");
            self.recorded.retain(|id, _| self.registry.contains(id));
        }

        TickReport {
            levels: self.levels(),
            alerts,
            evicted,
        }
    }

    /// Writes the snapshot and upserts the alert record, once per tracked object.
    ///
    /// Ids repeat across days and same-second collisions, so a record already in
    /// the store is only left alone while the object that produced it is alive.
    fn persist(&mut self, event: &AlertEvent) {
        let id = event.id.as_str();
        let started = self.registry.get(&event.id).map(|object| object.starting_time);
        if started.is_some() && self.recorded.get(&event.id) == started.as_ref() {
            debug!(%id, "alert already recorded for this object");
            return;
        }

        let Some(frame) = &event.frame else {
            warn!(%id, camera = event.camera, "alert raised without a frame, not recorded");
            return;
        };

        let path = alert_image_path(&self.config.data_dir, id);
        if let Err(e) = self.sink.persist(&path, frame) {
            warn!(%id, path = %path.display(), error = %e, "could not persist alert image");
            return;
        }

        if self.store.contains(id) {
            debug!(%id, "replacing alert recorded for an earlier object");
        }
        self.store.insert(
            id,
            path.to_string_lossy(),
            event.at.date(),
            event.at.time(),
            event.camera,
        );
        if let Some(started) = started {
            self.recorded.insert(event.id.clone(), started);
        }
    }

    pub fn levels(&self) -> Vec<AlertLevel> {
        self.cameras.iter().map(|state| state.level).collect()
    }

    pub fn camera_states(&self) -> &[CameraAlertState] {
        &self.cameras
    }

    pub fn registry(&self) -> &TrackingRegistry {
        &self.registry
    }

    pub fn store(&self) -> &AlertStore {
        &self.store
    }

    pub fn alert_log_path(&self) -> PathBuf {
        self.config.data_dir.join(ALERT_LOG_FILE)
    }

    /// Saves the alert store to the alert log. Safe to call repeatedly.
    pub fn flush(&self) {
        let path = self.alert_log_path();
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "could not create data directory");
                return;
            }
        }
        self.store.save(&path);
    }

    /// Replaces the alert store with the contents of the alert log, if any.
    pub fn restore(&mut self) {
        let path = self.alert_log_path();
        self.store.load(&path);
    }
}
