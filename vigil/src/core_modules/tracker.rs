// THEORY:
// The `tracker` module is the heart of the engine. Its responsibility is to add
// "object permanence" to a detector that has none: every frame the detector hands
// over a fresh, anonymous list of rectangles, and the `TrackingRegistry` decides
// which of them belong to objects it has already seen.
//
// This module solves the "data association problem" for a noisy, intermittent
// detector.
//
// Key architectural principles:
// 1.  **Anchored Identity**: A `TrackedObject` is matched against its *anchor*,
//     the first position ever recorded for it, never its latest one. An object
//     that drifts further than the tolerance from where it first appeared stops
//     matching and a new identity is minted, even if it never left the frame.
//     Detectors that pulse on and off around a stationary subject are what this
//     is tuned for.
// 2.  **First Match Wins**: Candidates are scanned in the registry's stable key
//     order and the first anchor inside the tolerance window is taken. Ties are
//     broken by that order, not by distance.
// 3.  **Debounced Growth**: A matched detection only extends an object's
//     history once the object is older than the debounce floor. A single burst
//     of detector noise therefore cannot inflate how long an object appears to
//     have been present.
// 4.  **Lifecycle Management**:
//     - **Birth**: an unmatched detection mints a time-qualified id
//       (`CAM{camera}-{h}-{m}-{s}`). Two unmatched detections from the same
//       camera in the same second share that key and the later one replaces
//       the earlier.
//     - **Tracking**: accepted updates append a position and refresh
//       `last_insertion_time`.
//     - **Death**: `sweep` evicts objects idle beyond the eviction threshold.
//       It must run once per tick, after every camera has been processed.

use crate::core_modules::Timestamp;
use crate::core_modules::position::{AnchorMatcher, Position};
use crate::error::{Result, VigilError};
use chrono::{TimeDelta, Timelike};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

const DEFAULT_TOLERANCE: i32 = 50;
const DEFAULT_DEBOUNCE_FLOOR_MS: i64 = 1_000;
const DEFAULT_EVICTION_THRESHOLD_MS: i64 = 5_000;
const DEFAULT_ALERT_THRESHOLD_MS: i64 = 10_000;

/// Tunable knobs for the registry.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Per-axis matching tolerance around an object's anchor, inclusive.
    pub tolerance: i32,
    /// An object must be strictly older than this before updates are accepted.
    pub debounce_floor: TimeDelta,
    /// Objects idle for strictly longer than this are evicted by `sweep`.
    pub eviction_threshold: TimeDelta,
    /// Matched lifetime that must be strictly exceeded to count as sustained.
    pub alert_threshold: TimeDelta,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            debounce_floor: TimeDelta::milliseconds(DEFAULT_DEBOUNCE_FLOOR_MS),
            eviction_threshold: TimeDelta::milliseconds(DEFAULT_EVICTION_THRESHOLD_MS),
            alert_threshold: TimeDelta::milliseconds(DEFAULT_ALERT_THRESHOLD_MS),
        }
    }
}

/// Opaque identity of a tracked object.
///
/// Only the registry mints these. The textual form is stable and doubles as the
/// alert log key and the alert image file stem.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(String);

impl ObjectId {
    fn mint(camera: usize, now: Timestamp) -> Self {
        Self(format!(
            "CAM{}-{}-{}-{}",
            camera,
            now.hour(),
            now.minute(),
            now.second()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An object observed across multiple ticks.
#[derive(Debug, Clone)]
pub struct TrackedObject {
    pub id: ObjectId,
    /// The camera whose detection created this object.
    pub camera: usize,
    /// Every accepted position, oldest first. Never empty.
    positions: Vec<Position>,
    pub starting_time: Timestamp,
    pub last_insertion_time: Timestamp,
}

impl TrackedObject {
    fn new(id: ObjectId, camera: usize, anchor: Position, now: Timestamp) -> Self {
        Self {
            id,
            camera,
            positions: vec![anchor],
            starting_time: now,
            last_insertion_time: now,
        }
    }

    /// The first recorded position; the object's permanent matching key.
    pub fn anchor(&self) -> Position {
        self.positions[0]
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Time between creation and the last accepted update.
    pub fn matched_lifetime(&self) -> TimeDelta {
        self.last_insertion_time - self.starting_time
    }

    fn try_append(&mut self, position: Position, now: Timestamp, debounce_floor: TimeDelta) -> bool {
        if now - self.starting_time <= debounce_floor {
            return false;
        }
        self.positions.push(position);
        self.last_insertion_time = now;
        true
    }
}

/// Owns every tracked object and resolves new detections against them.
#[derive(Debug)]
pub struct TrackingRegistry {
    config: TrackerConfig,
    matcher: AnchorMatcher,
    objects: BTreeMap<ObjectId, TrackedObject>,
}

impl TrackingRegistry {
    pub fn new(config: TrackerConfig) -> Self {
        let matcher = AnchorMatcher::new(config.tolerance);
        Self {
            config,
            matcher,
            objects: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Returns the id of the first object whose anchor is close to `position`,
    /// or mints and registers a new object anchored there.
    pub fn resolve_or_create(&mut self, camera: usize, position: Position, now: Timestamp) -> ObjectId {
        match self.find_match(position) {
            Some(id) => id,
            None => self.create(camera, position, now),
        }
    }

    /// Appends `position` to the object's history if it is past the debounce
    /// floor. Returns whether the position was accepted.
    pub fn update(&mut self, id: &ObjectId, position: Position, now: Timestamp) -> Result<bool> {
        let debounce_floor = self.config.debounce_floor;
        let object = self
            .objects
            .get_mut(id)
            .ok_or_else(|| VigilError::NotFound(id.to_string()))?;
        Ok(object.try_append(position, now, debounce_floor))
    }

    /// Resolves a detection and feeds it to the matched object in one step.
    /// A freshly created object is not updated again for the same detection.
    pub fn observe(&mut self, camera: usize, position: Position, now: Timestamp) -> ObjectId {
        let debounce_floor = self.config.debounce_floor;
        match self.find_match(position) {
            Some(id) => {
                if let Some(object) = self.objects.get_mut(&id) {
                    object.try_append(position, now, debounce_floor);
                }
                id
            }
            None => self.create(camera, position, now),
        }
    }

    /// Evicts every object idle for longer than the eviction threshold.
    /// Returns the number of objects removed.
    pub fn sweep(&mut self, now: Timestamp) -> usize {
        let threshold = self.config.eviction_threshold;
        let snapshot: Vec<ObjectId> = self.objects.keys().cloned().collect();
        let mut evicted = 0;

        for id in snapshot {
            let (idle, camera) = match self.objects.get(&id) {
                Some(object) => (now - object.last_insertion_time, object.camera),
                None => continue,
            };
            if idle > threshold {
                self.objects.remove(&id);
                evicted += 1;
                debug!(
                    %id,
                    camera,
                    idle_ms = idle.num_milliseconds(),
                    remaining = self.objects.len(),
                    "evicted idle object"
                );
            }
        }

        evicted
    }

    /// True iff the object's matched lifetime strictly exceeds the alert threshold.
    pub fn is_sustained(&self, id: &ObjectId, _now: Timestamp) -> Result<bool> {
        let object = self
            .objects
            .get(id)
            .ok_or_else(|| VigilError::NotFound(id.to_string()))?;
        Ok(object.matched_lifetime() > self.config.alert_threshold)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&TrackedObject> {
        self.objects.get(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedObject> {
        self.objects.values()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    fn find_match(&self, position: Position) -> Option<ObjectId> {
        self.objects
            .values()
            .find(|object| self.matcher.is_close_to(position, object.anchor()))
            .map(|object| object.id.clone())
    }

    fn create(&mut self, camera: usize, position: Position, now: Timestamp) -> ObjectId {
        let id = ObjectId::mint(camera, now);
        let object = TrackedObject::new(id.clone(), camera, position, now);
        if self.objects.insert(id.clone(), object).is_some() {
            debug!(%id, "id collision, replaced existing object");
        }
        debug!(%id, x = position.x, y = position.y, total = self.objects.len(), "tracking new object");
        id
    }
}

impl Default for TrackingRegistry {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, ms: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(2024, 5, 17)
            .unwrap()
            .and_hms_milli_opt(h, m, s, ms)
            .unwrap()
    }

    fn later(t: Timestamp, ms: i64) -> Timestamp {
        t + TimeDelta::milliseconds(ms)
    }

    #[test]
    fn same_position_twice_resolves_to_same_id() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(9, 15, 30, 0);

        let first = registry.resolve_or_create(0, Position::new(200, 120), t0);
        let second = registry.resolve_or_create(0, Position::new(200, 120), later(t0, 33));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn new_ids_are_time_qualified() {
        let mut registry = TrackingRegistry::default();
        let id = registry.resolve_or_create(3, Position::new(10, 10), at(7, 4, 9, 500));
        assert_eq!(id.as_str(), "CAM3-7-4-9");
    }

    #[test]
    fn matching_uses_anchor_not_latest_position() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(12, 0, 0, 0);
        let id = registry.resolve_or_create(0, Position::new(0, 0), t0);

        // Drift to the edge of the window, then beyond it.
        registry.update(&id, Position::new(50, 0), later(t0, 1_500)).unwrap();
        let drifted = registry.resolve_or_create(0, Position::new(90, 0), later(t0, 2_000));

        assert_ne!(id, drifted);
        assert_eq!(registry.get(&id).unwrap().anchor(), Position::new(0, 0));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn first_match_in_key_order_wins_over_closer_match() {
        let mut registry = TrackingRegistry::default();
        let a = registry.resolve_or_create(0, Position::new(0, 0), at(8, 0, 1, 0));
        let b = registry.resolve_or_create(0, Position::new(80, 0), at(8, 0, 2, 0));
        assert!(a < b);

        // (45, 0) lies inside both windows and is closer to `b`.
        let resolved = registry.resolve_or_create(0, Position::new(45, 0), at(8, 0, 3, 0));
        assert_eq!(resolved, a);
    }

    #[test]
    fn same_second_collision_replaces_earlier_object() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(10, 10, 10, 100);

        let first = registry.resolve_or_create(1, Position::new(0, 0), t0);
        let second = registry.resolve_or_create(1, Position::new(500, 500), later(t0, 200));

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&first).unwrap().anchor(), Position::new(500, 500));
    }

    #[test]
    fn matching_ignores_camera_index() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(10, 0, 0, 0);
        let from_cam0 = registry.resolve_or_create(0, Position::new(100, 100), t0);
        let from_cam2 = registry.resolve_or_create(2, Position::new(110, 90), later(t0, 1_000));
        assert_eq!(from_cam0, from_cam2);
        // The object keeps the camera that first saw it.
        assert_eq!(registry.get(&from_cam0).unwrap().camera, 0);
    }

    #[test]
    fn update_within_debounce_floor_is_dropped() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(14, 0, 0, 0);
        let id = registry.resolve_or_create(0, Position::new(5, 5), t0);

        assert!(!registry.update(&id, Position::new(6, 6), later(t0, 500)).unwrap());
        assert!(!registry.update(&id, Position::new(6, 6), later(t0, 1_000)).unwrap());

        let object = registry.get(&id).unwrap();
        assert_eq!(object.positions().len(), 1);
        assert_eq!(object.last_insertion_time, t0);
    }

    #[test]
    fn update_past_debounce_floor_appends_and_refreshes() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(14, 0, 0, 0);
        let id = registry.resolve_or_create(0, Position::new(5, 5), t0);

        assert!(registry.update(&id, Position::new(7, 8), later(t0, 1_001)).unwrap());

        let object = registry.get(&id).unwrap();
        assert_eq!(object.positions(), &[Position::new(5, 5), Position::new(7, 8)]);
        assert_eq!(object.last_insertion_time, later(t0, 1_001));
        assert!(object.last_insertion_time >= object.starting_time);
    }

    #[test]
    fn observe_creates_then_updates() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(16, 30, 0, 0);

        let id = registry.observe(0, Position::new(300, 300), t0);
        assert_eq!(registry.get(&id).unwrap().positions().len(), 1);

        let again = registry.observe(0, Position::new(310, 305), later(t0, 2_000));
        assert_eq!(id, again);
        assert_eq!(registry.get(&id).unwrap().positions().len(), 2);
    }

    #[test]
    fn sweep_keeps_recent_and_evicts_idle_objects() {
        let mut registry = TrackingRegistry::default();
        let now = at(18, 0, 10, 0);

        let stale = registry.resolve_or_create(0, Position::new(0, 0), later(now, -5_100));
        let fresh = registry.resolve_or_create(1, Position::new(900, 900), later(now, -4_900));

        assert_eq!(registry.sweep(now), 1);
        assert!(!registry.contains(&stale));
        assert!(registry.contains(&fresh));
    }

    #[test]
    fn sweep_respects_last_insertion_not_creation() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(18, 0, 0, 0);
        let id = registry.resolve_or_create(0, Position::new(0, 0), t0);
        registry.update(&id, Position::new(1, 1), later(t0, 4_000)).unwrap();

        assert_eq!(registry.sweep(later(t0, 8_000)), 0);
        assert_eq!(registry.sweep(later(t0, 9_001)), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn sustained_requires_strictly_more_than_threshold() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(20, 0, 0, 0);
        let exact = registry.resolve_or_create(0, Position::new(0, 0), t0);
        let over = registry.resolve_or_create(0, Position::new(1_000, 1_000), later(t0, 1_000));

        registry.update(&exact, Position::new(0, 0), later(t0, 10_000)).unwrap();
        registry
            .update(&over, Position::new(1_000, 1_000), later(t0, 11_001))
            .unwrap();

        let now = later(t0, 11_001);
        assert!(!registry.is_sustained(&exact, now).unwrap());
        assert!(registry.is_sustained(&over, now).unwrap());
    }

    #[test]
    fn lookups_after_eviction_report_not_found() {
        let mut registry = TrackingRegistry::default();
        let t0 = at(21, 0, 0, 0);
        let id = registry.resolve_or_create(0, Position::new(0, 0), t0);
        registry.sweep(later(t0, 6_000));

        assert!(matches!(
            registry.is_sustained(&id, later(t0, 6_000)),
            Err(VigilError::NotFound(_))
        ));
        assert!(matches!(
            registry.update(&id, Position::new(0, 0), later(t0, 6_000)),
            Err(VigilError::NotFound(_))
        ));
    }
}
