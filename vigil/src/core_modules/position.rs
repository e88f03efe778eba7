// THEORY:
// The `position` module holds the spatial vocabulary of the engine. Detections
// arrive as rectangles, but the tracker only ever reasons about a single point
// per detection: the rectangle's top-left corner.
//
// Key architectural principles:
// 1.  **Dumb Data Containers**: `Position` and `Rect` carry no behavior beyond
//     trivial conversions. They are `Copy` and cheap to pass around by value.
// 2.  **Explicit Matching**: "Is this the same object?" is answered by an
//     `AnchorMatcher`, not by comparing identifiers. The matcher compares each
//     axis independently against a fixed tolerance (a square window, not a
//     circle), so a detection matches an anchor only if it lies within the
//     tolerance on x AND on y.

/// An integer pixel coordinate in camera space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Position {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// A detector bounding box. Only the top-left corner feeds the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn top_left(&self) -> Position {
        Position::new(self.x, self.y)
    }
}

/// Decides whether a detection falls close enough to an object's anchor to be
/// considered the same object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorMatcher {
    /// Maximum per-axis distance, inclusive.
    pub tolerance: i32,
}

impl AnchorMatcher {
    pub fn new(tolerance: i32) -> Self {
        Self { tolerance }
    }

    /// True iff both axes differ by at most `tolerance`.
    pub fn is_close_to(&self, p1: Position, p2: Position) -> bool {
        let dx = (i64::from(p1.x) - i64::from(p2.x)).abs();
        let dy = (i64::from(p1.y) - i64::from(p2.y)).abs();
        let tolerance = i64::from(self.tolerance);
        dx <= tolerance && dy <= tolerance
    }
}
