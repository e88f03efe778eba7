// A recorded detection feed: what every camera's detector reported, tick by tick.

use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::path::Path;
use vigil::pipeline::Rect;

#[derive(Debug, Deserialize)]
pub struct Feed {
    pub frame_width: u32,
    pub frame_height: u32,
    /// `ticks[t][camera]` lists the `[x, y, width, height]` boxes for that tick.
    pub ticks: Vec<Vec<Vec<[i64; 4]>>>,
}

impl Feed {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading feed {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing feed {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        let feed: Feed = serde_json::from_str(text)?;
        ensure!(feed.frame_width > 0 && feed.frame_height > 0, "frame size must be non-zero");
        Ok(feed)
    }

    /// Widest tick in the feed.
    pub fn camera_count(&self) -> usize {
        self.ticks.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Detections for tick `index` as rectangles, one list per camera.
    pub fn detections(&self, index: usize) -> Result<Vec<Vec<Rect>>> {
        let Some(tick) = self.ticks.get(index) else {
            return Ok(Vec::new());
        };
        tick.iter()
            .map(|boxes| boxes.iter().map(|b| to_rect(*b)).collect::<Result<Vec<_>>>())
            .collect()
    }
}

fn to_rect([x, y, width, height]: [i64; 4]) -> Result<Rect> {
    Ok(Rect::new(
        i32::try_from(x).context("x out of range")?,
        i32::try_from(y).context("y out of range")?,
        u32::try_from(width).context("width out of range")?,
        u32::try_from(height).context("height out of range")?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "frame_width": 640,
        "frame_height": 480,
        "ticks": [
            [[[10, 20, 30, 40]], []],
            [[], [[5, 6, 7, 8], [100, 100, 10, 10]], []]
        ]
    }"#;

    #[test]
    fn parses_ticks_per_camera() {
        let feed = Feed::parse(SAMPLE).unwrap();
        assert_eq!(feed.camera_count(), 3);
        assert_eq!(feed.ticks.len(), 2);

        let first = feed.detections(0).unwrap();
        assert_eq!(first, vec![vec![Rect::new(10, 20, 30, 40)], vec![]]);

        let second = feed.detections(1).unwrap();
        assert_eq!(second[1].len(), 2);
        assert_eq!(second[1][0].top_left().x, 5);
    }

    #[test]
    fn past_the_end_is_empty() {
        let feed = Feed::parse(SAMPLE).unwrap();
        assert!(feed.detections(9).unwrap().is_empty());
    }

    #[test]
    fn negative_size_is_rejected() {
        let text = r#"{"frame_width": 4, "frame_height": 4, "ticks": [[[[0, 0, -1, 3]]]]}"#;
        let feed = Feed::parse(text).unwrap();
        assert!(feed.detections(0).is_err());
    }

    #[test]
    fn bundled_loiter_feed_parses() {
        let feed = Feed::parse(include_str!("../feeds/loiter.json")).unwrap();
        assert_eq!(feed.camera_count(), 2);
        assert_eq!(feed.ticks.len(), 460);
        assert!(feed.detections(0).unwrap()[0].len() == 1);
    }

    #[test]
    fn zero_frame_size_is_rejected() {
        let text = r#"{"frame_width": 0, "frame_height": 4, "ticks": []}"#;
        assert!(Feed::parse(text).is_err());
    }
}
