// This file is an example of how to use the `vigil` library.
// The main library entry point is `src/lib.rs`; `vigil_replay` is the full driver.

use chrono::{Local, TimeDelta};
use vigil::pipeline::{FrameBuffer, PipelineConfig, PngImageSink, Rect, SortField, VigilPipeline};

fn main() {
    let data_dir = std::env::temp_dir().join("vigil-example");
    let config = PipelineConfig {
        camera_count: 1,
        data_dir,
        ..Default::default()
    };
    let mut pipeline = VigilPipeline::new(config, PngImageSink);
    pipeline.restore();

    // Simulate a person standing still in front of camera 0 for twelve seconds.
    let start = Local::now().naive_local();
    let frames = vec![Some(FrameBuffer::blank(320, 240))];
    let mut elapsed = 0;
    while elapsed <= 12_000 {
        let now = start + TimeDelta::milliseconds(elapsed);
        let report = pipeline.tick(now, &[vec![Rect::new(120, 80, 64, 128)]], &frames);
        for alert in &report.alerts {
            println!("alert: {} on camera {}", alert.id, alert.camera);
        }
        elapsed += 500;
    }

    pipeline.flush();
    for record in pipeline.store().sorted_by(SortField::Hour) {
        println!("{} {} {} cam{} {}", record.date, record.time, record.id, record.camera, record.img_path);
    }
}
