use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime, TimeDelta};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vigil::pipeline::{
    AlertLevel, CameraMode, FrameBuffer, PipelineConfig, PngImageSink, SortField, VigilPipeline,
};

mod feed;

use feed::Feed;

#[derive(Parser, Debug)]
#[command(
    name = "vigil-replay",
    version,
    about = "Replay a recorded detection feed through the vigil alert pipeline"
)]
struct Args {
    /// JSON detection feed to replay
    #[arg(short, long, env = "VIGIL_FEED")]
    feed: PathBuf,

    /// Directory for alert images and the alert log
    #[arg(short, long, env = "VIGIL_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Tick period in milliseconds
    #[arg(long, env = "VIGIL_TICK_MS", default_value_t = 33)]
    tick_ms: u64,

    /// Pace ticks against the wall clock instead of a simulated one
    #[arg(long)]
    realtime: bool,

    /// Camera indices to ignore
    #[arg(long = "disable", value_name = "CAMERA")]
    disabled: Vec<usize>,

    /// Camera indices that alert on any detection
    #[arg(long = "alert-on-detection", value_name = "CAMERA")]
    alert_on_detection: Vec<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let feed = Feed::load(&args.feed)?;
    let config = PipelineConfig {
        camera_count: feed.camera_count(),
        data_dir: args.data_dir.clone(),
        tick_period: Duration::from_millis(args.tick_ms.max(1)),
        ..Default::default()
    };
    let mut pipeline = VigilPipeline::new(config, PngImageSink);
    pipeline.restore();
    for &camera in &args.disabled {
        pipeline.set_camera_mode(camera, CameraMode::Disabled);
    }
    for &camera in &args.alert_on_detection {
        pipeline.set_camera_mode(camera, CameraMode::AlertOnDetection);
    }

    info!(
        ticks = feed.ticks.len(),
        cameras = feed.camera_count(),
        restored = pipeline.store().len(),
        "starting replay"
    );

    let frames: Vec<Option<FrameBuffer>> = (0..feed.camera_count())
        .map(|_| Some(FrameBuffer::blank(feed.frame_width, feed.frame_height)))
        .collect();
    let tick_period = pipeline.config().tick_period;
    let start = Local::now().naive_local();
    let step = TimeDelta::from_std(tick_period).context("tick period out of range")?;
    let mut interval = tokio::time::interval(tick_period);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut alerts_raised = 0usize;
    let mut previous: Vec<AlertLevel> = pipeline.levels();

    for index in 0..feed.ticks.len() {
        let interrupted = if args.realtime {
            tokio::select! {
                _ = interval.tick() => false,
                _ = &mut shutdown => true,
            }
        } else {
            tokio::select! {
                biased;
                _ = &mut shutdown => true,
                _ = tokio::task::yield_now() => false,
            }
        };
        if interrupted {
            warn!(tick = index, "interrupted, stopping replay");
            break;
        }

        let now: NaiveDateTime = if args.realtime {
            Local::now().naive_local()
        } else {
            start + step * i32::try_from(index).context("feed too long")?
        };

        let detections = feed.detections(index)?;
        let report = pipeline.tick(now, &detections, &frames);
        alerts_raised += report.alerts.len();

        for (camera, (before, after)) in previous.iter().zip(&report.levels).enumerate() {
            if before != after {
                info!(tick = index, camera, level = ?after, "camera level changed");
            }
        }
        previous = report.levels;
    }

    pipeline.flush();

    info!(
        alerts_raised,
        recorded = pipeline.store().len(),
        log = %pipeline.alert_log_path().display(),
        "replay finished"
    );
    for record in pipeline.store().sorted_by(SortField::Date) {
        info!(
            id = %record.id,
            date = %record.date,
            hour = %record.time,
            camera = record.camera,
            img = %record.img_path,
            "alert"
        );
    }

    Ok(())
}
