// THEORY:
// Alert snapshots leave the engine through an `ImageSink`. The engine decides
// *where* an image goes (`{data_dir}/img/{id}.png`), the sink decides *how* the
// bytes are encoded. Keeping that seam behind a trait lets the pipeline be driven
// in tests with an in-memory sink and in production with `PngImageSink`.

use crate::core_modules::frame::FrameBuffer;
use crate::error::Result;
use image::ImageEncoder;
use std::path::{Path, PathBuf};

/// Where an alert's snapshot for `id` lives under `data_dir`.
pub fn alert_image_path(data_dir: &Path, id: &str) -> PathBuf {
    data_dir.join("img").join(format!("{id}.png"))
}

/// Persists a frame snapshot at a path chosen by the engine.
pub trait ImageSink {
    fn persist(&mut self, path: &Path, frame: &FrameBuffer) -> Result<()>;
}

/// Encodes RGBA8 frames as PNG files, creating parent directories on demand.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngImageSink;

impl ImageSink for PngImageSink {
    fn persist(&mut self, path: &Path, frame: &FrameBuffer) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        save(path, frame)
    }
}

/// Writes `frame` to `path` as an RGBA8 PNG.
pub fn save(path: &Path, frame: &FrameBuffer) -> Result<()> {
    frame.validate()?;
    let output = std::io::BufWriter::new(std::fs::File::create(path)?);
    let encoder = image::codecs::png::PngEncoder::new(output);

    encoder.write_image(
        &frame.data,
        frame.width,
        frame.height,
        image::ExtendedColorType::Rgba8,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VigilError;

    #[test]
    fn image_path_is_derived_from_id() {
        let path = alert_image_path(Path::new("/var/lib/vigil"), "CAM0-9-5-1");
        assert_eq!(path, PathBuf::from("/var/lib/vigil/img/CAM0-9-5-1.png"));
    }

    #[test]
    fn save_white_file() {
        let dir = tempfile::tempdir().expect("Error creating temp dir.");
        let path = dir.path().join("white_file.png");
        let frame = FrameBuffer::new(64, 48, vec![255u8; 64 * 48 * 4]);

        save(&path, &frame).expect("Error Saving File.");

        let decoded = image::open(&path).expect("Error reading File.").to_rgba8();
        assert_eq!(decoded.dimensions(), (64, 48));
        assert!(decoded.pixels().all(|p| p.0 == [255, 255, 255, 255]));
    }

    #[test]
    fn save_gradient_file_non_square() {
        let dir = tempfile::tempdir().expect("Error creating temp dir.");
        let path = dir.path().join("gradient_file.png");
        let (width, height) = (30u32, 10u32);
        let mut frame = FrameBuffer::blank(width, height);
        let mut intensity = 0u8;

        for pixel in frame.data.chunks_mut(4) {
            pixel[0] = intensity;
            pixel[1] = intensity;
            pixel[2] = intensity;
            intensity = intensity.wrapping_add(1);
        }

        save(&path, &frame).expect("Error Saving File.");

        let decoded = image::open(&path).expect("Error reading File.").to_rgba8();
        assert_eq!(decoded.dimensions(), (width, height));
        assert_eq!(decoded.get_pixel(5, 0).0, [5, 5, 5, 255]);
        assert_eq!(decoded.get_pixel(0, 1).0, [30, 30, 30, 255]);
    }

    #[test]
    fn png_sink_creates_missing_directories() {
        let dir = tempfile::tempdir().expect("Error creating temp dir.");
        let path = alert_image_path(dir.path(), "CAM2-23-59-59");

        PngImageSink
            .persist(&path, &FrameBuffer::blank(8, 8))
            .expect("Error Saving File.");

        assert!(path.exists());
    }

    #[test]
    fn truncated_frame_is_not_written() {
        let dir = tempfile::tempdir().expect("Error creating temp dir.");
        let path = dir.path().join("broken.png");
        let frame = FrameBuffer::new(8, 8, vec![0u8; 10]);

        let result = PngImageSink.persist(&path, &frame);

        assert!(matches!(result, Err(VigilError::InvalidFrame { .. })));
        assert!(!path.exists());
    }
}
