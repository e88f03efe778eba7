// THEORY:
// `FrameBuffer` is the engine's only view of pixels. Capture and decoding happen
// outside; by the time a frame reaches the pipeline it is a flat RGBA8 buffer.
// The engine never inspects it, it only hands a snapshot to the image sink when
// an alert fires.

use crate::error::{Result, VigilError};

const CHANNELS: usize = 4;

/// A flat RGBA8 frame, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// An opaque black frame.
    pub fn blank(width: u32, height: u32) -> Self {
        let mut data = vec![0u8; Self::expected_len(width, height)];
        for pixel in data.chunks_mut(CHANNELS) {
            pixel[3] = 255;
        }
        Self::new(width, height, data)
    }

    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * CHANNELS
    }

    /// Checks that the buffer length agrees with the declared dimensions.
    pub fn validate(&self) -> Result<()> {
        let expected = Self::expected_len(self.width, self.height);
        if self.data.len() != expected {
            return Err(VigilError::InvalidFrame {
                width: self.width,
                height: self.height,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_frame_is_valid_and_opaque() {
        let frame = FrameBuffer::blank(4, 3);
        assert_eq!(frame.data.len(), 48);
        assert!(frame.validate().is_ok());
        assert!(frame.data.chunks(4).all(|p| p == [0, 0, 0, 255]));
    }

    #[test]
    fn mismatched_length_is_rejected() {
        let frame = FrameBuffer::new(10, 10, vec![0u8; 399]);
        assert!(matches!(
            frame.validate(),
            Err(VigilError::InvalidFrame { expected: 400, actual: 399, .. })
        ));
    }
}
