use image::{ImageOwned1, ImageRef};
use std::sync::Arc;

/// A captured observation. Frames are shared between the consecutive states
/// that contain them, so they are reference counted and never mutated.
pub type Frame = Arc<ImageOwned1>;

/// Snapshot of a frame stack, oldest frame first.
#[derive(Clone, Debug, PartialEq)]
pub struct State {
    frames: Vec<Frame>,
}

impl State {
    pub fn new(frames: Vec<Frame>) -> Self {
        assert!(!frames.is_empty(), "a state needs at least one frame");
        let (width, height) = (frames[0].width(), frames[0].height());
        assert!(
            frames
                .iter()
                .all(|frame| frame.width() == width && frame.height() == height),
            "all frames of a state must share the same dimensions"
        );
        Self { frames }
    }
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }
    pub fn frame_dims(&self) -> (u32, u32) {
        let frame = &self.frames[0];
        (frame.width(), frame.height())
    }
    pub fn tensor_len(&self) -> usize {
        let (width, height) = self.frame_dims();
        self.frames.len() * (width * height) as usize
    }
    /// Channel-stacked `[frames, height, width]` tensor with pixels scaled
    /// into `[0, 1]`.
    pub fn to_tensor(&self) -> Vec<f32> {
        let mut tensor = Vec::with_capacity(self.tensor_len());
        self.write_tensor_into(&mut tensor);
        tensor
    }
    /// Appends the tensor to `out`, for callers packing whole batches.
    pub fn write_tensor_into(&self, out: &mut Vec<f32>) {
        for frame in &self.frames {
            out.extend(frame.normalized());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageOwned;

    fn frame(pixel: u8) -> Frame {
        Arc::new(ImageOwned1::new(2, 1, vec![pixel, 255]))
    }

    #[test]
    fn tensor_is_channel_stacked_oldest_first() {
        let state = State::new(vec![frame(0), frame(51)]);
        assert_eq!(state.tensor_len(), 4);
        assert_eq!(state.to_tensor(), vec![0.0, 1.0, 0.2, 1.0]);
    }

    #[test]
    fn tensor_is_reproducible() {
        let state = State::new(vec![frame(3), frame(7), frame(9)]);
        let copy = state.clone();
        assert_eq!(state.to_tensor(), copy.to_tensor());
        assert_eq!(state.to_tensor(), state.to_tensor());
    }

    #[test]
    #[should_panic(expected = "same dimensions")]
    fn rejects_mismatched_frames() {
        let other = Arc::new(ImageOwned1::zeroed(1, 1));
        State::new(vec![frame(0), other]);
    }
}
