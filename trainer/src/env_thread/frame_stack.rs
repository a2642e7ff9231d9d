use image::{ImageOwned, ImageOwned1, ImageRef};
use replay_data::{Frame, State};
use std::collections::VecDeque;

/// Sliding window over the last `k` observations of one episode.
///
/// A fresh stack is filled with `k` copies of the first observation, so it is
/// full from the very first step. Frames are reference counted and shared
/// with every state that contains them.
#[derive(Clone)]
pub struct FrameStack {
    stack: VecDeque<Frame>,
    capacity: usize,
}

impl FrameStack {
    pub fn new(capacity: usize, first: Frame) -> Self {
        assert!(capacity > 0, "frame stack needs room for at least one frame");
        Self {
            stack: std::iter::repeat(first).take(capacity).collect(),
            capacity,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        if self.stack.len() == self.capacity {
            self.stack.pop_front();
        }
        self.stack.push_back(frame);
    }

    /// Oldest frame first.
    pub fn state(&self) -> State {
        State::new(self.stack.iter().cloned().collect())
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All frames tiled into one image, oldest top left, in a grid as close
    /// to square as the frame count allows.
    pub fn montage(&self) -> ImageOwned1 {
        let n = self.stack.len() as u32;
        let mut cols = 1;
        while cols * cols < n {
            cols += 1;
        }
        let rows = n.div_ceil(cols);
        let (width, height) = (self.stack[0].width(), self.stack[0].height());
        let mut montage = ImageOwned1::zeroed(width * cols, height * rows);
        for (i, frame) in (0u32..).zip(&self.stack) {
            let (x0, y0) = ((i % cols) * width, (i / cols) * height);
            for y in 0..height {
                for x in 0..width {
                    montage.set_pixel_color(x0 + x, y0 + y, frame.get_pixel_color(x, y));
                }
            }
        }
        montage
    }
}
