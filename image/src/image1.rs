use super::{ImageOwned, ImageRef};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};

/// Single-channel (grayscale) pixel.
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub struct Color1(pub u8);

impl Color1 {
    pub const WHITE: Self = Self(u8::MAX);

    pub const fn new(a: u8) -> Self {
        Self(a)
    }
    pub fn normalized(self) -> f32 {
        f32::from(self.0) / 255.0
    }
}

pub struct ImageRef1<'a> {
    width: u32,
    height: u32,
    data: &'a [u8],
}

impl ImageRef1<'_> {
    pub fn new(width: u32, height: u32, data: &[u8]) -> ImageRef1 {
        assert_eq!(
            data.len(),
            (width * height) as usize,
            "image data does not match its dimensions"
        );
        ImageRef1 {
            width,
            height,
            data,
        }
    }
    pub fn data(&self) -> &[u8] {
        self.data
    }
}

impl ImageRef for ImageRef1<'_> {
    type Owned = ImageOwned1;
    type Color = Color1;
    fn get_pixel_color(&self, x: u32, y: u32) -> Self::Color {
        Color1(self.data[(x + y * self.width) as usize])
    }
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageOwned1 {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl ImageOwned1 {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        assert_eq!(
            data.len(),
            (width * height) as usize,
            "image data does not match its dimensions"
        );
        Self {
            width,
            height,
            data,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Binary PGM (P5), readable by most image viewers.
    pub fn write_pgm<W: Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "P5\n{} {}\n255\n", self.width, self.height)?;
        out.write_all(&self.data)?;
        out.flush()
    }

    /// Pixels scaled into `[0, 1]`, row-major.
    pub fn normalized(&self) -> impl Iterator<Item = f32> + '_ {
        self.data.iter().map(|&byte| Color1(byte).normalized())
    }
}

impl ImageRef for ImageOwned1 {
    type Owned = Self;
    type Color = Color1;
    fn get_pixel_color(&self, x: u32, y: u32) -> Self::Color {
        self.as_ref().get_pixel_color(x, y)
    }
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
}

impl ImageOwned for ImageOwned1 {
    type Ref<'a> = ImageRef1<'a>;
    fn zeroed(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0; (width * height) as usize],
        }
    }
    fn as_ref(&self) -> Self::Ref<'_> {
        ImageRef1::new(self.width, self.height, &self.data)
    }
    fn set_pixel_color(&mut self, x: u32, y: u32, color: Self::Color) {
        self.data[(x + y * self.width) as usize] = color.0;
    }
}
