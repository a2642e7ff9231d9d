pub trait ImageRef {
    type Owned: ImageOwned<Color = Self::Color>;
    type Color: PartialEq + Copy;
    fn get_pixel_color(&self, x: u32, y: u32) -> Self::Color;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Nearest-neighbour rescale to an arbitrary size.
    fn resize_nearest(&self, new_width: u32, new_height: u32) -> Self::Owned {
        assert!(
            new_width > 0 && new_height > 0,
            "attempted to resize to an empty image"
        );
        let mut rescaled_image = Self::Owned::zeroed(new_width, new_height);
        for y in 0..new_height {
            let src_y = (u64::from(y) * u64::from(self.height()) / u64::from(new_height)) as u32;
            for x in 0..new_width {
                let src_x = (u64::from(x) * u64::from(self.width()) / u64::from(new_width)) as u32;
                rescaled_image.set_pixel_color(x, y, self.get_pixel_color(src_x, src_y));
            }
        }
        rescaled_image
    }
}

pub trait ImageOwned
where
    Self: ImageRef,
{
    type Ref<'a>: ImageRef
    where
        Self: 'a;
    fn zeroed(width: u32, height: u32) -> Self;
    fn set_pixel_color(&mut self, x: u32, y: u32, color: Self::Color);
    fn as_ref(&self) -> Self::Ref<'_>;
    fn fill_area(
        &mut self,
        (start_x, end_x): (u32, u32),
        (start_y, end_y): (u32, u32),
        new_color: Self::Color,
    ) {
        let end_x = end_x.min(self.width());
        let end_y = end_y.min(self.height());
        for y in start_y..end_y {
            for x in start_x..end_x {
                self.set_pixel_color(x, y, new_color);
            }
        }
    }
}
