mod image1;
mod traits;

pub use image1::{Color1, ImageOwned1, ImageRef1};
pub use traits::{ImageOwned, ImageRef};
