pub mod laterality;
pub mod pixels;
pub mod tags;

pub use laterality::extract_laterality;
pub use pixels::read_pixel_array;
pub use tags::*;
