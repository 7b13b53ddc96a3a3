pub mod bitmap_context;
pub mod stamp_image;
