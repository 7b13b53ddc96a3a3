pub mod constants;
pub mod frame;
pub mod orientation;
pub mod pixel;
pub mod rect;
pub mod settings;
