pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Stroke width of the outline marker, in pixels.
pub const OUTLINE_LINE_WIDTH: f64 = 4.0;

/// Opaque green, BGRA byte order.
pub const OUTLINE_COLOR_BGRA: [u8; 4] = [0, 255, 0, 255];

/// Directory name used under the platform config/cache dirs.
pub const APP_DIR_NAME: &str = "Facemark";
