pub mod annotated_frame;
pub mod coordinate_mapper;
pub mod frame_annotator;
pub mod marker_style;
