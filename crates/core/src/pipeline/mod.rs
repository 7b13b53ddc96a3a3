pub mod annotate_sequence_use_case;
pub mod frame_pipeline;
pub mod infrastructure;
pub mod pipeline_logger;
