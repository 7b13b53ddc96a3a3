pub mod threaded_frame_pipeline;
