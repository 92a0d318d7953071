pub mod event_sink;
pub mod frame_source;
pub mod segment_writer;
