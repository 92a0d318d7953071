pub mod event_log;
pub mod naming;
pub mod segment_writer;
pub mod y4m_source;
