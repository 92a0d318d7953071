pub mod color;
pub mod frame_buffer;
pub mod morphology;
pub mod motion_detector;
pub mod regions;
pub mod y4m_format;
