pub mod config;
pub mod detection;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod frame;
pub mod state;
