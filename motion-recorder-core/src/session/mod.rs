pub mod recorder;
pub mod state_machine;
