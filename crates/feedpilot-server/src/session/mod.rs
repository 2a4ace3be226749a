//! Engine lifecycle bound to a state file.

pub mod manager;

pub use manager::PilotSession;
