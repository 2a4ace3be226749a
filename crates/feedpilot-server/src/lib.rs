//! FeedPilot server: the engine's host contract as JSON-RPC 2.0 over stdio.

pub mod config;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod types;

pub use config::{engine_settings, resolve_state_path};
pub use protocol::ProtocolHandler;
pub use session::PilotSession;
pub use transport::StdioTransport;
