//! JSON-RPC dispatch onto the engine.

pub mod handler;
pub mod methods;
pub mod validator;

pub use handler::ProtocolHandler;
pub use methods::MethodRegistry;
