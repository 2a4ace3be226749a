//! Wire types used by the server.

pub mod error;
pub mod message;
pub mod params;

pub use error::*;
pub use message::*;
pub use params::*;
