//! Request handlers.

pub mod health;
pub mod rpc;

pub use health::*;
pub use rpc::*;
