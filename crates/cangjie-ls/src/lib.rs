//! Cangjie Language Server runtime.
//!
//! This crate binds the LSP wire protocol to the core: JSON-RPC envelope
//! types, `Content-Length` transport framing, the request façade
//! ([`server::ArkServer`]) that posts every method onto the right
//! scheduler, and the feature handlers it dispatches to.
//!
//! The primary entry point is [`run_stdio`], used by the `cangjie-ls`
//! binary.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod convert;
pub mod features;
pub mod options;
pub mod protocol;
pub mod server;
pub mod transport;

pub use options::Options;
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use server::LspServer;

/// Run the server over stdio until the client sends `exit`.
///
/// # Errors
///
/// Returns an error only on unrecoverable transport failures; protocol
/// errors become error responses.
pub fn run_stdio(options: Options) -> anyhow::Result<i32> {
    let mut server = LspServer::new(options)?;
    server.run()
}
