//! DBGp error types.

use thiserror::Error;

/// Errors from DBGp client operations.
#[derive(Debug, Error)]
pub enum DbgpError {
    /// Socket-level failure: refused, reset, broken pipe, failed bind.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// A read or write was attempted without an engine connection.
    #[error("debugger engine is not connected")]
    NotConnected,

    /// The engine closed its end of the connection.
    #[error("connection closed by debugger engine")]
    ConnectionClosed,

    /// The engine produced bytes that violate the message framing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The message payload is not a well-formed XML document.
    #[error("malformed XML response: {0}")]
    Xml(String),

    /// The engine answered a command with an `<error>` element.
    #[error("engine error {code}: {message}")]
    Engine {
        /// DBGp error code.
        code: u32,
        /// Message text reported by the engine.
        message: String,
    },

    /// Operation not valid in the current session state.
    #[error("invalid session state: {0}")]
    InvalidState(String),
}

impl DbgpError {
    /// Returns `true` for transport failures after which the session must be
    /// torn down.
    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::NotConnected | Self::ConnectionClosed
        )
    }

    /// Returns `true` when a connected engine sent data violating the framing
    /// or XML contract.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_) | Self::Xml(_))
    }
}
