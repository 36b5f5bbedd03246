//! Grid translation error types.

use thiserror::Error;

/// Errors raised while translating grid requests.
#[derive(Debug, Error)]
pub enum Error {
    /// The request carries neither protocol marker key.
    #[error("unrecognized grid protocol: request has neither 'sEcho' nor 'draw'")]
    UnrecognizedProtocol,

    /// The request is structurally broken for its declared protocol.
    #[error("malformed grid request: {0}")]
    MalformedRequest(String),

    /// Failure in the underlying query layer.
    #[error(transparent)]
    Core(#[from] rowgrid_core::Error),
}
