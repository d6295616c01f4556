//! Unified error type.

use std::net::AddrParseError;

/// Boxed error returned by handlers and body streams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by shape-web's fallible operations.
///
/// Application-level failures (401, 404, 500, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: bad configuration, binding a port, reading a
/// request body off the wire.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: AddrParseError,
    },

    #[error("configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to read request body: {0}")]
    Body(#[source] BoxError),

    #[error("request body was lost by an earlier failed read")]
    BodyConsumed,
}
