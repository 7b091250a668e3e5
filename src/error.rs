use thiserror::Error;

/// Errors surfaced by the Quadrille client.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No seed answered the membership query.
    #[error("no cluster member reachable from the seed list")]
    NoMembersFound,

    /// Every member was probed and none claimed leadership.
    #[error("no leader found among cluster members")]
    NoLeaderFound,

    /// Failed to establish a connection.
    #[error("connection failed: {0}")]
    ConnectionFailed(#[source] std::io::Error),

    /// Connection was closed by the peer.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// I/O error during communication.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed wire data or invalid address.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Invalid JSON in a response or request payload.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// No response arrived within the request timeout.
    #[error("request timed out")]
    Timeout,

    /// Server answered with an `ERROR:` payload; message passed through verbatim.
    #[error("server error: {0}")]
    Remote(String),

    /// The recovery attempt budget was exhausted without finding a leader.
    #[error("connection pool lost and recovery exhausted its attempt budget")]
    RecoveryExhausted,

    /// The client was explicitly closed.
    #[error("client is closed")]
    Closed,

    /// A bulk write with no operations was submitted.
    #[error("cannot execute empty bulkwrite operation")]
    EmptyBulkWrite,
}

pub type Result<T> = std::result::Result<T, ClientError>;
