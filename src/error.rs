use thiserror::Error;

/// Errors produced by the ServerQuery client stack.
///
/// `Io` and `Ssh` are transport failures and always fatal to the session
/// that hit them. `Server` is a protocol-level error terminator
/// (`error id=<n> msg=<text>` with a nonzero id); whether it invalidates
/// the session is the caller's call. `PoolExhausted` means no session
/// became available within the pool's wait window.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ssh error: {0}")]
    Ssh(#[from] russh::Error),

    #[error("ssh authentication rejected for user {user}")]
    Auth { user: String },

    #[error("server error {id}: {message}")]
    Server { id: u32, message: String },

    #[error("timed out waiting for a pooled connection")]
    PoolExhausted,
}

impl QueryError {
    /// True for well-formed protocol error responses, false for
    /// transport-level failures.
    pub fn is_server_error(&self) -> bool {
        matches!(self, QueryError::Server { .. })
    }
}

pub type Result<T> = std::result::Result<T, QueryError>;
