//! TeamSpeak ServerQuery client stack.
//!
//! Bottom to top: the wire [`escape`] codec, the response [`parser`]
//! producing ordered records, the two byte [`transport`]s (raw TCP,
//! SSH shell), the authenticated [`session`] with its command/response
//! framing, and the bounded per-target session [`pool`].

pub mod escape;
pub mod parser;
pub mod pool;
pub mod session;
pub mod transport;

pub use parser::{parse_response, Record};
pub use pool::{PooledSession, SessionPool};
pub use session::QuerySession;
