//! Ingest authentication
//!
//! Event batches are authorized by a stateless, HMAC-signed ingest token
//! handed out when a session starts. There is no user/account layer: the
//! token alone binds the uploader to one session until it expires.

pub mod bearer;
pub mod ingest;

pub use bearer::extract_bearer;
pub use ingest::{IngestClaims, IssueError, VerifyError, DEFAULT_TTL_SECONDS};
