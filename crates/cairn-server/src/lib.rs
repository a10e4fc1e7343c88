//! # cairn-server — Block Server
//!
//! Axum service exposing a Cairn [`Store`](cairn_store::Store) over the
//! protocol `RemoteStore` speaks.
//!
//! ## Routes
//!
//! - `GET /health`: liveness probe.
//! - `GET /blocks/{name}`: raw block bytes, or 410 Gone.
//! - `POST /upload`: multipart `AUTHENTICATOR`, optional
//!   `DIGEST_ALGORITHM`, `EXPECTED_NAME`, `FILE_CONTENTS`. 403 on a bad
//!   authenticator, 400 when the bytes do not hash to the expected name,
//!   otherwise 200 with the stored name as the body.
//!
//! ## Middleware Stack (Tower)
//!
//! TraceLayer → DefaultBodyLimit → Handler
//!
//! ## Crate Policy
//!
//! - Store I/O runs on the blocking pool; handlers never block the runtime.
//! - Every accepted upload is flushed to the backing medium before the
//!   response is sent.

pub mod error;
pub mod routes;
pub mod state;

pub use error::AppError;
pub use routes::router;
pub use state::AppState;
