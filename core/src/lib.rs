//! Core components for constructing, signing and dispatching Backplane API calls.
//!
//! This crate holds the pieces the `backplane` facade is built from:
//!
//! - [`Session`]: the immutable bundle of credentials and app metadata that
//!   scopes every request.
//! - [`ApiRequest`]: a per-call descriptor that knows how to turn a method
//!   name, verb and parameters into a fully qualified URI and payload.
//! - [`Transport`]: signs each request with the session's key/secret,
//!   attaches the versioned media-type headers, dispatches it through the
//!   configured [`HttpSend`] implementation and resolves 302 redirects.
//! - [`Context`]: the container for the HTTP client implementation, so the
//!   transport owns no global state and tests can inject their own client.
//!
//! ## Example
//!
//! ```no_run
//! use backplane_core::{ApiRequest, Context, Session, Transport, DEFAULT_HOST};
//! use std::sync::Arc;
//!
//! # async fn example(http: impl backplane_core::HttpSend) -> backplane_core::Result<()> {
//! let session = Arc::new(Session::new("my-key", "my-secret", "user", 0));
//! let ctx = Context::new().with_http_send(http);
//! let transport = Transport::new(ctx, session.clone());
//!
//! let req = ApiRequest::new("games");
//! let body = transport.execute(&req, DEFAULT_HOST).await?;
//! # Ok(())
//! # }
//! ```

// Make sure all our public APIs have docs.
#![warn(missing_docs)]

pub mod hash;

mod context;
pub use context::{Context, HttpSend, NoopHttpSend};

mod error;
pub use error::{Error, ErrorKind, Result};

mod session;
pub use session::Session;

mod request;
pub use request::{ApiRequest, DEFAULT_HOST};

mod sign;
pub use sign::RequestSigner;

mod transport;
pub use transport::{
    NoopRedirectNotify, RedirectEvent, RedirectNotify, Transport, MAX_REDIRECT_HOPS,
};
