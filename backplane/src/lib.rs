//! Client SDK for the Backplane platform.
//!
//! [`Client`] is the entry point: construct one from a [`Session`] and call
//! its typed operations (login, social linking, push registration, generic
//! CRUD). Every call is signed with the session's key/secret pair,
//! dispatched over the injected HTTP client, and transparently re-issued
//! when the platform answers with a 302.
//!
//! ```no_run
//! use backplane::{Client, Session};
//!
//! # async fn example() -> backplane::Result<()> {
//! let session = Session::new("my-key", "my-secret", "user", 0);
//! let client = Client::new(session);
//!
//! let body = client.get("games").await?;
//! # Ok(())
//! # }
//! ```

pub use backplane_core::*;
pub use backplane_http_send_reqwest::ReqwestHttpSend;

mod client;
pub use client::{Client, ClientBuilder};

mod query;
pub use query::{FieldQuery, Operator, Query};

mod push;
pub use push::{PushToken, TokenType};
