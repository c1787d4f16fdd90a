//! Push notification token handling.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The platform a push token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    /// An Apple push token.
    Ios,
    /// An Android registration id.
    Android,
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenType::Ios => f.write_str("ios"),
            TokenType::Android => f.write_str("android"),
        }
    }
}

/// A device push token registered with the platform.
///
/// On the wire this is `{"token": ..., "type": "ios"|"android",
/// "registered_milliseconds": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushToken {
    token: String,
    #[serde(rename = "type")]
    token_type: TokenType,
    registered_milliseconds: i64,
}

impl PushToken {
    /// Create a token registered right now.
    pub fn new(token: impl Into<String>, token_type: TokenType) -> Self {
        Self::registered_at(token, token_type, Utc::now().timestamp_millis())
    }

    /// Create a token with an explicit registration time, in milliseconds
    /// since the epoch.
    pub fn registered_at(
        token: impl Into<String>,
        token_type: TokenType,
        registered_milliseconds: i64,
    ) -> Self {
        Self {
            token: token.into(),
            token_type,
            registered_milliseconds,
        }
    }

    /// The token value.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The token platform.
    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    /// When the token was registered, in milliseconds since the epoch.
    pub fn registered_milliseconds(&self) -> i64 {
        self.registered_milliseconds
    }
}
