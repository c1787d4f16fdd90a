use std::fmt::{Debug, Formatter};

/// Session holds the credentials and app metadata that scope every request.
///
/// All fields are set at construction and never change. The app name is
/// optional and only surfaces in the `User-Agent` string; apps created
/// before naming was introduced on the platform simply omit it.
#[derive(Clone)]
pub struct Session {
    api_key: String,
    api_secret: String,
    user_object_name: String,
    app_name: Option<String>,
    api_version: u32,
}

impl Session {
    /// Create a new session.
    ///
    /// `user_object_name` is the name of the app's user object collection;
    /// pass an empty string if the app has none, and avoid the user-based
    /// operations (login, logout, social linking) in that case. Pass api
    /// version 0 for the sandbox.
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        user_object_name: impl Into<String>,
        api_version: u32,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            user_object_name: user_object_name.into(),
            app_name: None,
            api_version,
        }
    }

    /// Set the app name.
    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    /// The api key for the app.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The api secret for the app.
    pub fn api_secret(&self) -> &str {
        &self.api_secret
    }

    /// The name of the app's user object collection.
    pub fn user_object_name(&self) -> &str {
        &self.user_object_name
    }

    /// The app name, if one was set.
    pub fn app_name(&self) -> Option<&str> {
        self.app_name.as_deref()
    }

    /// The api version this session talks to.
    pub fn api_version(&self) -> u32 {
        self.api_version
    }
}

impl Debug for Session {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("api_key", &Redact(&self.api_key))
            .field("api_secret", &Redact(&self.api_secret))
            .field("user_object_name", &self.user_object_name)
            .field("app_name", &self.app_name)
            .field("api_version", &self.api_version)
            .finish()
    }
}

/// Replaces all but the first and last three characters with asterisks,
/// and strings shorter than 12 characters entirely. Lets users tell
/// credentials apart in logs without leaking them.
struct Redact<'a>(&'a str);

impl Debug for Redact<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let length = self.0.len();
        if length == 0 {
            f.write_str("EMPTY")
        } else if length < 12 {
            f.write_str("***")
        } else {
            f.write_str(&self.0[..3])?;
            f.write_str("***")?;
            f.write_str(&self.0[length - 3..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let session = Session::new("key", "secret", "user", 1).with_app_name("myapp");

        assert_eq!(session.api_key(), "key");
        assert_eq!(session.api_secret(), "secret");
        assert_eq!(session.user_object_name(), "user");
        assert_eq!(session.app_name(), Some("myapp"));
        assert_eq!(session.api_version(), 1);
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let session = Session::new("aaaabbbbccccdddd", "eeeeffffgggghhhh", "user", 0);
        let out = format!("{session:?}");

        assert!(!out.contains("aaaabbbbccccdddd"));
        assert!(!out.contains("eeeeffffgggghhhh"));
        assert!(out.contains("aaa***ddd"));
        assert!(out.contains("eee***hhh"));
    }
}
