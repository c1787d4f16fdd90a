use crate::{Error, Result, Session};
use http::{Method, Uri};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;

/// The host every client starts out talking to, until a redirect or an
/// explicit override points it elsewhere.
pub const DEFAULT_HOST: &str = "api.bp1.backplane.io";

const SECURE_SCHEME: &str = "https";
const REGULAR_SCHEME: &str = "http";

/// AsciiSet for form and query encoding.
///
/// Percent-encode every byte except the RFC 3986 unreserved characters:
/// 'A'-'Z', 'a'-'z', '0'-'9', '-', '.', '_', and '~'. Notably spaces become
/// `%20`, never `+`.
pub static FORM_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Percent-encode a single component with [`FORM_ENCODE_SET`].
pub(crate) fn percent_encode(s: &str) -> String {
    utf8_percent_encode(s, &FORM_ENCODE_SET).to_string()
}

/// ApiRequest describes a single call against the platform.
///
/// A descriptor is constructed fresh per call and never reused. It knows
/// how to derive its path from the method name, assemble a fully qualified
/// URI for a given host, and render its payload:
///
/// - GET/DELETE carry their parameters percent-encoded in the query
///   string, in insertion order.
/// - POST/PUT with parameters carry them form-encoded in the body;
///   otherwise a body object set on the request is serialized to JSON.
#[derive(Debug)]
pub struct ApiRequest {
    method_name: String,
    verb: Method,
    secure: bool,
    user_based: bool,
    params: Option<Vec<(String, String)>>,
    body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a new descriptor for the given method name.
    ///
    /// Defaults to an insecure, app-rooted GET with no parameters.
    pub fn new(method_name: impl Into<String>) -> Self {
        Self {
            method_name: method_name.into(),
            verb: Method::GET,
            secure: false,
            user_based: false,
            params: None,
            body: None,
        }
    }

    /// Set the HTTP verb.
    pub fn with_verb(mut self, verb: Method) -> Self {
        self.verb = verb;
        self
    }

    /// Set the request parameters, keeping their insertion order.
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        self.params = Some(params);
        self
    }

    /// Set the request body object, serializing it immediately.
    ///
    /// Only meaningful for POST/PUT, and only when no parameters are set.
    pub fn with_body(mut self, body: &impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(body).map_err(|e| {
            Error::request_malformed("failed to serialize request body").with_source(e)
        })?;
        self.body = Some(value);
        Ok(self)
    }

    /// Force https for this request.
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Root this request under the session's user object collection.
    ///
    /// User-based requests always travel over https.
    pub fn user_based(mut self) -> Self {
        self.user_based = true;
        self.secure = true;
        self
    }

    /// The HTTP verb of this request.
    pub fn verb(&self) -> &Method {
        &self.verb
    }

    /// The path this request resolves to.
    ///
    /// User-based requests live under `/<user_object_name>/`; everything
    /// else is rooted at `/`, with a leading slash added to the method
    /// name when it doesn't carry one already.
    pub fn path(&self, session: &Session) -> String {
        if self.user_based {
            format!("/{}/{}", session.user_object_name(), self.method_name)
        } else if self.method_name.starts_with('/') {
            self.method_name.clone()
        } else {
            format!("/{}", self.method_name)
        }
    }

    /// Assemble the fully qualified URI for the given host.
    pub fn uri(&self, session: &Session, host: &str) -> Result<Uri> {
        let scheme = if self.secure {
            SECURE_SCHEME
        } else {
            REGULAR_SCHEME
        };

        let mut s = format!("{}://{}{}", scheme, host, self.path(session));
        if self.verb == Method::GET || self.verb == Method::DELETE {
            if let Some(query) = self.query_string() {
                if !query.is_empty() {
                    s.push('?');
                    s.push_str(&query);
                }
            }
        }

        s.parse::<Uri>()
            .map_err(|e| Error::request_malformed(format!("invalid request uri {s}")).with_source(e))
    }

    /// Render the request payload.
    ///
    /// Parameters win over a body object; requests with neither render an
    /// empty payload.
    pub fn payload(&self) -> Result<String> {
        if self.verb != Method::POST && self.verb != Method::PUT {
            return Ok(String::new());
        }

        if let Some(query) = self.query_string() {
            return Ok(query);
        }
        if let Some(body) = &self.body {
            return serde_json::to_string(body).map_err(|e| {
                Error::request_malformed("failed to serialize request body").with_source(e)
            });
        }

        Ok(String::new())
    }

    fn query_string(&self) -> Option<String> {
        let params = self.params.as_ref()?;

        let mut s = String::new();
        for (i, (key, value)) in params.iter().enumerate() {
            if i > 0 {
                s.push('&');
            }
            s.push_str(&percent_encode(key));
            s.push('=');
            s.push_str(&percent_encode(value));
        }
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn session() -> Session {
        Session::new("key", "secret", "user", 0)
    }

    fn pairs(params: &[(&str, &str)]) -> Vec<(String, String)> {
        params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_path_gets_leading_slash() {
        let req = ApiRequest::new("games");
        assert_eq!(req.path(&session()), "/games");
    }

    #[test]
    fn test_path_with_leading_slash_unchanged() {
        let req = ApiRequest::new("/games/1");
        assert_eq!(req.path(&session()), "/games/1");
    }

    #[test]
    fn test_user_based_path() {
        let req = ApiRequest::new("login").user_based();
        assert_eq!(req.path(&session()), "/user/login");
    }

    #[test]
    fn test_uri_insecure_by_default() {
        let req = ApiRequest::new("games");
        let uri = req.uri(&session(), DEFAULT_HOST).unwrap();
        assert_eq!(uri.to_string(), "http://api.bp1.backplane.io/games");
    }

    #[test]
    fn test_user_based_uri_is_https() {
        let req = ApiRequest::new("logout").user_based();
        let uri = req.uri(&session(), DEFAULT_HOST).unwrap();
        assert_eq!(uri.to_string(), "https://api.bp1.backplane.io/user/logout");
    }

    #[test]
    fn test_get_params_build_query_string() {
        let req = ApiRequest::new("games").with_params(pairs(&[("name", "one")]));
        let uri = req.uri(&session(), DEFAULT_HOST).unwrap();
        assert_eq!(uri.query(), Some("name=one"));
    }

    #[test]
    fn test_query_string_keeps_insertion_order() {
        let req =
            ApiRequest::new("games").with_params(pairs(&[("b", "2"), ("a", "1"), ("c", "3")]));
        let uri = req.uri(&session(), DEFAULT_HOST).unwrap();
        assert_eq!(uri.query(), Some("b=2&a=1&c=3"));
    }

    #[test]
    fn test_query_string_percent_encodes() {
        let req = ApiRequest::new("games").with_params(pairs(&[("name", "john smith & co")]));
        let uri = req.uri(&session(), DEFAULT_HOST).unwrap();
        assert_eq!(uri.query(), Some("name=john%20smith%20%26%20co"));
    }

    #[test]
    fn test_empty_params_append_no_query() {
        let req = ApiRequest::new("games").with_params(vec![]);
        let uri = req.uri(&session(), DEFAULT_HOST).unwrap();
        assert_eq!(uri.query(), None);
    }

    #[test]
    fn test_post_ignores_query_string() {
        let req = ApiRequest::new("games")
            .with_verb(Method::POST)
            .with_params(pairs(&[("name", "one")]));
        let uri = req.uri(&session(), DEFAULT_HOST).unwrap();
        assert_eq!(uri.query(), None);
    }

    #[test]
    fn test_post_params_render_form_payload() {
        let req = ApiRequest::new("games")
            .with_verb(Method::POST)
            .with_params(pairs(&[("name", "one"), ("score", "10")]));
        assert_eq!(req.payload().unwrap(), "name=one&score=10");
    }

    #[test]
    fn test_post_body_renders_json_payload() {
        #[derive(serde::Serialize)]
        struct Game {
            name: String,
        }

        let req = ApiRequest::new("games")
            .with_verb(Method::POST)
            .with_body(&Game {
                name: "one".to_string(),
            })
            .unwrap();
        assert_eq!(req.payload().unwrap(), r#"{"name":"one"}"#);
    }

    #[test]
    fn test_get_payload_is_empty() {
        let req = ApiRequest::new("games").with_params(pairs(&[("name", "one")]));
        assert_eq!(req.payload().unwrap(), "");
    }

    #[test]
    fn test_malformed_method_name_fails() {
        let req = ApiRequest::new("games with spaces");
        let err = req.uri(&session(), DEFAULT_HOST).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::RequestMalformed);
    }
}
