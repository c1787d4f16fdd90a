use crate::hash::base64_hmac_sha1;
use crate::request::percent_encode;
use crate::{Error, Result, Session};
use chrono::{DateTime, Utc};
use http::{HeaderValue, Method, Uri};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::fmt::Write;
use std::sync::Arc;

const SIGNATURE_METHOD: &str = "HMAC-SHA1";
const OAUTH_VERSION: &str = "1.0";
const NONCE_LENGTH: usize = 16;

/// RequestSigner produces the OAuth authorization header for a request.
///
/// Signing is app-level only: the session's key/secret pair signs every
/// call with an empty token, and user authentication happens at the
/// application protocol layer through the login endpoints.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    session: Arc<Session>,
    time: Option<DateTime<Utc>>,
    nonce: Option<String>,
}

impl RequestSigner {
    /// Create a new signer over the given session.
    pub fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            time: None,
            nonce: None,
        }
    }

    /// Specify the signing time.
    ///
    /// # Note
    ///
    /// We should always take current time to sign requests.
    /// Only use this function for testing.
    #[cfg(test)]
    pub fn with_time(mut self, time: DateTime<Utc>) -> Self {
        self.time = Some(time);
        self
    }

    /// Specify the nonce.
    ///
    /// # Note
    ///
    /// Nonces must be random in production. Only use this function for
    /// testing.
    #[cfg(test)]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Build the `Authorization` header value for the given method and URI.
    ///
    /// The signature covers the verb, the base URL, and the sorted query
    /// plus oauth parameters, keyed by the percent-encoded api secret.
    pub fn authorization(&self, method: &Method, uri: &Uri) -> Result<HeaderValue> {
        let timestamp = self.time.unwrap_or_else(Utc::now).timestamp().to_string();
        let nonce = self.nonce.clone().unwrap_or_else(generate_nonce);

        let oauth_params = [
            ("oauth_consumer_key", self.session.api_key().to_string()),
            ("oauth_nonce", nonce),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", timestamp),
            ("oauth_version", OAUTH_VERSION.to_string()),
        ];

        let base_string = base_string(method, uri, &oauth_params)?;
        // Two-legged signing: the token secret half of the key stays empty.
        let signing_key = format!("{}&", percent_encode(self.session.api_secret()));
        let signature = base64_hmac_sha1(signing_key.as_bytes(), base_string.as_bytes());

        let mut value = String::from("OAuth ");
        for (i, (key, param)) in oauth_params
            .iter()
            .map(|(k, v)| (*k, v.as_str()))
            .chain([("oauth_signature", signature.as_str())])
            .enumerate()
        {
            if i > 0 {
                value.push_str(", ");
            }
            write!(value, "{}=\"{}\"", key, percent_encode(param))?;
        }

        let mut header: HeaderValue = value.parse()?;
        header.set_sensitive(true);
        Ok(header)
    }
}

/// Build the signature base string: `VERB&enc(base_url)&enc(params)`.
///
/// Parameters are the request's query pairs plus the oauth parameters,
/// each percent-encoded, sorted, and joined `key=value` with `&`.
fn base_string(method: &Method, uri: &Uri, oauth_params: &[(&str, String)]) -> Result<String> {
    let scheme = uri.scheme_str().unwrap_or("http");
    let authority = uri
        .authority()
        .ok_or_else(|| Error::request_malformed("request uri has no authority"))?;
    let base_url = format!("{}://{}{}", scheme, authority, uri.path());

    let mut params: Vec<(String, String)> = uri
        .query()
        .map(|q| {
            form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect()
        })
        .unwrap_or_default();
    params.extend(oauth_params.iter().map(|(k, v)| (k.to_string(), v.clone())));

    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (percent_encode(k), percent_encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    Ok(format!(
        "{}&{}&{}",
        method.as_str(),
        percent_encode(&base_url),
        percent_encode(&param_string)
    ))
}

fn generate_nonce() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(NONCE_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn signer() -> RequestSigner {
        let session = Arc::new(Session::new("key", "secret", "user", 0));
        RequestSigner::new(session)
            .with_time(DateTime::from_timestamp(1000, 0).expect("in bounds"))
            .with_nonce("abc")
    }

    #[test]
    fn test_base_string() {
        let uri: Uri = "http://example.com/path?name=one".parse().unwrap();
        let oauth_params = [
            ("oauth_consumer_key", "key".to_string()),
            ("oauth_nonce", "abc".to_string()),
            ("oauth_signature_method", SIGNATURE_METHOD.to_string()),
            ("oauth_timestamp", "1000".to_string()),
            ("oauth_version", OAUTH_VERSION.to_string()),
        ];

        let base = base_string(&Method::GET, &uri, &oauth_params).unwrap();
        assert_eq!(
            base,
            "GET&http%3A%2F%2Fexample.com%2Fpath&\
             name%3Done%26\
             oauth_consumer_key%3Dkey%26\
             oauth_nonce%3Dabc%26\
             oauth_signature_method%3DHMAC-SHA1%26\
             oauth_timestamp%3D1000%26\
             oauth_version%3D1.0"
        );
    }

    #[test]
    fn test_base_string_requires_authority() {
        let uri = Uri::from_static("/path");
        let err = base_string(&Method::GET, &uri, &[]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::RequestMalformed);
    }

    #[test]
    fn test_authorization_header_shape() {
        let uri: Uri = "http://example.com/path?name=one".parse().unwrap();
        let header = signer().authorization(&Method::GET, &uri).unwrap();

        assert!(header.is_sensitive());
        let value = header.to_str().unwrap();
        assert!(value.starts_with("OAuth "));
        assert!(value.contains(r#"oauth_consumer_key="key""#));
        assert!(value.contains(r#"oauth_nonce="abc""#));
        assert!(value.contains(r#"oauth_signature_method="HMAC-SHA1""#));
        assert!(value.contains(r#"oauth_timestamp="1000""#));
        assert!(value.contains(r#"oauth_version="1.0""#));
        assert!(value.contains("oauth_signature=\""));
    }

    #[test]
    fn test_signature_is_deterministic_for_fixed_inputs() {
        let uri: Uri = "http://example.com/path".parse().unwrap();
        let first = signer().authorization(&Method::GET, &uri).unwrap();
        let second = signer().authorization(&Method::GET, &uri).unwrap();
        assert_eq!(first.to_str().unwrap(), second.to_str().unwrap());
    }

    #[test]
    fn test_signature_varies_with_method() {
        let uri: Uri = "http://example.com/path".parse().unwrap();
        let get = signer().authorization(&Method::GET, &uri).unwrap();
        let post = signer().authorization(&Method::POST, &uri).unwrap();
        assert_ne!(get.to_str().unwrap(), post.to_str().unwrap());
    }
}
